// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! # GStreamer 视频文件输入
//!
//! 使用 `decodebin` 解码任意 GStreamer 支持的视频文件，统一转换为 RGB 帧。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good gstreamer1.0-plugins-ugly gstreamer1.0-libav
//! ```
//!
//! 打开文件时会先拉取第一帧，从其 caps 中读出宽、高与帧率；
//! 若文件中没有任何帧，打开即返回 [`InputError::NoFrames`]。

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{InputError, VideoSource};
use crate::codec::gstreamer_codec::{pop_bus_error, quote_location};
use crate::frame::{Frame, FrameRate, VideoInfo};

const PULL_TIMEOUT_MS: u64 = 100;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

/// GStreamer 视频文件输入
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  info: VideoInfo,
  pending: Option<Frame>,
  finished: bool,
}

impl GStreamerInput {
  /// 打开视频文件并读取流属性
  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref();
    gst::init().map_err(GStreamerInputError::from)?;

    let description = format!(
      "filesrc location={} ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink sync=false max-buffers=4",
      quote_location(path)
    );
    debug!("GStreamer input pipeline: {}", description);

    let pipeline = gst::parse::launch(&description)
      .map_err(GStreamerInputError::from)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = match pipeline
      .by_name("sink")
      .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
    {
      Some(appsink) => appsink,
      None => {
        let _ = pipeline.set_state(gst::State::Null);
        return Err(GStreamerInputError::AppSinkNotFound.into());
      }
    };

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      info: VideoInfo::new(0, 0, FrameRate::default()),
      pending: None,
      finished: false,
    };

    input
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(GStreamerInputError::from)?;

    let (frame, info) = input.pull_frame()?.ok_or(InputError::NoFrames)?;
    info!(
      "打开视频 {}: {}x{} @ {} fps",
      path.display(),
      info.width,
      info.height,
      info.frame_rate
    );
    input.info = info;
    input.pending = Some(frame);

    Ok(input)
  }

  /// 拉取下一帧，流结束时返回 `None`
  fn pull_frame(&self) -> Result<Option<(Frame, VideoInfo)>, GStreamerInputError> {
    loop {
      if let Some(sample) = self
        .appsink
        .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
      {
        return convert_sample(&sample).map(Some);
      }
      if self.appsink.is_eos() {
        return Ok(None);
      }
      if let Some(message) = pop_bus_error(&self.pipeline) {
        return Err(GStreamerInputError::PipelineError(message));
      }
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(frame) = self.pending.take() {
      return Some(Ok(frame));
    }
    if self.finished {
      return None;
    }

    match self.pull_frame() {
      Ok(Some((frame, _))) => Some(Ok(frame)),
      Ok(None) => {
        self.finished = true;
        None
      }
      Err(e) => {
        self.finished = true;
        Some(Err(e.into()))
      }
    }
  }
}

impl VideoSource for GStreamerInput {
  fn info(&self) -> VideoInfo {
    self.info
  }
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer input pipeline: {}", e);
    }
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<(Frame, VideoInfo), GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat(video_info.format()));
  }

  let width = video_info.width();
  let height = video_info.height();
  let fps = video_info.fps();
  let info = VideoInfo::new(
    width,
    height,
    FrameRate::new(fps.numer(), fps.denom()).or_default(),
  );

  let video_frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &video_info)?;
  let stride = video_frame.plane_stride()[0] as usize;
  let data = video_frame.plane_data(0)?;

  // 行按 stride 对齐，逐行拷贝
  let row_len = width as usize * 3;
  let mut raw = Vec::with_capacity(row_len * height as usize);
  for y in 0..height as usize {
    let start = y * stride;
    raw.extend_from_slice(&data[start..start + row_len]);
  }

  let frame = Frame::from_raw(width, height, raw)
    .ok_or_else(|| GStreamerInputError::PipelineError("无法创建 RGB 图像".to_string()))?;
  Ok((frame, info))
}
