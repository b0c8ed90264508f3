// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 将标注后的帧编码为 H.264，容器由扩展名决定：
//!
//! - `.avi` - AVI
//! - 其他 - MP4
//!
//! 帧率与分辨率取自输入视频，时间戳按帧序号与帧率计算。

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{OutputError, VideoSink};
use crate::codec::gstreamer_codec::{pop_bus_error, quote_location};
use crate::frame::{Frame, VideoInfo};

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 缓冲区映射错误
  #[error("Buffer mapping error")]
  BufferMapError,
}

/// 按扩展名选择封装格式
fn muxer_for(path: &Path) -> &'static str {
  match path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .as_deref()
  {
    Some("avi") => "avimux",
    _ => "mp4mux",
  }
}

/// GStreamer 视频文件输出
pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  video_info: gst_video::VideoInfo,
  info: VideoInfo,
  frame_count: u64,
  finished: bool,
}

impl GStreamerVideoOutput {
  /// 创建输出文件并启动编码管道
  pub fn create(path: impl AsRef<Path>, info: &VideoInfo) -> Result<Self, GStreamerVideoOutputError> {
    let path = path.as_ref();
    gst::init()?;

    let description = format!(
      "appsrc name=src ! videoconvert ! video/x-raw,format=I420 ! x264enc speed-preset=fast ! \
       h264parse ! {} ! filesink location={}",
      muxer_for(path),
      quote_location(path)
    );
    debug!("GStreamer output pipeline: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoOutputError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let appsrc = match pipeline
      .by_name("src")
      .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
    {
      Some(appsrc) => appsrc,
      None => {
        let _ = pipeline.set_state(gst::State::Null);
        return Err(GStreamerVideoOutputError::AppSrcNotFound);
      }
    };

    let rate = info.frame_rate.or_default();
    let video_info =
      gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, info.width, info.height)
        .fps(gst::Fraction::new(rate.numerator, rate.denominator))
        .build()?;
    appsrc.set_caps(Some(&video_info.to_caps()?));
    appsrc.set_format(gst::Format::Time);

    let output = GStreamerVideoOutput {
      pipeline,
      appsrc,
      video_info,
      info: VideoInfo::new(info.width, info.height, rate),
      frame_count: 0,
      finished: false,
    };
    output.pipeline.set_state(gst::State::Playing)?;

    info!(
      "Video output initialized: {}x{} @ {} fps -> {}",
      info.width,
      info.height,
      rate,
      path.display()
    );

    Ok(output)
  }

  fn push_frame(&mut self, frame: &Frame) -> Result<(), GStreamerVideoOutputError> {
    if let Some(message) = pop_bus_error(&self.pipeline) {
      return Err(GStreamerVideoOutputError::PipelineError(message));
    }

    let mut buffer = gst::Buffer::with_size(self.video_info.size())?;
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferMapError)?;
      let rate = self.info.frame_rate;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(
        rate.timestamp_ns(self.frame_count),
      ));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(rate.frame_duration_ns()));
    }

    let mut video_frame = gst_video::VideoFrame::from_buffer_writable(buffer, &self.video_info)
      .map_err(|_| GStreamerVideoOutputError::BufferMapError)?;
    let stride = video_frame.plane_stride()[0] as usize;
    let data = video_frame.plane_data_mut(0)?;

    // 目标行按 stride 对齐
    let row_len = self.info.width as usize * 3;
    for (y, row) in frame.as_raw().chunks_exact(row_len).enumerate() {
      let start = y * stride;
      data[start..start + row_len].copy_from_slice(row);
    }

    self
      .appsrc
      .push_buffer(video_frame.into_buffer())
      .map_err(|e| GStreamerVideoOutputError::PipelineError(format!("Failed to push buffer: {:?}", e)))?;
    self.frame_count += 1;

    Ok(())
  }

  fn finish_stream(&mut self) -> Result<u64, GStreamerVideoOutputError> {
    self
      .appsrc
      .end_of_stream()
      .map_err(|e| GStreamerVideoOutputError::PipelineError(format!("Failed to send EOS: {:?}", e)))?;

    // 等待 EOS 穿过整个管道，文件尾才会写入
    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| GStreamerVideoOutputError::PipelineError("Pipeline without bus".to_string()))?;
    let message = bus.timed_pop_filtered(
      gst::ClockTime::NONE,
      &[gst::MessageType::Eos, gst::MessageType::Error],
    );

    let result = match message.as_ref().map(|m| m.view()) {
      Some(gst::MessageView::Error(err)) => Err(GStreamerVideoOutputError::PipelineError(format!(
        "{} ({})",
        err.error(),
        err.debug().map(|d| d.to_string()).unwrap_or_default()
      ))),
      _ => Ok(self.frame_count),
    };

    self.pipeline.set_state(gst::State::Null)?;
    result
  }
}

impl VideoSink for GStreamerVideoOutput {
  fn write_frame(&mut self, frame: &Frame) -> Result<(), OutputError> {
    if !self.info.matches(frame) {
      return Err(OutputError::FrameSizeMismatch {
        expected: (self.info.width, self.info.height),
        actual: frame.dimensions(),
      });
    }
    self.push_frame(frame).map_err(OutputError::from)
  }

  fn finish(&mut self) -> Result<u64, OutputError> {
    if self.finished {
      return Ok(self.frame_count);
    }
    self.finished = true;
    let frames = self.finish_stream()?;
    info!("Video output closed. Total frames written: {}", frames);
    Ok(frames)
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer video output pipeline: {}", e);
    }
  }
}
