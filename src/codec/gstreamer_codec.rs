// 该文件是 Shanan （山南西风） 项目的一部分。
// src/codec/gstreamer_codec.rs - GStreamer 视频后端
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

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use tracing::info;

use super::VideoCodec;
use crate::frame::VideoInfo;
use crate::input::{GStreamerInput, InputError, VideoSource};
use crate::output::{GStreamerVideoOutput, OutputError, VideoSink};

/// GStreamer 视频后端，构造时初始化 GStreamer
#[derive(Debug, Clone, Copy)]
pub struct GStreamerCodec;

impl GStreamerCodec {
  pub fn new() -> Result<Self, gst::glib::Error> {
    gst::init()?;
    let (major, minor, micro, _) = gst::version();
    info!("GStreamer {}.{}.{} 初始化完成", major, minor, micro);
    Ok(Self)
  }
}

impl VideoCodec for GStreamerCodec {
  fn open_input(&self, path: &Path) -> Result<Box<dyn VideoSource>, InputError> {
    Ok(Box::new(GStreamerInput::open(path)?))
  }

  fn create_output(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoSink>, OutputError> {
    Ok(Box::new(GStreamerVideoOutput::create(path, info)?))
  }
}

/// 为管道描述转义文件路径
pub(crate) fn quote_location(path: &Path) -> String {
  let escaped = path
    .to_string_lossy()
    .replace('\\', "\\\\")
    .replace('"', "\\\"");
  format!("\"{}\"", escaped)
}

/// 取出总线上待处理的错误消息
pub(crate) fn pop_bus_error(pipeline: &gst::Pipeline) -> Option<String> {
  let bus = pipeline.bus()?;
  let message = bus.pop_filtered(&[gst::MessageType::Error])?;
  match message.view() {
    gst::MessageView::Error(err) => Some(format!(
      "{} ({})",
      err.error(),
      err.debug().map(|d| d.to_string()).unwrap_or_default()
    )),
    _ => None,
  }
}
