// 该文件是 Shanan （山南西风） 项目的一部分。
// src/codec.rs - 视频编解码后端
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

use crate::frame::VideoInfo;
use crate::input::{InputError, VideoSource};
use crate::output::{OutputError, VideoSink};

#[cfg(feature = "gstreamer_video")]
pub(crate) mod gstreamer_codec;
#[cfg(feature = "gstreamer_video")]
pub use self::gstreamer_codec::GStreamerCodec;

/// 视频编解码后端：打开输入视频、创建输出视频
pub trait VideoCodec: Send + Sync {
  fn open_input(&self, path: &Path) -> Result<Box<dyn VideoSource>, InputError>;

  fn create_output(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoSink>, OutputError>;
}

/// 未启用任何视频后端时使用，所有视频请求都会失败
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCodec;

impl VideoCodec for UnavailableCodec {
  fn open_input(&self, path: &Path) -> Result<Box<dyn VideoSource>, InputError> {
    Err(InputError::Unsupported(path.display().to_string()))
  }

  fn create_output(&self, path: &Path, _info: &VideoInfo) -> Result<Box<dyn VideoSink>, OutputError> {
    Err(OutputError::Unsupported(path.display().to_string()))
  }
}

/// 默认视频后端
pub fn default_codec() -> anyhow::Result<Box<dyn VideoCodec>> {
  #[cfg(feature = "gstreamer_video")]
  {
    Ok(Box::new(GStreamerCodec::new()?))
  }
  #[cfg(not(feature = "gstreamer_video"))]
  {
    tracing::warn!("未启用 gstreamer_video 特性，视频处理不可用");
    Ok(Box::new(UnavailableCodec))
  }
}
