// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::frame::{Frame, VideoInfo};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_video")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_video")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_video")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  /// 输入中没有任何可读取的帧
  #[error("No readable frames")]
  NoFrames,
  #[error("Video decoding unavailable: {0}")]
  Unsupported(String),
}

/// 视频输入：打开时即确定流属性，随后逐帧迭代
///
/// 句柄在 drop 时释放。
pub trait VideoSource: Iterator<Item = Result<Frame, InputError>> {
  fn info(&self) -> VideoInfo;
}
