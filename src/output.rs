// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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

use crate::frame::Frame;

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "gstreamer_video")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_video")]
pub use self::gstreamer_video_output::{GStreamerVideoOutput, GStreamerVideoOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "gstreamer_video")]
  #[error("GStreamer 视频输出错误: {0}")]
  GStreamerVideoOutputError(#[from] GStreamerVideoOutputError),
  #[error("帧尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("不支持视频编码: {0}")]
  Unsupported(String),
}

/// 视频输出写入器
///
/// `finish` 完成编码并关闭文件；未调用 `finish` 就被 drop 时只释放句柄。
pub trait VideoSink {
  /// 写入一帧
  fn write_frame(&mut self, frame: &Frame) -> Result<(), OutputError>;

  /// 完成写入，返回写入的帧数
  fn finish(&mut self) -> Result<u64, OutputError>;
}
