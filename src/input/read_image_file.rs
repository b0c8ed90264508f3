// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::debug;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 静态图像输入，只产出一帧
pub struct ImageFileInput {
  image: Frame,
}

impl ImageFileInput {
  /// 读取并解码图像文件，格式由文件内容判断
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(Self { image })
  }

  pub fn into_frame(self) -> Frame {
    self.image
  }
}
