// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::info;

use crate::frame::Frame;
use crate::model::{BoundingBox, ClassNames, Detection};

// 绘制常量
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const BOX_THICKNESS: i32 = 2;
const CAPTION_OFFSET: i32 = 10;
const CAPTION_FONT_SIZE: f32 = 16.0;

/// 内置字体（DejaVu Sans）
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件 {path}: {source}")]
  FontIo {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("无效的字体: {0}")]
  InvalidFont(#[from] InvalidFont),
}

/// 标注器：在帧上绘制检测框与 "标签 置信度" 文本
pub struct Annotator {
  class_names: ClassNames,
  font: FontArc,
  font_scale: PxScale,
  color: Rgb<u8>,
}

impl Annotator {
  /// 使用内置字体创建标注器
  pub fn new(class_names: ClassNames) -> Result<Self, DrawError> {
    Ok(Self {
      class_names,
      font: FontArc::try_from_slice(EMBEDDED_FONT)?,
      font_scale: PxScale::from(CAPTION_FONT_SIZE),
      color: Rgb(BOX_COLOR),
    })
  }

  /// 用 TrueType 字体文件替换内置字体
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path).map_err(|source| DrawError::FontIo {
      path: path.display().to_string(),
      source,
    })?;
    self.font = FontArc::try_from_vec(data)?;
    info!("使用字体: {}", path.display());
    Ok(self)
  }

  /// 在帧上原地绘制检测结果，返回同一帧便于链式调用
  pub fn annotate<'f>(&self, frame: &'f mut Frame, detections: &[Detection]) -> &'f mut Frame {
    let (width, height) = frame.dimensions();
    let visible: Vec<(BoundingBox, &Detection)> = detections
      .iter()
      .filter_map(|d| d.bbox.clamp_to(width, height).map(|bbox| (bbox, d)))
      .collect();

    // 先画文本再画边框，文本的混色不会改动边框像素
    for (bbox, detection) in &visible {
      let text = self.caption(detection);
      let (x, baseline) = caption_anchor(bbox);
      let (_, text_height) = text_size(self.font_scale, &self.font, &text);
      let top = (baseline - text_height as i32).max(0);
      draw_text_mut(frame, self.color, x, top, self.font_scale, &self.font, &text);
    }
    for (bbox, _) in &visible {
      self.draw_box(frame, bbox);
    }
    frame
  }

  /// 文本内容：`<标签> <置信度，两位小数>`
  pub fn caption(&self, detection: &Detection) -> String {
    format!(
      "{} {:.2}",
      self.class_names.label(detection.class_id),
      detection.confidence
    )
  }

  // 边框向内加粗，`bbox` 已裁剪到帧内
  fn draw_box(&self, frame: &mut Frame, bbox: &BoundingBox) {
    for thickness in 0..BOX_THICKNESS {
      let width = bbox.width() + 1 - 2 * thickness;
      let height = bbox.height() + 1 - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(bbox.x1 + thickness, bbox.y1 + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(frame, rect, self.color);
    }
  }
}

/// 文本基线位置：边框左上角上方 10 像素，不超出图像顶部
pub fn caption_anchor(bbox: &BoundingBox) -> (i32, i32) {
  (bbox.x1, (bbox.y1 - CAPTION_OFFSET).max(0))
}
