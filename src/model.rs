// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 检测模型
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

mod labels;
mod yolo_onnx;

pub use self::labels::{ClassNames, PLACEHOLDER_CLASS_COUNT};
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxConfig};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型输出形状错误: {0}")]
  OutputShape(String),
  #[error("模型会话锁已失效")]
  SessionPoisoned,
}

/// 像素坐标的边界框 [x1, y1, x2, y2]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BoundingBox {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由浮点坐标取整得到边界框
  pub fn from_xyxy(xyxy: [f32; 4]) -> Self {
    Self::new(
      xyxy[0] as i32,
      xyxy[1] as i32,
      xyxy[2] as i32,
      xyxy[3] as i32,
    )
  }

  pub fn width(&self) -> i32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> i32 {
    self.y2 - self.y1
  }

  /// 将边界框裁剪到 `width` × `height` 的图像内，退化（无面积）时返回 `None`
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
    if width == 0 || height == 0 {
      return None;
    }
    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let clamped = Self::new(
      self.x1.clamp(0, max_x),
      self.y1.clamp(0, max_y),
      self.x2.clamp(0, max_x),
      self.y2.clamp(0, max_y),
    );
    if clamped.x1 >= clamped.x2 || clamped.y1 >= clamped.y2 {
      None
    } else {
      Some(clamped)
    }
  }
}

/// 一个检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub class_id: u32,
  pub confidence: f32,
}

/// 检测器：给定一帧图像，返回检测结果
///
/// 实现不必可重入，调用方保证对同一实例的串行使用；
/// 需要跨线程共享的实现自行加锁。
pub trait Detector: Send + Sync {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError>;

  /// 模型元数据中携带的类别名称表
  fn class_names(&self) -> Option<ClassNames> {
    None
  }
}
