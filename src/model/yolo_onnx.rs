// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolo_onnx.rs - 基于 ONNX Runtime 的 YOLO 检测器
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

//! YOLOv8 系列 ONNX 模型的推理。
//!
//! 模型输出为 `[1, 4 + 类别数, 候选数]`，前 4 行是以模型输入尺寸为单位的
//! `cx, cy, w, h`，其余每行是一个类别的分数。

use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ndarray::ArrayView2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{Tensor, Value};
use tracing::{debug, info, warn};

use super::{BoundingBox, ClassNames, Detection, Detector, ModelError};
use crate::frame::Frame;

const NAMES_METADATA_KEY: &str = "names";
const BBOX_FEATURES: usize = 4;

/// YOLO 检测器参数
#[derive(Debug, Clone)]
pub struct YoloOnnxConfig {
  /// 置信度阈值
  pub confidence_threshold: f32,
  /// NMS IOU 阈值
  pub nms_threshold: f32,
  /// 模型输入尺寸（正方形）
  pub input_size: u32,
}

impl Default for YoloOnnxConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: 0.25,
      nms_threshold: 0.45,
      input_size: 640,
    }
  }
}

/// YOLO ONNX 检测器
///
/// 会话放在互斥锁后面，推理在进程内串行执行。
pub struct YoloOnnx {
  session: Mutex<Session>,
  config: YoloOnnxConfig,
  class_names: Option<ClassNames>,
}

impl YoloOnnx {
  /// 从模型文件加载检测器
  pub fn load(model_path: impl AsRef<Path>, config: YoloOnnxConfig) -> Result<Self, ModelError> {
    let model_path = model_path.as_ref();
    if !model_path.exists() {
      return Err(ModelError::ModelNotFound(model_path.display().to_string()));
    }

    let model_bytes = std::fs::read(model_path)?;
    let session = Session::builder()
      .map_err(|e| ModelError::OrtError(format!("无法创建会话构建器: {}", e)))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| ModelError::OrtError(format!("无法设置优化级别: {}", e)))?
      .commit_from_memory(&model_bytes)
      .map_err(|e| ModelError::OrtError(format!("无法加载模型: {}", e)))?;

    let class_names = read_class_names(&session);
    match &class_names {
      Some(names) => info!("从模型元数据读取到 {} 个类别", names.len()),
      None => warn!("模型元数据中没有类别名称，使用占位名称"),
    }

    info!(
      model_path = %model_path.display(),
      input_size = config.input_size,
      confidence = config.confidence_threshold,
      nms = config.nms_threshold,
      "模型加载完成"
    );

    Ok(Self {
      session: Mutex::new(session),
      config,
      class_names,
    })
  }

  /// 预处理：缩放到模型输入尺寸，归一化到 [0, 1]，转为 NCHW
  fn preprocess(&self, frame: &Frame) -> Result<Value, ModelError> {
    let size = self.config.input_size;
    let resized = imageops::resize(frame, size, size, FilterType::Triangle);
    let (w, h) = (size as usize, size as usize);

    let mut chw = vec![0f32; 3 * h * w];
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = y as usize * w + x as usize;
      chw[idx] = pixel[0] as f32 / 255.0;
      chw[h * w + idx] = pixel[1] as f32 / 255.0;
      chw[2 * h * w + idx] = pixel[2] as f32 / 255.0;
    }

    Tensor::from_array((vec![1usize, 3, h, w], chw.into_boxed_slice()))
      .map(Value::from)
      .map_err(|e| ModelError::OrtError(format!("无法创建输入张量: {}", e)))
  }

  fn run_inference(&self, input: Value) -> Result<(Vec<usize>, Vec<f32>), ModelError> {
    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::SessionPoisoned)?;

    let outputs = session
      .run(ort::inputs![input])
      .map_err(|e| ModelError::OrtError(format!("推理失败: {}", e)))?;

    let (shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(|e| ModelError::OrtError(format!("无法读取输出张量: {}", e)))?;

    let shape = shape.iter().map(|&d| d.max(0) as usize).collect();
    Ok((shape, data.to_vec()))
  }
}

impl Detector for YoloOnnx {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    let input = self.preprocess(frame)?;
    let (shape, data) = self.run_inference(input)?;

    let scale = (
      frame.width() as f32 / self.config.input_size as f32,
      frame.height() as f32 / self.config.input_size as f32,
    );
    let candidates = decode_output(&shape, &data, scale, self.config.confidence_threshold)?;
    let kept = non_maximum_suppression(candidates, self.config.nms_threshold);

    let detections: Vec<Detection> = kept
      .into_iter()
      .filter_map(|c| {
        BoundingBox::from_xyxy(c.xyxy)
          .clamp_to(frame.width(), frame.height())
          .map(|bbox| Detection {
            bbox,
            class_id: c.class_id,
            confidence: c.confidence,
          })
      })
      .collect();

    debug!(count = detections.len(), "检测完成");
    Ok(detections)
  }

  fn class_names(&self) -> Option<ClassNames> {
    self.class_names.clone()
  }
}

fn read_class_names(session: &Session) -> Option<ClassNames> {
  let metadata = session.metadata().ok()?;
  let names = metadata.custom(NAMES_METADATA_KEY).ok().flatten()?;
  ClassNames::from_metadata(&names)
}

/// 原图像素坐标下的候选框
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
  xyxy: [f32; 4],
  class_id: u32,
  confidence: f32,
}

/// 解码 `[1, 4 + nc, n]` 输出，`scale` 为模型输入到原图的缩放比例
fn decode_output(
  shape: &[usize],
  data: &[f32],
  scale: (f32, f32),
  confidence_threshold: f32,
) -> Result<Vec<Candidate>, ModelError> {
  let (features, count) = match shape {
    [1, features, count] if *features > BBOX_FEATURES => (*features, *count),
    _ => {
      return Err(ModelError::OutputShape(format!(
        "期望 [1, >{}, N]，实际 {:?}",
        BBOX_FEATURES, shape
      )));
    }
  };

  let view = ArrayView2::from_shape((features, count), data)
    .map_err(|e| ModelError::OutputShape(e.to_string()))?;

  let mut candidates = Vec::new();
  for i in 0..count {
    let column = view.column(i);
    let (class_id, confidence) = column
      .iter()
      .skip(BBOX_FEATURES)
      .enumerate()
      .fold((0usize, f32::MIN), |best, (id, &score)| {
        if score > best.1 { (id, score) } else { best }
      });

    if confidence < confidence_threshold {
      continue;
    }

    let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
    candidates.push(Candidate {
      xyxy: [
        (cx - w / 2.0) * scale.0,
        (cy - h / 2.0) * scale.1,
        (cx + w / 2.0) * scale.0,
        (cy + h / 2.0) * scale.1,
      ],
      class_id: class_id as u32,
      confidence,
    });
  }

  Ok(candidates)
}

/// 按类别的非极大值抑制
fn non_maximum_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(&k.xyxy, &candidate.xyxy) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}
