// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use shanan_web::model::YoloOnnxConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, env = "SHANAN_MODEL", default_value = "yolov8m.onnx", value_name = "FILE")]
  pub model: PathBuf,

  /// 上传文件保存目录
  #[arg(long, env = "SHANAN_INPUT_DIR", default_value = "input", value_name = "DIR")]
  pub input_dir: PathBuf,

  /// 处理结果保存目录
  #[arg(long, env = "SHANAN_OUTPUT_DIR", default_value = "output", value_name = "DIR")]
  pub output_dir: PathBuf,

  /// HTTP 监听地址
  #[arg(long, env = "SHANAN_BIND", default_value = "127.0.0.1:5000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "SHANAN_CONFIDENCE", default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "SHANAN_NMS_THRESHOLD", default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 模型输入边长
  #[arg(long, env = "SHANAN_MODEL_INPUT_SIZE", default_value = "640", value_name = "PIXELS")]
  pub model_input_size: u32,

  /// 标注文本使用的 TrueType 字体，缺省时使用内置字体
  #[arg(long, env = "SHANAN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 上传文件大小上限（MiB）
  #[arg(long, env = "SHANAN_MAX_UPLOAD_MB", default_value = "512", value_name = "MIB")]
  pub max_upload_mb: usize,
}

impl Args {
  pub fn yolo_config(&self) -> YoloOnnxConfig {
    YoloOnnxConfig {
      confidence_threshold: self.confidence,
      nms_threshold: self.nms_threshold,
      input_size: self.model_input_size,
    }
  }

  pub fn max_upload_bytes(&self) -> usize {
    self.max_upload_mb.saturating_mul(1024 * 1024)
  }
}
