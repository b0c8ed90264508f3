// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 目标检测 Web 服务入口
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

mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shanan_web::codec::default_codec;
use shanan_web::model::YoloOnnx;
use shanan_web::server::{self, AppState};
use shanan_web::task::TaskContext;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("输入目录: {}", args.input_dir.display());
  info!("输出目录: {}", args.output_dir.display());
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  // 模型、视频后端或字体不可用时无法提供服务
  info!("正在加载模型...");
  let detector = match YoloOnnx::load(&args.model, args.yolo_config()) {
    Ok(detector) => detector,
    Err(e) => {
      error!("模型加载失败: {}", e);
      std::process::exit(1);
    }
  };
  info!("模型加载完成");

  let codec = match default_codec() {
    Ok(codec) => codec,
    Err(e) => {
      error!("视频后端初始化失败: {:#}", e);
      std::process::exit(1);
    }
  };

  for dir in [&args.input_dir, &args.output_dir] {
    tokio::fs::create_dir_all(dir)
      .await
      .with_context(|| format!("无法创建目录 {}", dir.display()))?;
  }

  let ctx = match TaskContext::new(
    Box::new(detector),
    codec,
    &args.output_dir,
    args.font.as_deref(),
  ) {
    Ok(ctx) => ctx,
    Err(e) => {
      error!("标注器初始化失败: {}", e);
      std::process::exit(1);
    }
  };
  let state =
    AppState::new(Arc::new(ctx), &args.input_dir).with_max_upload_bytes(args.max_upload_bytes());
  let app = server::router(state);

  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听 {}", args.bind))?;
  info!("服务已启动: http://{}", args.bind);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}
