// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - HTTP 服务
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

//! # HTTP 服务
//!
//! | 路由 | 说明 |
//! |------|------|
//! | `GET /` | 上传页面 |
//! | `POST /` | 上传并处理图像或视频 |
//! | `GET /input/{name}` | 上传的原始文件 |
//! | `GET /output/{name}` | 处理结果 |

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::task::TaskContext;

mod page;
mod upload;

pub use self::upload::{MediaKind, UploadError, sanitize_file_name};

/// 默认上传大小上限
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// 各请求共享的状态
#[derive(Clone)]
pub struct AppState {
  pub ctx: Arc<TaskContext>,
  pub input_dir: PathBuf,
  pub max_upload_bytes: usize,
}

impl AppState {
  pub fn new(ctx: Arc<TaskContext>, input_dir: impl Into<PathBuf>) -> Self {
    Self {
      ctx,
      input_dir: input_dir.into(),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
  }

  pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
    self.max_upload_bytes = max_upload_bytes;
    self
  }
}

pub fn router(state: AppState) -> Router {
  let input_files = ServeDir::new(&state.input_dir);
  let output_files = ServeDir::new(state.ctx.output_dir());
  let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

  Router::new()
    .route("/", get(page::index).post(upload::upload))
    .nest_service("/input", input_files)
    .nest_service("/output", output_files)
    .layer(body_limit)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
