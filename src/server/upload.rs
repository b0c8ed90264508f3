// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server/upload.rs - 文件上传与处理
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

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use super::AppState;
use super::page::{self, Shown};
use crate::task::{TaskError, process_image, process_video};

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi"];

/// 上传文件的媒体类型，由扩展名决定（不区分大小写）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  pub fn from_file_name(name: &str) -> Option<Self> {
    let name = name.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
      Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
      Some(MediaKind::Video)
    } else {
      None
    }
  }
}

/// 只保留上传文件名的最后一段路径，空名称与 `.`、`..` 视为无效
pub fn sanitize_file_name(raw: &str) -> Option<&str> {
  let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
  match name {
    "" | "." | ".." => None,
    name if name.contains('\0') => None,
    name => Some(name),
  }
}

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("Missing file field")]
  MissingFile,
  #[error("Invalid file name")]
  InvalidFileName,
  #[error("Unsupported file type: {0}")]
  UnsupportedType(String),
  #[error("Malformed upload: {0}")]
  Multipart(#[from] MultipartError),
  #[error("Failed to store upload: {0}")]
  Io(#[from] std::io::Error),
  #[error("Processing failed: {0}")]
  Task(#[from] TaskError),
  #[error("Processing task panicked: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for UploadError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      UploadError::MissingFile => (StatusCode::BAD_REQUEST, "Missing file field"),
      UploadError::InvalidFileName => (StatusCode::BAD_REQUEST, "Invalid file name"),
      UploadError::UnsupportedType(_) => (StatusCode::BAD_REQUEST, "Unsupported file type"),
      UploadError::Multipart(e) => (e.status(), "Malformed upload"),
      UploadError::Io(_) | UploadError::Task(_) | UploadError::Join(_) => {
        error!("{}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Processing failed")
      }
    };
    if status.is_client_error() {
      warn!("拒绝上传: {}", self);
    }
    (status, message).into_response()
  }
}

pub async fn upload(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Html<String>, UploadError> {
  while let Some(mut field) = multipart.next_field().await? {
    if field.name() != Some("file") {
      continue;
    }

    let raw_name = field.file_name().unwrap_or_default().to_string();
    let name = sanitize_file_name(&raw_name)
      .ok_or(UploadError::InvalidFileName)?
      .to_string();
    let kind =
      MediaKind::from_file_name(&name).ok_or_else(|| UploadError::UnsupportedType(name.clone()))?;

    let input_path = state.input_dir.join(&name);
    let size = store_field(&mut field, &input_path).await?;
    info!("收到上传 {} ({} 字节)", name, size);

    let ctx = state.ctx.clone();
    let result_path = tokio::task::spawn_blocking(move || match kind {
      MediaKind::Image => process_image(&ctx, &input_path),
      MediaKind::Video => process_video(&ctx, &input_path),
    })
    .await??;

    let result_name = result_path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let page = page::render(Some(&Shown {
      original: &name,
      result: &result_name,
      kind,
    }));
    return Ok(Html(page));
  }

  Err(UploadError::MissingFile)
}

/// 将上传内容分块写入文件，失败时删除不完整的文件
async fn store_field(field: &mut Field<'_>, path: &Path) -> Result<u64, UploadError> {
  let result = write_chunks(field, path).await;
  if result.is_err()
    && let Err(e) = tokio::fs::remove_file(path).await
    && e.kind() != std::io::ErrorKind::NotFound
  {
    warn!("无法删除不完整的上传文件 {}: {}", path.display(), e);
  }
  result
}

async fn write_chunks(field: &mut Field<'_>, path: &Path) -> Result<u64, UploadError> {
  let mut file = tokio::fs::File::create(path).await?;
  let mut written = 0u64;
  while let Some(chunk) = field.chunk().await? {
    file.write_all(&chunk).await?;
    written += chunk.len() as u64;
  }
  file.flush().await?;
  Ok(written)
}
