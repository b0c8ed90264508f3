// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 图像与视频处理任务
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

use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::codec::VideoCodec;
use crate::input::{ImageFileInput, InputError, VideoSource};
use crate::model::{ClassNames, Detector, ModelError};
use crate::output::draw::{Annotator, DrawError};
use crate::output::{OutputError, SaveImageFileError, SaveImageFileOutput, VideoSink};

/// 单个文件处理失败的原因
#[derive(Error, Debug)]
pub enum TaskError {
  #[error("解码失败: {0}")]
  Decode(#[source] InputError),
  #[error("检测失败: {0}")]
  Detection(#[from] ModelError),
  #[error("编码失败: {0}")]
  Encode(#[from] OutputError),
  #[error("输入中没有任何帧")]
  EmptyMedia,
}

impl From<InputError> for TaskError {
  fn from(e: InputError) -> Self {
    match e {
      InputError::NoFrames => TaskError::EmptyMedia,
      e => TaskError::Decode(e),
    }
  }
}

impl From<SaveImageFileError> for TaskError {
  fn from(e: SaveImageFileError) -> Self {
    TaskError::Encode(e.into())
  }
}

/// 进程级处理上下文，启动时构建一次，之后只读共享
pub struct TaskContext {
  detector: Box<dyn Detector>,
  annotator: Annotator,
  codec: Box<dyn VideoCodec>,
  output_dir: PathBuf,
}

impl TaskContext {
  /// 类别名称优先取自检测器，否则使用 `class_<id>` 占位名称；
  /// `font` 为空时使用内置字体
  pub fn new(
    detector: Box<dyn Detector>,
    codec: Box<dyn VideoCodec>,
    output_dir: impl Into<PathBuf>,
    font: Option<&Path>,
  ) -> Result<Self, DrawError> {
    let class_names = detector.class_names().unwrap_or_else(|| {
      warn!("模型未提供类别名称，使用占位名称");
      ClassNames::placeholder()
    });
    info!("类别数量: {}", class_names.len());
    let mut annotator = Annotator::new(class_names)?;
    if let Some(font) = font {
      annotator = annotator.with_font_file(font)?;
    }
    Ok(Self::with_annotator(detector, annotator, codec, output_dir))
  }

  pub fn with_annotator(
    detector: Box<dyn Detector>,
    annotator: Annotator,
    codec: Box<dyn VideoCodec>,
    output_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      detector,
      annotator,
      codec,
      output_dir: output_dir.into(),
    }
  }

  pub fn output_dir(&self) -> &Path {
    &self.output_dir
  }

  pub fn annotator(&self) -> &Annotator {
    &self.annotator
  }
}

/// 视频结果文件名：`processed_<stem><原扩展名>`
pub fn video_output_name(input: &Path) -> String {
  let stem = input
    .file_stem()
    .map(|s| s.to_string_lossy())
    .unwrap_or_default();
  match input.extension() {
    Some(ext) => format!("processed_{}.{}", stem, ext.to_string_lossy()),
    None => format!("processed_{}", stem),
  }
}

/// 尚未完成的输出文件，未提交时在释放时删除
struct PartialOutput<'a> {
  path: &'a Path,
  committed: bool,
}

impl<'a> PartialOutput<'a> {
  fn new(path: &'a Path) -> Self {
    Self {
      path,
      committed: false,
    }
  }

  fn commit(mut self) {
    self.committed = true;
  }
}

impl Drop for PartialOutput<'_> {
  fn drop(&mut self) {
    if self.committed {
      return;
    }
    match std::fs::remove_file(self.path) {
      Ok(()) => info!("已删除不完整的输出文件: {}", self.path.display()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => warn!("无法删除输出文件 {}: {}", self.path.display(), e),
    }
  }
}

/// 处理单张图像，结果以同名文件写入输出目录
pub fn process_image(ctx: &TaskContext, path: &Path) -> Result<PathBuf, TaskError> {
  let file_name = path
    .file_name()
    .ok_or_else(|| TaskError::Decode(InputError::Unsupported(path.display().to_string())))?;
  let output_path = ctx.output_dir.join(file_name);
  info!("开始处理图像: {}", path.display());

  match run_image(ctx, path, &output_path) {
    Ok(()) => Ok(output_path),
    Err(e) => {
      error!("处理图像 {} 失败: {}", path.display(), e);
      Err(e)
    }
  }
}

fn run_image(ctx: &TaskContext, path: &Path, output_path: &Path) -> Result<(), TaskError> {
  let mut frame = ImageFileInput::open(path)
    .map_err(InputError::from)?
    .into_frame();

  let now = Instant::now();
  let detections = ctx.detector.detect(&frame)?;
  info!(
    "推理完成，检测到 {} 个目标，耗时: {:.2?}",
    detections.len(),
    now.elapsed()
  );

  ctx.annotator.annotate(&mut frame, &detections);

  let partial = PartialOutput::new(output_path);
  SaveImageFileOutput::new(output_path).save(&frame)?;
  partial.commit();
  Ok(())
}

/// 逐帧处理视频，结果写入 `processed_<stem><ext>`
pub fn process_video(ctx: &TaskContext, path: &Path) -> Result<PathBuf, TaskError> {
  let output_path = ctx.output_dir.join(video_output_name(path));
  info!("开始处理视频: {}", path.display());

  let now = Instant::now();
  match run_video(ctx, path, &output_path) {
    Ok(frames) => {
      info!(
        "视频处理完成: {} 帧，耗时: {:.2?} -> {}",
        frames,
        now.elapsed(),
        output_path.display()
      );
      Ok(output_path)
    }
    Err(e) => {
      error!("处理视频 {} 失败: {}", path.display(), e);
      Err(e)
    }
  }
}

fn run_video(ctx: &TaskContext, path: &Path, output_path: &Path) -> Result<u64, TaskError> {
  let source = ctx.codec.open_input(path)?;
  let info = source.info();
  let sink = ctx.codec.create_output(output_path, &info)?;

  // 输出创建成功后才可能留下不完整的文件
  let partial = PartialOutput::new(output_path);
  let frame_count = write_frames(ctx, source, sink)?;
  partial.commit();
  Ok(frame_count)
}

// 读写句柄在返回时释放，先于 `PartialOutput` 删除文件
fn write_frames(
  ctx: &TaskContext,
  source: Box<dyn VideoSource>,
  mut sink: Box<dyn VideoSink>,
) -> Result<u64, TaskError> {
  let mut frame_count: u64 = 0;
  for frame in source {
    let mut frame = frame?;
    let detections = ctx.detector.detect(&frame)?;
    ctx.annotator.annotate(&mut frame, &detections);
    sink.write_frame(&frame)?;
    frame_count += 1;
    if frame_count % 100 == 0 {
      info!("已处理 {} 帧", frame_count);
    }
  }

  if frame_count == 0 {
    return Err(TaskError::EmptyMedia);
  }
  sink.finish()?;
  Ok(frame_count)
}
