// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 测试用检测器与视频后端
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

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::Rgb;
use shanan_web::codec::VideoCodec;
use shanan_web::frame::{Frame, FrameRate, VideoInfo};
use shanan_web::input::{InputError, VideoSource};
use shanan_web::model::{BoundingBox, ClassNames, Detection, Detector, ModelError};
use shanan_web::output::draw::Annotator;
use shanan_web::output::{OutputError, VideoSink};
use shanan_web::task::TaskContext;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// 下标 15 为 "cat" 的类别表
pub fn cat_names() -> ClassNames {
  let mut names: Vec<String> = (0..80).map(|i| format!("class_{}", i)).collect();
  names[15] = "cat".to_string();
  ClassNames::from_names(names)
}

pub fn cat_detection() -> Detection {
  Detection {
    bbox: BoundingBox::new(10, 10, 50, 50),
    class_id: 15,
    confidence: 0.92,
  }
}

/// 返回固定结果并计数的检测器
#[derive(Clone)]
pub struct FakeDetector {
  detections: Vec<Detection>,
  calls: Arc<AtomicUsize>,
  fail: bool,
}

impl FakeDetector {
  pub fn new(detections: Vec<Detection>) -> Self {
    Self {
      detections,
      calls: Arc::new(AtomicUsize::new(0)),
      fail: false,
    }
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::new(Vec::new())
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Detector for FakeDetector {
  fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(ModelError::OrtError("fake failure".to_string()));
    }
    Ok(self.detections.clone())
  }

  fn class_names(&self) -> Option<ClassNames> {
    Some(cat_names())
  }
}

/// 内存中的视频后端：输入为预设帧，输出记录写入的帧
#[derive(Clone)]
pub struct FakeCodec {
  frames: Vec<Frame>,
  info: VideoInfo,
  written: Arc<Mutex<Vec<Frame>>>,
  output_info: Arc<Mutex<Option<VideoInfo>>>,
  output_fails: bool,
}

impl FakeCodec {
  pub fn new(count: usize, width: u32, height: u32, frame_rate: FrameRate) -> Self {
    let frames = (0..count)
      .map(|i| Frame::from_pixel(width, height, Rgb([i as u8, 0, 0])))
      .collect();
    Self {
      frames,
      info: VideoInfo::new(width, height, frame_rate),
      written: Arc::new(Mutex::new(Vec::new())),
      output_info: Arc::new(Mutex::new(None)),
      output_fails: false,
    }
  }

  /// 输入正常，但无法创建输出
  pub fn with_failing_output(mut self) -> Self {
    self.output_fails = true;
    self
  }

  pub fn written(&self) -> Vec<Frame> {
    self.written.lock().map(|w| w.clone()).unwrap_or_default()
  }

  pub fn output_info(&self) -> Option<VideoInfo> {
    self.output_info.lock().ok().and_then(|i| *i)
  }
}

struct FakeSource {
  frames: std::vec::IntoIter<Frame>,
  info: VideoInfo,
}

impl Iterator for FakeSource {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frames.next().map(Ok)
  }
}

impl VideoSource for FakeSource {
  fn info(&self) -> VideoInfo {
    self.info
  }
}

struct FakeSink {
  path: PathBuf,
  written: Arc<Mutex<Vec<Frame>>>,
  count: u64,
}

impl VideoSink for FakeSink {
  fn write_frame(&mut self, frame: &Frame) -> Result<(), OutputError> {
    if let Ok(mut written) = self.written.lock() {
      written.push(frame.clone());
    }
    self.count += 1;
    Ok(())
  }

  fn finish(&mut self) -> Result<u64, OutputError> {
    std::fs::write(&self.path, self.count.to_le_bytes())
      .map_err(|e| OutputError::Unsupported(e.to_string()))?;
    Ok(self.count)
  }
}

impl VideoCodec for FakeCodec {
  fn open_input(&self, path: &Path) -> Result<Box<dyn VideoSource>, InputError> {
    if !path.exists() {
      return Err(InputError::Unsupported(path.display().to_string()));
    }
    Ok(Box::new(FakeSource {
      frames: self.frames.clone().into_iter(),
      info: self.info,
    }))
  }

  fn create_output(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoSink>, OutputError> {
    if self.output_fails {
      return Err(OutputError::Unsupported(path.display().to_string()));
    }
    std::fs::write(path, b"").map_err(|e| OutputError::Unsupported(e.to_string()))?;
    if let Ok(mut output_info) = self.output_info.lock() {
      *output_info = Some(*info);
    }
    Ok(Box::new(FakeSink {
      path: path.to_path_buf(),
      written: self.written.clone(),
      count: 0,
    }))
  }
}

pub fn context(detector: FakeDetector, codec: FakeCodec, output_dir: &Path) -> TaskContext {
  TaskContext::with_annotator(
    Box::new(detector),
    Annotator::new(cat_names()).expect("embedded font"),
    Box::new(codec),
    output_dir,
  )
}

/// 指定区域内非黑色像素的数量
pub fn lit_pixels(frame: &image::RgbImage, x: std::ops::Range<u32>, y: std::ops::Range<u32>) -> usize {
  frame
    .enumerate_pixels()
    .filter(|(px, py, p)| x.contains(px) && y.contains(py) && **p != Rgb([0, 0, 0]))
    .count()
}

pub fn write_png(path: &Path, width: u32, height: u32) {
  Frame::new(width, height).save(path).expect("write png");
}
