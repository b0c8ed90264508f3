// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 帧与视频流信息定义
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

use std::fmt;

use image::RgbImage;

/// 一帧 RGB 图像（高 × 宽 × 3），由标注器原地修改
pub type Frame = RgbImage;

const DEFAULT_FPS: i32 = 30;

/// 帧率，以分数表示以便原样传给编码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
  pub numerator: i32,
  pub denominator: i32,
}

impl FrameRate {
  pub fn new(numerator: i32, denominator: i32) -> Self {
    Self {
      numerator,
      denominator,
    }
  }

  /// 无效帧率（0 或负数，常见于可变帧率的容器）回退到 30 fps
  pub fn or_default(self) -> Self {
    if self.numerator <= 0 || self.denominator <= 0 {
      Self::default()
    } else {
      self
    }
  }

  /// 第 `index` 帧的时间戳（纳秒）
  pub fn timestamp_ns(&self, index: u64) -> u64 {
    let rate = self.or_default();
    index * 1_000_000_000 * rate.denominator as u64 / rate.numerator as u64
  }

  /// 单帧时长（纳秒）
  pub fn frame_duration_ns(&self) -> u64 {
    self.timestamp_ns(1)
  }
}

impl Default for FrameRate {
  fn default() -> Self {
    Self::new(DEFAULT_FPS, 1)
  }
}

impl fmt::Display for FrameRate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.numerator, self.denominator)
  }
}

/// 视频流属性，输出视频与输入保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
  pub width: u32,
  pub height: u32,
  pub frame_rate: FrameRate,
}

impl VideoInfo {
  pub fn new(width: u32, height: u32, frame_rate: FrameRate) -> Self {
    Self {
      width,
      height,
      frame_rate,
    }
  }

  /// 帧尺寸是否与流属性一致
  pub fn matches(&self, frame: &Frame) -> bool {
    frame.width() == self.width && frame.height() == self.height
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_frame_rate_falls_back_to_thirty() {
    assert_eq!(FrameRate::new(0, 1).or_default(), FrameRate::new(30, 1));
    assert_eq!(FrameRate::new(25, 0).or_default(), FrameRate::new(30, 1));
    assert_eq!(FrameRate::new(25, 1).or_default(), FrameRate::new(25, 1));
  }

  #[test]
  fn ntsc_timestamps_are_exact() {
    let rate = FrameRate::new(30000, 1001);
    assert_eq!(rate.timestamp_ns(0), 0);
    assert_eq!(rate.timestamp_ns(30000), 1001 * 1_000_000_000);
    assert_eq!(rate.frame_duration_ns(), 33_366_666);
  }

  #[test]
  fn info_matches_frame_dimensions() {
    let info = VideoInfo::new(4, 2, FrameRate::default());
    assert!(info.matches(&Frame::new(4, 2)));
    assert!(!info.matches(&Frame::new(2, 4)));
  }
}
