// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/pipeline.rs - 图像与视频处理流程测试
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

mod common;

use common::{FakeCodec, FakeDetector, GREEN, cat_detection, context, lit_pixels, write_png};
use image::Rgb;
use shanan_web::frame::{FrameRate, VideoInfo};
use shanan_web::model::{BoundingBox, Detection};
use shanan_web::task::{TaskError, process_image, process_video};

fn dirs() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
  let dir = tempfile::tempdir().expect("tempdir");
  let input = dir.path().join("input");
  let output = dir.path().join("output");
  std::fs::create_dir_all(&input).expect("input dir");
  std::fs::create_dir_all(&output).expect("output dir");
  (dir, input, output)
}

#[test]
fn image_result_keeps_name_and_dimensions() {
  let (_dir, input, output) = dirs();
  let path = input.join("street.jpg");
  write_png(&input.join("tmp.png"), 97, 55);
  std::fs::rename(input.join("tmp.png"), &path).expect("rename");

  let detector = FakeDetector::new(vec![cat_detection()]);
  let ctx = context(detector.clone(), FakeCodec::new(0, 1, 1, FrameRate::default()), &output);

  let result = process_image(&ctx, &path).expect("process");
  assert_eq!(result, output.join("street.jpg"));
  let saved = image::open(&result).expect("open result");
  assert_eq!((saved.width(), saved.height()), (97, 55));
  assert_eq!(detector.calls(), 1);
}

#[test]
fn cat_box_is_drawn_at_its_coordinates() {
  let (_dir, input, output) = dirs();
  let path = input.join("cat.png");
  write_png(&path, 64, 64);

  let ctx = context(
    FakeDetector::new(vec![cat_detection()]),
    FakeCodec::new(0, 1, 1, FrameRate::default()),
    &output,
  );
  let result = process_image(&ctx, &path).expect("process");
  let saved = image::open(&result).expect("open result").to_rgb8();

  assert_eq!(saved.get_pixel(10, 10), &GREEN);
  assert_eq!(saved.get_pixel(50, 50), &GREEN);
  assert_eq!(saved.get_pixel(30, 50), &GREEN);
  assert_eq!(saved.get_pixel(30, 30), &Rgb([0, 0, 0]));
  assert_eq!(ctx.annotator().caption(&cat_detection()), "cat 0.92");
  // 文本贴着图像顶部，位于边框上方
  assert!(lit_pixels(&saved, 10..64, 0..10) > 0);
  assert_eq!(lit_pixels(&saved, 0..10, 0..10), 0);
}

#[test]
fn caption_sits_above_lower_box() {
  let (_dir, input, output) = dirs();
  let path = input.join("low.png");
  write_png(&path, 64, 64);

  let detection = Detection {
    bbox: BoundingBox::new(10, 30, 50, 60),
    ..cat_detection()
  };
  let ctx = context(
    FakeDetector::new(vec![detection]),
    FakeCodec::new(0, 1, 1, FrameRate::default()),
    &output,
  );
  let result = process_image(&ctx, &path).expect("process");
  let saved = image::open(&result).expect("open result").to_rgb8();

  assert!(lit_pixels(&saved, 10..64, 0..21) > 0);
  assert_eq!(lit_pixels(&saved, 0..64, 21..30), 0);
}

#[test]
fn same_image_twice_is_byte_identical() {
  let (_dir, input, output) = dirs();
  let path = input.join("twice.png");
  write_png(&path, 40, 30);

  let ctx = context(
    FakeDetector::new(vec![cat_detection()]),
    FakeCodec::new(0, 1, 1, FrameRate::default()),
    &output,
  );
  let first = std::fs::read(process_image(&ctx, &path).expect("first")).expect("read");
  let second = std::fs::read(process_image(&ctx, &path).expect("second")).expect("read");
  assert_eq!(first, second);
}

#[test]
fn out_of_range_boxes_are_tolerated() {
  let (_dir, input, output) = dirs();
  let path = input.join("edge.png");
  write_png(&path, 20, 20);

  let detections = vec![
    Detection {
      bbox: BoundingBox::new(-100, -100, 1000, 1000),
      class_id: 5000,
      confidence: 0.3,
    },
    Detection {
      bbox: BoundingBox::new(30, 30, 40, 40),
      class_id: 0,
      confidence: 0.9,
    },
  ];
  let ctx = context(
    FakeDetector::new(detections),
    FakeCodec::new(0, 1, 1, FrameRate::default()),
    &output,
  );
  let result = process_image(&ctx, &path).expect("process");
  let saved = image::open(&result).expect("open result").to_rgb8();
  assert_eq!(saved.get_pixel(0, 0), &GREEN);
  assert_eq!(saved.get_pixel(19, 19), &GREEN);
}

#[test]
fn undecodable_image_is_decode_error() {
  let (_dir, input, output) = dirs();
  let path = input.join("broken.png");
  std::fs::write(&path, b"definitely not a png").expect("write");

  let detector = FakeDetector::new(Vec::new());
  let ctx = context(detector.clone(), FakeCodec::new(0, 1, 1, FrameRate::default()), &output);

  assert!(matches!(process_image(&ctx, &path), Err(TaskError::Decode(_))));
  assert!(!output.join("broken.png").exists());
  assert_eq!(detector.calls(), 0);
}

#[test]
fn detector_failure_leaves_no_output() {
  let (_dir, input, output) = dirs();
  let path = input.join("fail.png");
  write_png(&path, 8, 8);

  let ctx = context(
    FakeDetector::failing(),
    FakeCodec::new(0, 1, 1, FrameRate::default()),
    &output,
  );
  assert!(matches!(process_image(&ctx, &path), Err(TaskError::Detection(_))));
  assert!(!output.join("fail.png").exists());
}

#[test]
fn video_writes_every_frame_with_input_properties() {
  let (_dir, input, output) = dirs();
  let path = input.join("clip.mp4");
  std::fs::write(&path, b"fake video").expect("write");

  let rate = FrameRate::new(30000, 1001);
  let codec = FakeCodec::new(7, 48, 32, rate);
  let detector = FakeDetector::new(vec![cat_detection()]);
  let ctx = context(detector.clone(), codec.clone(), &output);

  let result = process_video(&ctx, &path).expect("process");
  assert_eq!(result, output.join("processed_clip.mp4"));
  assert!(result.exists());

  let written = codec.written();
  assert_eq!(written.len(), 7);
  assert!(written.iter().all(|f| f.dimensions() == (48, 32)));
  assert_eq!(written[0].get_pixel(10, 10), &GREEN);
  assert_eq!(codec.output_info(), Some(VideoInfo::new(48, 32, rate)));
  assert_eq!(detector.calls(), 7);
}

#[test]
fn empty_video_is_empty_media_without_output() {
  let (_dir, input, output) = dirs();
  let path = input.join("empty.avi");
  std::fs::write(&path, b"fake video").expect("write");

  let codec = FakeCodec::new(0, 48, 32, FrameRate::default());
  let ctx = context(FakeDetector::new(Vec::new()), codec.clone(), &output);

  assert!(matches!(process_video(&ctx, &path), Err(TaskError::EmptyMedia)));
  assert!(!output.join("processed_empty.avi").exists());
  assert!(codec.written().is_empty());
}

#[test]
fn video_detector_failure_removes_partial_output() {
  let (_dir, input, output) = dirs();
  let path = input.join("clip.avi");
  std::fs::write(&path, b"fake video").expect("write");

  let ctx = context(
    FakeDetector::failing(),
    FakeCodec::new(3, 16, 16, FrameRate::default()),
    &output,
  );
  assert!(matches!(process_video(&ctx, &path), Err(TaskError::Detection(_))));
  assert!(!output.join("processed_clip.avi").exists());
}

#[test]
fn failed_output_keeps_earlier_result() {
  let (_dir, input, output) = dirs();
  let path = input.join("clip.mp4");
  std::fs::write(&path, b"fake video").expect("write");
  let earlier = output.join("processed_clip.mp4");
  std::fs::write(&earlier, b"earlier good result").expect("write");

  let detector = FakeDetector::new(Vec::new());
  let codec = FakeCodec::new(3, 16, 16, FrameRate::default()).with_failing_output();
  let ctx = context(detector.clone(), codec, &output);

  assert!(matches!(process_video(&ctx, &path), Err(TaskError::Encode(_))));
  assert_eq!(std::fs::read(&earlier).expect("earlier"), b"earlier good result");
  assert_eq!(detector.calls(), 0);
}

#[test]
fn missing_video_is_decode_error() {
  let (_dir, _input, output) = dirs();
  let ctx = context(
    FakeDetector::new(Vec::new()),
    FakeCodec::new(3, 16, 16, FrameRate::default()),
    &output,
  );
  let missing = output.join("nope.mp4");
  assert!(matches!(process_video(&ctx, &missing), Err(TaskError::Decode(_))));
  assert!(!output.join("processed_nope.mp4").exists());
}
