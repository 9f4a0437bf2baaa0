// 该文件是 Wangyuan （望远） 项目的一部分。
// tests/pipeline.rs - 单张图像推理流程测试
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

use std::{cell::RefCell, convert::Infallible, io::Cursor};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use wangyuan::{
  config::{PreprocessConfig, ResizeMode},
  decode::{RawDetections, TensorView},
  label::LabelTable,
  model::{DetectResult, Model},
  normalize::{ImageNormalizer, InputTensor},
  output::{Render, write_results},
  task::{OneShotTask, Task},
};

/// 回显固定输出的模型，同时记录收到的输入形状
struct FixtureModel {
  boxes: Vec<f32>,
  scores: Vec<f32>,
  labels: Vec<i64>,
  seen_shape: Option<Vec<usize>>,
}

impl FixtureModel {
  fn new(boxes: Vec<f32>, scores: Vec<f32>, labels: Vec<i64>) -> Self {
    Self {
      boxes,
      scores,
      labels,
      seen_shape: None,
    }
  }
}

impl Model for FixtureModel {
  type Input = InputTensor;
  type Output = RawDetections;
  type Error = std::io::Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.seen_shape = Some(input.data.shape().to_vec());
    let n = self.scores.len() as i64;
    RawDetections::from_tensors(
      TensorView::new(&[1, n, 4], self.boxes.as_slice()),
      TensorView::new(&[1, n], self.scores.as_slice()),
      TensorView::new(&[1, n], self.labels.as_slice()),
    )
    .map_err(std::io::Error::other)
  }
}

#[derive(Default)]
struct Capture {
  result: RefCell<Option<DetectResult>>,
}

impl Render<RgbImage, DetectResult> for &Capture {
  type Error = Infallible;

  fn render_result(&self, _frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    *self.result.borrow_mut() = Some(result.clone());
    Ok(())
  }
}

fn png(width: u32, height: u32) -> Vec<u8> {
  let mut buf = Vec::new();
  DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 200])))
    .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
    .unwrap();
  buf
}

fn native() -> ImageNormalizer {
  ImageNormalizer::new(PreprocessConfig::default()).unwrap()
}

#[test]
fn fixture_triples_round_trip() {
  let boxes = vec![
    0.0, 0.0, 10.0, 10.0, //
    4.5, 6.25, 20.0, 30.0, //
    -1.0, -1.0, -1.0, -1.0,
  ];
  let scores = vec![0.9, 0.35, -1.0];
  let labels = vec![0, 1, -1];
  let mut model = FixtureModel::new(boxes.clone(), scores.clone(), labels.clone());
  let table = LabelTable::new(vec!["cat".into(), "dog".into()]);
  let normalizer = native();
  let capture = Capture::default();

  let result = OneShotTask::new(&normalizer, &table)
    .run_task(png(40, 30).as_slice(), &mut model, &capture)
    .unwrap();

  assert_eq!(model.seen_shape, Some(vec![1, 30, 40, 3]));
  assert_eq!(result.len(), 3);
  for (i, item) in result.items.iter().enumerate() {
    assert_eq!(item.bbox, [boxes[i * 4], boxes[i * 4 + 1], boxes[i * 4 + 2], boxes[i * 4 + 3]]);
    assert_eq!(item.score, scores[i]);
    assert_eq!(item.class_id, labels[i]);
  }
  let names: Vec<&str> = result.items.iter().map(|i| i.label.as_str()).collect();
  assert_eq!(names, vec!["cat", "dog", "-1"]);
  assert_eq!(capture.result.borrow().as_ref(), Some(&result));
}

#[test]
fn missing_label_file_uses_numeric_labels() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("labels.txt");
  let table = LabelTable::from_file_or_empty(Some(path.as_path()));
  let mut model = FixtureModel::new(vec![0.0, 0.0, 10.0, 10.0], vec![0.9], vec![5]);
  let normalizer = native();

  let result = OneShotTask::new(&normalizer, &table)
    .run_task(png(8, 8).as_slice(), &mut model, &Capture::default())
    .unwrap();
  assert_eq!(result.items[0].label, "5");
}

#[test]
fn undecodable_image_aborts_before_inference() {
  let mut model = FixtureModel::new(vec![], vec![], vec![]);
  let normalizer = native();
  let table = LabelTable::default();
  let capture = Capture::default();

  let err = OneShotTask::new(&normalizer, &table).run_task(
    b"\x89PNG but not really".as_slice(),
    &mut model,
    &capture,
  );
  assert!(err.is_err());
  assert!(model.seen_shape.is_none());
  assert!(capture.result.borrow().is_none());
}

#[test]
fn resized_boxes_map_back_to_source() {
  let normalizer = ImageNormalizer::new(PreprocessConfig {
    resize: ResizeMode::Fixed {
      width: 20,
      height: 10,
    },
    ..Default::default()
  })
  .unwrap();
  let mut model = FixtureModel::new(vec![2.0, 2.0, 10.0, 8.0], vec![0.7], vec![0]);

  let result = OneShotTask::new(&normalizer, &LabelTable::default())
    .run_task(png(40, 40).as_slice(), &mut model, &Capture::default())
    .unwrap();
  assert_eq!(model.seen_shape, Some(vec![1, 10, 20, 3]));
  assert_eq!(result.items[0].bbox, [4.0, 8.0, 20.0, 32.0]);
}

#[test]
fn printer_hides_everything_after_sentinel() {
  let mut model = FixtureModel::new(
    vec![0.0; 16],
    vec![0.8, -1.0, 0.6, 0.5],
    vec![0, 0, 0, 0],
  );
  let normalizer = native();
  let table = LabelTable::new(vec!["cat".into()]);

  let result = OneShotTask::new(&normalizer, &table)
    .run_task(png(4, 4).as_slice(), &mut model, &Capture::default())
    .unwrap();

  let mut buf = Vec::new();
  write_results(&mut buf, &result).unwrap();
  let text = String::from_utf8(buf).unwrap();
  assert_eq!(text.lines().count(), 2);
  assert!(text.contains("score: 0.800000"));
}
