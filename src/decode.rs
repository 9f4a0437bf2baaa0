// 该文件是 Wangyuan （望远） 项目的一部分。
// src/decode.rs - 输出张量解码
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

use thiserror::Error;
use tracing::debug;

use crate::{
  label::LabelTable,
  model::{DetectItem, DetectResult},
};

const BOX_DIM: usize = 4;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("{name} 张量形状无效: {shape:?}")]
  Shape { name: &'static str, shape: Vec<i64> },
  #[error("{name} 张量数据长度 {len} 与形状 {shape:?} 不符")]
  DataLength {
    name: &'static str,
    shape: Vec<i64>,
    len: usize,
  },
  #[error("检测数量不一致: 框 {boxes}, 分数 {scores}, 类别 {labels}")]
  CountMismatch {
    boxes: usize,
    scores: usize,
    labels: usize,
  },
}

/// 运行时返回的扁平张量（形状 + 行主序数据）
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a, T> {
  pub shape: &'a [i64],
  pub data: &'a [T],
}

impl<'a, T> TensorView<'a, T> {
  pub fn new(shape: &'a [i64], data: &'a [T]) -> Self {
    Self { shape, data }
  }
}

/// 校验后的三路原始输出，三者长度一致
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
  boxes: Vec<[f32; 4]>,
  scores: Vec<f32>,
  labels: Vec<i64>,
}

impl RawDetections {
  pub fn new(boxes: Vec<[f32; 4]>, scores: Vec<f32>, labels: Vec<i64>) -> Result<Self, DecodeError> {
    if boxes.len() != scores.len() || boxes.len() != labels.len() {
      return Err(DecodeError::CountMismatch {
        boxes: boxes.len(),
        scores: scores.len(),
        labels: labels.len(),
      });
    }
    Ok(Self {
      boxes,
      scores,
      labels,
    })
  }

  /// 从 [1, N, 4] / [1, N] / [1, N]（或省略批维度）三个张量构造
  pub fn from_tensors(
    boxes: TensorView<f32>,
    scores: TensorView<f32>,
    labels: TensorView<i64>,
  ) -> Result<Self, DecodeError> {
    let box_rows = rows("boxes", boxes.shape, boxes.data.len(), Some(BOX_DIM))?;
    let score_rows = rows("scores", scores.shape, scores.data.len(), None)?;
    let label_rows = rows("labels", labels.shape, labels.data.len(), None)?;
    debug!(
      "输出张量: 框 {:?}, 分数 {:?}, 类别 {:?}",
      boxes.shape, scores.shape, labels.shape
    );

    if box_rows != score_rows || box_rows != label_rows {
      return Err(DecodeError::CountMismatch {
        boxes: box_rows,
        scores: score_rows,
        labels: label_rows,
      });
    }

    let boxes = boxes
      .data
      .chunks_exact(BOX_DIM)
      .map(|b| [b[0], b[1], b[2], b[3]])
      .collect();

    Ok(Self {
      boxes,
      scores: scores.data.to_vec(),
      labels: labels.data.to_vec(),
    })
  }

  pub fn len(&self) -> usize {
    self.scores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }

  pub fn boxes(&self) -> &[[f32; 4]] {
    &self.boxes
  }

  pub fn scores(&self) -> &[f32] {
    &self.scores
  }

  pub fn labels(&self) -> &[i64] {
    &self.labels
  }
}

/// 解析张量的检测行数，允许前置的批维度 1
fn rows(
  name: &'static str,
  shape: &[i64],
  len: usize,
  width: Option<usize>,
) -> Result<usize, DecodeError> {
  let shape_error = || DecodeError::Shape {
    name,
    shape: shape.to_vec(),
  };

  let expected_rank = if width.is_some() { 2 } else { 1 };
  let dims = match shape {
    [1, rest @ ..] if rest.len() == expected_rank => rest,
    dims if dims.len() == expected_rank => dims,
    _ => return Err(shape_error()),
  };

  let n = usize::try_from(dims[0]).map_err(|_| shape_error())?;
  if let Some(width) = width
    && usize::try_from(dims[1]).ok() != Some(width)
  {
    return Err(shape_error());
  }

  if n.checked_mul(width.unwrap_or(1)) != Some(len) {
    return Err(DecodeError::DataLength {
      name,
      shape: shape.to_vec(),
      len,
    });
  }
  Ok(n)
}

/// 把原始输出转换为检测记录，并通过标签表解析类别名称
#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder<'a> {
  labels: &'a LabelTable,
}

impl<'a> DetectionDecoder<'a> {
  pub fn new(labels: &'a LabelTable) -> Self {
    Self { labels }
  }

  /// 保持网络输出顺序，不重新排序、不过滤
  pub fn decode(&self, raw: &RawDetections) -> DetectResult {
    let items: Box<[DetectItem]> = raw
      .boxes
      .iter()
      .zip(&raw.scores)
      .zip(&raw.labels)
      .map(|((bbox, score), class_id)| DetectItem {
        label: self.labels.resolve(*class_id),
        class_id: *class_id,
        score: *score,
        bbox: *bbox,
      })
      .collect();

    debug!("解码检测 {} 条", items.len());
    DetectResult { items }
  }
}
