// 该文件是 Wangyuan （望远） 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;

use crate::normalize::InputTensor;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  pub label: String,
  pub class_id: i64,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 遇到第一个负分数（哨兵）即停止
  pub fn until_sentinel(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter().take_while(|item| item.score >= 0.0)
  }

  /// 用于打印的有效检测：哨兵之前且分数严格大于 0
  pub fn displayable(&self) -> impl Iterator<Item = &DetectItem> {
    self.until_sentinel().filter(|item| item.score > 0.0)
  }

  /// 把边界框从网络输入坐标映射回原图坐标
  pub fn to_source_space(&self, input: &InputTensor) -> DetectResult {
    let (sx, sy) = input.scale;
    if (sx, sy) == (1.0, 1.0) {
      return self.clone();
    }

    let items = self
      .items
      .iter()
      .map(|item| {
        let [x1, y1, x2, y2] = item.bbox;
        DetectItem {
          bbox: [x1 / sx, y1 / sy, x2 / sx, y2 / sy],
          ..item.clone()
        }
      })
      .collect();
    DetectResult { items }
  }
}

mod onnx;
pub use self::onnx::{OnnxDetector, OnnxDetectorBuilder, OnnxDetectorError};
