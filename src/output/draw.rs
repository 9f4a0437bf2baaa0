// 该文件是 Wangyuan （望远） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_OFFSET_X: i32 = 5;
const SCORE_BASELINE_OFFSET_Y: i32 = 10;
const LABEL_BASELINE_OFFSET_Y: i32 = -5;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

#[derive(Error, Debug)]
#[error("无法加载嵌入的字体文件: {0}")]
pub struct DrawError(String);

pub struct Draw {
  font: FontRef<'static>,
  font_size: f32,
  color: [u8; 3],
}

impl Draw {
  pub fn new() -> Result<Self, DrawError> {
    let font = FontRef::try_from_slice(FONT_DATA).map_err(|e| DrawError(e.to_string()))?;
    Ok(Self {
      font,
      font_size: LABEL_FONT_SIZE,
      color: BOX_COLOR,
    })
  }

  /// 在副本上绘制检测结果
  pub fn draw_detection(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut image = image.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }

  /// 绘制哨兵之前的全部检测（包括分数为 0 的）
  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.until_sentinel() {
      self.draw_bbox_with_label(image, item);
    }
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem) {
    let color = Rgb(self.color);
    let (width, height) = (image.width() as f32, image.height() as f32);
    let [x1, y1, x2, y2] = [
      clamp_coord(item.bbox[0], width),
      clamp_coord(item.bbox[1], height),
      clamp_coord(item.bbox[2], width),
      clamp_coord(item.bbox[3], height),
    ];

    // imageproc 的矩形宽高至少为 1
    for t in 0..BOX_THICKNESS {
      let width = (x2 - x1 - 2 * t).max(1) as u32;
      let height = (y2 - y1 - 2 * t).max(1) as u32;
      draw_hollow_rect_mut(image, Rect::at(x1 + t, y1 + t).of_size(width, height), color);
    }

    // 文本位置以基线给出，draw_text_mut 使用左上角
    let scale = PxScale::from(self.font_size);
    let ascent = self.font_size as i32;
    let score = format!("{}", item.score);
    draw_text_mut(
      image,
      color,
      x2 + LABEL_OFFSET_X,
      y2 + SCORE_BASELINE_OFFSET_Y - ascent,
      scale,
      &self.font,
      &score,
    );
    draw_text_mut(
      image,
      color,
      x2 + LABEL_OFFSET_X,
      y1 + LABEL_BASELINE_OFFSET_Y - ascent,
      scale,
      &self.font,
      &item.label,
    );
  }
}

/// 把坐标限制在 [-extent, 2 * extent]，NaN 取 0，后续整数运算不会溢出
fn clamp_coord(value: f32, extent: f32) -> i32 {
  value.clamp(-extent, 2.0 * extent) as i32
}

/// RGB 像素打包为 0RGB u32
pub fn rgb_to_argb(image: &RgbImage) -> Vec<u32> {
  image
    .pixels()
    .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2]))
    .collect()
}
