// 该文件是 Wangyuan （望远） 项目的一部分。
// src/normalize.rs - 图像归一化，生成网络输入张量
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

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;
use thiserror::Error;
use tracing::debug;

use crate::config::{ChannelOrder, ConfigError, PreprocessConfig, ResizeMode};

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("图像尺寸无效: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("预处理配置错误: {0}")]
  Config(#[from] ConfigError),
}

/// 网络输入张量，形状为 [1, H, W, 3]
#[derive(Debug, Clone)]
pub struct InputTensor {
  pub data: Array4<f32>,
  /// 缩放后尺寸与原图尺寸之比 (x, y)
  pub scale: (f32, f32),
  /// 原图尺寸 (宽, 高)
  pub source_size: (u32, u32),
}

impl InputTensor {
  pub fn height(&self) -> usize {
    self.data.shape()[1]
  }

  pub fn width(&self) -> usize {
    self.data.shape()[2]
  }
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
  config: PreprocessConfig,
}

impl ImageNormalizer {
  pub fn new(config: PreprocessConfig) -> Result<Self, NormalizeError> {
    config.validate()?;
    Ok(Self { config })
  }

  /// 解码图像字节并归一化
  pub fn normalize(&self, bytes: &[u8]) -> Result<InputTensor, NormalizeError> {
    let image = decode_image(bytes)?;
    self.normalize_image(&image)
  }

  pub fn normalize_image(&self, image: &RgbImage) -> Result<InputTensor, NormalizeError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
      return Err(NormalizeError::EmptyImage(src_w, src_h));
    }

    let ((dst_w, dst_h), scale) = target_size(self.config.resize, src_w, src_h);
    if dst_w == 0 || dst_h == 0 {
      return Err(NormalizeError::EmptyImage(dst_w, dst_h));
    }

    let resized;
    let image = if (dst_w, dst_h) == (src_w, src_h) {
      image
    } else {
      debug!("缩放图像: {}x{} -> {}x{}", src_w, src_h, dst_w, dst_h);
      resized = image::imageops::resize(image, dst_w, dst_h, FilterType::Triangle);
      &resized
    };

    let PreprocessConfig {
      channel_order,
      mean,
      std,
      ..
    } = &self.config;

    let data = Array4::from_shape_fn(
      (1, dst_h as usize, dst_w as usize, RGB_CHANNELS),
      |(_, y, x, c)| {
        let src_c = match channel_order {
          ChannelOrder::Rgb => c,
          ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
        };
        let value = f32::from(image.get_pixel(x as u32, y as u32)[src_c]);
        (value - mean[c]) / std[c]
      },
    );
    debug!("输入张量形状: {:?}", data.shape());

    Ok(InputTensor {
      data,
      scale,
      source_size: (src_w, src_h),
    })
  }
}

pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, NormalizeError> {
  Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// 按缩放模式计算目标尺寸及 (x, y) 缩放系数
///
/// `Bounded` 使用单一缩放系数，边界框按该系数还原，不受尺寸取整影响。
fn target_size(mode: ResizeMode, width: u32, height: u32) -> ((u32, u32), (f32, f32)) {
  match mode {
    ResizeMode::Native => ((width, height), (1.0, 1.0)),
    ResizeMode::Fixed {
      width: dst_w,
      height: dst_h,
    } => (
      (dst_w, dst_h),
      (dst_w as f32 / width as f32, dst_h as f32 / height as f32),
    ),
    ResizeMode::Bounded { min_side, max_side } => {
      let (w, h) = (width as f64, height as f64);
      let mut scale = min_side as f64 / w.min(h);
      if w.max(h) * scale > max_side as f64 {
        scale = max_side as f64 / w.max(h);
      }
      (
        ((w * scale).round() as u32, (h * scale).round() as u32),
        (scale as f32, scale as f32),
      )
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use image::{DynamicImage, ImageFormat, Rgb};

  use super::*;

  fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
      .write_to(&mut Cursor::new(&mut buf), format)
      .unwrap();
    buf
  }

  fn plain(resize: ResizeMode, order: ChannelOrder) -> ImageNormalizer {
    ImageNormalizer::new(PreprocessConfig {
      resize,
      channel_order: order,
      mean: [0.0; 3],
      std: [1.0; 3],
    })
    .unwrap()
  }

  #[test]
  fn test_native_shape_and_bgr_default() {
    let bytes = encode(RgbImage::from_pixel(4, 2, Rgb([10, 20, 30])), ImageFormat::Png);
    let normalizer = ImageNormalizer::new(PreprocessConfig::default()).unwrap();
    let tensor = normalizer.normalize(&bytes).unwrap();

    assert_eq!(tensor.data.shape(), &[1, 2, 4, 3]);
    assert_eq!(tensor.scale, (1.0, 1.0));
    assert_eq!(tensor.source_size, (4, 2));

    let px: ndarray::ArrayView1<f32> = tensor.data.slice(ndarray::s![0, 1, 3, ..]);
    assert!((px[0] - (30.0 - 103.939)).abs() < 1e-4);
    assert!((px[1] - (20.0 - 116.779)).abs() < 1e-4);
    assert!((px[2] - (10.0 - 123.68)).abs() < 1e-4);
  }

  #[test]
  fn test_rgb_order_and_std() {
    let normalizer = ImageNormalizer::new(PreprocessConfig {
      resize: ResizeMode::Native,
      channel_order: ChannelOrder::Rgb,
      mean: [127.5; 3],
      std: [127.5; 3],
    })
    .unwrap();
    let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 127]));
    let tensor = normalizer.normalize_image(&image).unwrap();
    let px: ndarray::ArrayView1<f32> = tensor.data.slice(ndarray::s![0, 0, 0, ..]);
    assert!((px[0] - 1.0).abs() < 1e-6);
    assert!((px[1] + 1.0).abs() < 1e-6);
    assert!((px[2] - (-0.5 / 127.5)).abs() < 1e-6);
  }

  #[test]
  fn test_fixed_resize() {
    let image = RgbImage::from_pixel(8, 4, Rgb([1, 2, 3]));
    let tensor = plain(
      ResizeMode::Fixed {
        width: 2,
        height: 6,
      },
      ChannelOrder::Rgb,
    )
    .normalize_image(&image)
    .unwrap();
    assert_eq!(tensor.data.shape(), &[1, 6, 2, 3]);
    assert_eq!(tensor.scale, (0.25, 1.5));
    assert!((tensor.data[[0, 3, 1, 2]] - 3.0).abs() < 1e-4);
  }

  #[test]
  fn test_bounded_resize_caps_long_side() {
    assert_eq!(
      target_size(
        ResizeMode::Bounded {
          min_side: 20,
          max_side: 30
        },
        100,
        50
      )
      .0,
      (30, 15)
    );
    assert_eq!(
      target_size(
        ResizeMode::Bounded {
          min_side: 800,
          max_side: 1333
        },
        400,
        300
      )
      .0,
      (1067, 800)
    );
  }

  #[test]
  fn test_bounded_scale_is_uniform() {
    // 333 * 0.5 = 166.5 取整为 167，缩放系数仍为 0.5
    let image = RgbImage::new(333, 100);
    let tensor = plain(
      ResizeMode::Bounded {
        min_side: 50,
        max_side: 1000,
      },
      ChannelOrder::Bgr,
    )
    .normalize_image(&image)
    .unwrap();
    assert_eq!((tensor.width(), tensor.height()), (167, 50));
    assert_eq!(tensor.scale, (0.5, 0.5));
  }

  #[test]
  fn test_jpeg_batch_and_channels() {
    let bytes = encode(RgbImage::from_pixel(16, 9, Rgb([200, 100, 50])), ImageFormat::Jpeg);
    let tensor = plain(ResizeMode::Native, ChannelOrder::Bgr)
      .normalize(&bytes)
      .unwrap();
    assert_eq!(tensor.data.shape()[0], 1);
    assert_eq!(tensor.data.shape()[3], 3);
    assert_eq!((tensor.width(), tensor.height()), (16, 9));
  }

  #[test]
  fn test_garbage_bytes_fail() {
    let err = plain(ResizeMode::Native, ChannelOrder::Rgb)
      .normalize(b"definitely not an image")
      .unwrap_err();
    assert!(matches!(err, NormalizeError::Decode(_)));
  }
}
