// 该文件是 Wangyuan （望远） 项目的一部分。
// src/task.rs - 单张图像推理任务
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

use anyhow::Context;
use image::RgbImage;
use tracing::info;

use crate::{
  decode::{DetectionDecoder, RawDetections},
  label::LabelTable,
  model::{DetectResult, Model},
  normalize::{ImageNormalizer, InputTensor, decode_image},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<DetectResult, Self::Error>;
}

/// 解码 → 归一化 → 推理 → 解码输出 → 渲染，每一步只执行一次
pub struct OneShotTask<'a> {
  normalizer: &'a ImageNormalizer,
  labels: &'a LabelTable,
}

impl<'a> OneShotTask<'a> {
  pub fn new(normalizer: &'a ImageNormalizer, labels: &'a LabelTable) -> Self {
    Self { normalizer, labels }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Model<Input = InputTensor, Output = RawDetections, Error = ME>,
  O: Render<RgbImage, DetectResult, Error = RE>,
> Task<&[u8], &mut M, O> for OneShotTask<'_>
{
  type Error = anyhow::Error;

  fn run_task(self, input: &[u8], model: &mut M, output: O) -> Result<DetectResult, Self::Error> {
    info!("开始任务...");
    let image = decode_image(input).context("无法解码输入图像")?;
    let tensor = self.normalizer.normalize_image(&image)?;
    info!(
      "输入图像 {}x{}, 网络输入 {}x{}",
      image.width(),
      image.height(),
      tensor.width(),
      tensor.height()
    );

    let now = std::time::Instant::now();
    let raw = model.infer(&tensor)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let result = DetectionDecoder::new(self.labels)
      .decode(&raw)
      .to_source_space(&tensor);
    info!(
      "检测槽位 {} 个, 有效检测 {} 个",
      result.len(),
      result.displayable().count()
    );

    let now = std::time::Instant::now();
    output.render_result(&image, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}
