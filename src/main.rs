// 该文件是 Wangyuan （望远） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wangyuan::{
  FromUrl,
  label::LabelTable,
  model::OnnxDetectorBuilder,
  normalize::ImageNormalizer,
  output::{ConsoleOutput, OutputWrapper},
  task::{OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("图像文件路径: {}", args.image.display());
  if let Some(labels) = &args.labels {
    info!("标签文件路径: {}", labels.display());
  }

  let config = args.detector_config().context("配置无效")?;
  info!("输入节点: {}", config.model.input);
  info!("输出节点: {:?}", config.model.output_names());

  let labels = LabelTable::from_file_or_empty(args.labels.as_deref());
  let normalizer = ImageNormalizer::new(config.preprocess.clone())?;

  let mut outputs = vec![OutputWrapper::Console(ConsoleOutput)];
  for url in &args.output {
    info!("输出: {}", url);
    outputs.push(OutputWrapper::from_url(url).with_context(|| format!("无法创建输出: {}", url))?);
  }
  if args.gui {
    #[cfg(feature = "window")]
    outputs.push(OutputWrapper::WindowOutput(wangyuan::output::WindowOutput::new()?));
    #[cfg(not(feature = "window"))]
    warn!("未启用 window 特性，忽略 --gui");
  }

  let image_bytes = std::fs::read(&args.image)
    .with_context(|| format!("无法读取图像文件: {}", args.image.display()))?;

  info!("正在加载模型...");
  let mut model = OnnxDetectorBuilder::new(&args.model, config.model.clone())
    .intra_threads(args.threads)
    .build()
    .with_context(|| format!("无法加载模型: {}", args.model.display()))?;

  let result = OneShotTask::new(&normalizer, &labels).run_task(
    image_bytes.as_slice(),
    &mut model,
    outputs,
  )?;

  if result.displayable().next().is_none() {
    warn!("未检测到任何对象");
  }
  info!("处理完成");

  Ok(())
}
