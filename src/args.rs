// 该文件是 Wangyuan （望远） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use wangyuan::config::{ChannelOrder, ConfigError, DetectorConfig, ResizeMode};

/// Wangyuan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 图像文件路径
  #[arg(long, value_name = "FILE")]
  pub image: PathBuf,

  /// ONNX 模型文件路径
  #[arg(long, value_name = "FILE")]
  pub model: PathBuf,

  /// 标签文件路径，每行一个标签（可选）
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 在窗口中显示结果
  #[arg(long)]
  pub gui: bool,

  /// 额外输出，可重复指定
  /// 支持格式:
  /// - 图片: image:///path/to/out.png
  /// - 记录: record:///path/to/out.json[?pretty]
  /// - 窗口: window://[?title=...]
  #[arg(long, value_name = "URL")]
  pub output: Vec<Url>,

  /// JSON 配置文件路径
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 输入节点名称
  #[arg(long, value_name = "NAME")]
  pub input_node: Option<String>,

  /// 边界框输出节点名称
  #[arg(long, value_name = "NAME")]
  pub boxes_node: Option<String>,

  /// 分数输出节点名称
  #[arg(long, value_name = "NAME")]
  pub scores_node: Option<String>,

  /// 类别输出节点名称
  #[arg(long, value_name = "NAME")]
  pub labels_node: Option<String>,

  /// 缩放模式: native | fixed:WxH | bounded:MIN:MAX
  #[arg(long, value_name = "MODE")]
  pub resize: Option<ResizeMode>,

  /// 输入通道顺序
  #[arg(long, value_enum)]
  pub channel_order: Option<ChannelOrder>,

  /// 推理线程数
  #[arg(long, value_name = "COUNT")]
  pub threads: Option<usize>,
}

impl Args {
  /// 读取配置文件（若有），再以命令行参数覆盖
  pub fn detector_config(&self) -> Result<DetectorConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => DetectorConfig::from_json_file(path)?,
      None => DetectorConfig::default(),
    };

    let model = &mut config.model;
    for (value, slot) in [
      (&self.input_node, &mut model.input),
      (&self.boxes_node, &mut model.boxes),
      (&self.scores_node, &mut model.scores),
      (&self.labels_node, &mut model.labels),
    ] {
      if let Some(value) = value {
        slot.clone_from(value);
      }
    }

    if let Some(resize) = self.resize {
      config.preprocess.resize = resize;
    }
    if let Some(order) = self.channel_order {
      config.preprocess.channel_order = order;
    }

    Ok(config)
  }
}
