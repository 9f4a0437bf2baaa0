// 该文件是 Wangyuan （望远） 项目的一部分。
// src/config.rs - 检测器配置
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

use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const DEFAULT_INPUT_NODE: &str = "input_1";
const DEFAULT_BOXES_NODE: &str = "filtered_detections/map/TensorArrayStack/TensorArrayGatherV3";
const DEFAULT_SCORES_NODE: &str = "filtered_detections/map/TensorArrayStack_1/TensorArrayGatherV3";
const DEFAULT_LABELS_NODE: &str = "filtered_detections/map/TensorArrayStack_2/TensorArrayGatherV3";

/// caffe 风格预处理的 BGR 均值（ResNet-50 训练时使用）
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("缩放模式无效: {0}")]
  InvalidResize(String),
  #[error("归一化参数无效: {0}")]
  InvalidNormalization(String),
}

/// 检测器整体配置，构建后不可变，按引用传给各组件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
  pub model: ModelConfig,
  pub preprocess: PreprocessConfig,
}

/// 模型计算图的输入输出节点名称
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub input: String,
  pub boxes: String,
  pub scores: String,
  pub labels: String,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      input: DEFAULT_INPUT_NODE.to_string(),
      boxes: DEFAULT_BOXES_NODE.to_string(),
      scores: DEFAULT_SCORES_NODE.to_string(),
      labels: DEFAULT_LABELS_NODE.to_string(),
    }
  }
}

impl ModelConfig {
  /// 按固定顺序（框、分数、类别）返回输出节点名称
  pub fn output_names(&self) -> [&str; 3] {
    [&self.boxes, &self.scores, &self.labels]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
  pub resize: ResizeMode,
  pub channel_order: ChannelOrder,
  /// 按输出通道顺序排列的均值
  pub mean: [f32; 3],
  /// 按输出通道顺序排列的缩放除数
  pub std: [f32; 3],
}

impl Default for PreprocessConfig {
  fn default() -> Self {
    Self {
      resize: ResizeMode::Native,
      channel_order: ChannelOrder::Bgr,
      mean: CAFFE_MEAN_BGR,
      std: [1.0, 1.0, 1.0],
    }
  }
}

impl PreprocessConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if let Some(s) = self.std.iter().find(|s| **s == 0.0 || !s.is_finite()) {
      return Err(ConfigError::InvalidNormalization(format!(
        "std 必须为非零有限值, 实际为 {}",
        s
      )));
    }
    if self.mean.iter().any(|m| !m.is_finite()) {
      return Err(ConfigError::InvalidNormalization(format!(
        "mean 必须为有限值, 实际为 {:?}",
        self.mean
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResizeMode {
  /// 保持原始分辨率，由网络内部缩放
  Native,
  /// 拉伸到固定尺寸
  Fixed { width: u32, height: u32 },
  /// 短边缩放到 min_side，长边不超过 max_side
  Bounded { min_side: u32, max_side: u32 },
}

impl FromStr for ResizeMode {
  type Err = ConfigError;

  /// 解析 `native`、`fixed:WxH` 或 `bounded:MIN:MAX`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || ConfigError::InvalidResize(s.to_string());
    let parse = |v: &str| v.trim().parse::<u32>().ok().filter(|v| *v > 0);

    let (mode, rest) = s.split_once(':').unwrap_or((s, ""));
    match mode.trim() {
      "native" if rest.is_empty() => Ok(ResizeMode::Native),
      "fixed" => {
        let (w, h) = rest.split_once('x').ok_or_else(invalid)?;
        Ok(ResizeMode::Fixed {
          width: parse(w).ok_or_else(invalid)?,
          height: parse(h).ok_or_else(invalid)?,
        })
      }
      "bounded" => {
        let (min, max) = rest.split_once(':').ok_or_else(invalid)?;
        let min_side = parse(min).ok_or_else(invalid)?;
        let max_side = parse(max).ok_or_else(invalid)?;
        if min_side > max_side {
          return Err(invalid());
        }
        Ok(ResizeMode::Bounded { min_side, max_side })
      }
      _ => Err(invalid()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

impl DetectorConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: DetectorConfig = serde_json::from_str(&content)?;
    config.preprocess.validate()?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resize_mode_parse() {
    assert_eq!("native".parse::<ResizeMode>().unwrap(), ResizeMode::Native);
    assert_eq!(
      "fixed:640x480".parse::<ResizeMode>().unwrap(),
      ResizeMode::Fixed {
        width: 640,
        height: 480
      }
    );
    assert_eq!(
      "bounded:800:1333".parse::<ResizeMode>().unwrap(),
      ResizeMode::Bounded {
        min_side: 800,
        max_side: 1333
      }
    );
  }

  #[test]
  fn test_resize_mode_parse_invalid() {
    for s in ["", "fixed", "fixed:640", "fixed:0x10", "bounded:900:800", "native:1", "zoom"] {
      assert!(s.parse::<ResizeMode>().is_err(), "应当拒绝 {:?}", s);
    }
  }

  #[test]
  fn test_partial_json_keeps_defaults() {
    let json = r#"{ "model": { "input": "images" }, "preprocess": { "channel_order": "rgb" } }"#;
    let config: DetectorConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.model.input, "images");
    assert_eq!(config.model.boxes, DEFAULT_BOXES_NODE);
    assert_eq!(config.preprocess.channel_order, ChannelOrder::Rgb);
    assert_eq!(config.preprocess.mean, CAFFE_MEAN_BGR);
    assert_eq!(config.preprocess.resize, ResizeMode::Native);
  }

  #[test]
  fn test_resize_json_tagged() {
    let json = r#"{ "preprocess": { "resize": { "mode": "bounded", "min_side": 800, "max_side": 1333 } } }"#;
    let config: DetectorConfig = serde_json::from_str(json).unwrap();
    assert_eq!(
      config.preprocess.resize,
      ResizeMode::Bounded {
        min_side: 800,
        max_side: 1333
      }
    );
  }

  #[test]
  fn test_zero_std_rejected() {
    let config = PreprocessConfig {
      std: [1.0, 0.0, 1.0],
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_from_json_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "model": {{ "scores": "scores" }}, "preprocess": {{ "std": [2.0, 2.0, 2.0] }} }}"#)
      .unwrap();
    let config = DetectorConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.model.scores, "scores");
    assert_eq!(config.model.input, DEFAULT_INPUT_NODE);
    assert_eq!(config.preprocess.std, [2.0, 2.0, 2.0]);

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, r#"{{ "preprocess": {{ "std": [1.0, 0.0, 1.0] }} }}"#).unwrap();
    assert!(matches!(
      DetectorConfig::from_json_file(bad.path()),
      Err(ConfigError::InvalidNormalization(_))
    ));
  }

  #[test]
  fn test_output_names_order() {
    let config = ModelConfig::default();
    assert_eq!(
      config.output_names(),
      [DEFAULT_BOXES_NODE, DEFAULT_SCORES_NODE, DEFAULT_LABELS_NODE]
    );
  }
}
