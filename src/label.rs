// 该文件是 Wangyuan （望远） 项目的一部分。
// src/label.rs - 类别标签表
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

use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 类别标签表，行号（从 0 开始）即类别编号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: Vec<String>,
}

impl LabelTable {
  pub fn new(labels: Vec<String>) -> Self {
    Self { labels }
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let content = std::fs::read_to_string(path)?;
    Ok(Self::from_lines(&content))
  }

  /// 读取标签文件；失败时记录警告并退回空表，检测结果将使用原始类别编号
  pub fn from_file_or_empty(path: Option<&Path>) -> Self {
    let Some(path) = path else {
      debug!("未指定标签文件，将使用原始类别编号");
      return Self::default();
    };

    match Self::from_file(path) {
      Ok(table) => {
        debug!("加载标签 {} 个: {}", table.len(), path.display());
        table
      }
      Err(e) => {
        warn!("无法读取标签文件 {}, 将使用原始类别编号: {}", path.display(), e);
        Self::default()
      }
    }
  }

  pub fn from_lines(content: &str) -> Self {
    Self {
      labels: content.lines().map(str::to_owned).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: i64) -> Option<&str> {
    usize::try_from(index)
      .ok()
      .and_then(|i| self.labels.get(i))
      .map(String::as_str)
  }

  /// 把类别编号解析为名称，越界时返回编号本身的字符串形式
  pub fn resolve(&self, index: i64) -> String {
    match self.get(index) {
      Some(label) => label.to_string(),
      None => index.to_string(),
    }
  }
}
