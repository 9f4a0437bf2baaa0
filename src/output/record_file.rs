// 该文件是 Wangyuan （望远） 项目的一部分。
// src/output/record_file.rs - 检测结果记录文件
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

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult},
  output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RecordFileError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把哨兵之前的检测写成 JSON
pub struct RecordFileOutput {
  path: String,
  pretty: bool,
}

#[derive(Serialize)]
struct Record<'a> {
  created_at: DateTime<Utc>,
  width: u32,
  height: u32,
  detections: Vec<&'a DetectItem>,
}

impl FromUrlWithScheme for RecordFileOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordFileOutput {
  type Error = RecordFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RecordFileError::SchemeMismatch(uri.scheme().to_string()));
    }

    let pretty = uri
      .query_pairs()
      .any(|(k, v)| k == "pretty" && v != "false");

    Ok(Self {
      path: url_file_path(uri),
      pretty,
    })
  }
}

impl Render<RgbImage, DetectResult> for RecordFileOutput {
  type Error = RecordFileError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let record = Record {
      created_at: Utc::now(),
      width: frame.width(),
      height: frame.height(),
      detections: result.until_sentinel().collect(),
    };

    let json = if self.pretty {
      serde_json::to_string_pretty(&record)?
    } else {
      serde_json::to_string(&record)?
    };

    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, json)?;
    info!("检测记录写入: {}", self.path);
    Ok(())
  }
}
