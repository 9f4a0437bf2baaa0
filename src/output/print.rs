// 该文件是 Wangyuan （望远） 项目的一部分。
// src/output/print.rs - 控制台输出检测结果
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

use std::io::Write;

use image::RgbImage;

use crate::{model::DetectResult, output::Render};

/// 只输出分数严格大于 0 的检测，遇到哨兵分数即停止
pub fn write_results<W: Write>(out: &mut W, result: &DetectResult) -> std::io::Result<()> {
  writeln!(out, "Print results: ")?;
  for item in result.displayable() {
    writeln!(
      out,
      "     label: {}, score: {:.6}, box: {:?}",
      item.label, item.score, item.bbox
    )?;
  }
  Ok(())
}

#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl Render<RgbImage, DetectResult> for ConsoleOutput {
  type Error = std::io::Error;

  fn render_result(&self, _frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    write_results(&mut lock, result)?;
    lock.flush()
  }
}
