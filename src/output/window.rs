// 该文件是 Wangyuan （望远） 项目的一部分。
// src/output/window.rs - 桌面窗口显示
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

//! 把标注后的图像显示在窗口中，直到窗口关闭或按下 ESC。
//!
//! # URL 格式
//!
//! - `window://` - 默认标题
//! - `window://?title=结果` - 指定窗口标题

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError, rgb_to_argb},
  },
};

const DEFAULT_TITLE: &str = "Wangyuan - ESC 退出";
const WINDOW_FPS: usize = 30;

#[derive(Error, Debug)]
pub enum WindowOutputError {
  #[error("窗口错误: {0}")]
  WindowError(#[from] minifb::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub struct WindowOutput {
  title: String,
  draw: Draw,
}

impl WindowOutput {
  pub fn new() -> Result<Self, WindowOutputError> {
    Ok(Self {
      title: DEFAULT_TITLE.to_string(),
      draw: Draw::new()?,
    })
  }
}

impl FromUrlWithScheme for WindowOutput {
  const SCHEME: &'static str = "window";
}

impl FromUrl for WindowOutput {
  type Error = WindowOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(WindowOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let mut output = Self::new()?;
    if let Some((_, title)) = uri.query_pairs().find(|(k, _)| k == "title") {
      output.title = title.into_owned();
    }
    Ok(output)
  }
}

impl Render<RgbImage, DetectResult> for WindowOutput {
  type Error = WindowOutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.draw_detection(frame, result);
    let (width, height) = (image.width() as usize, image.height() as usize);
    let buffer = rgb_to_argb(&image);

    let mut window = Window::new(&self.title, width, height, WindowOptions::default())?;
    window.set_target_fps(WINDOW_FPS);
    info!("显示检测结果窗口: {}x{}", width, height);

    while window.is_open() && !window.is_key_down(Key::Escape) {
      window.update_with_buffer(&buffer, width, height)?;
    }

    info!("窗口已关闭");
    Ok(())
  }
}
