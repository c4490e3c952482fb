// 该文件是 Quyu （区域检测） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  bbox::{BoundingBox, CoordinateSpace},
  config::Config,
  pipeline::{DetectItem, DetectResult},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_OFFSET: i32 = 4; // 文字与边框底边的间距
const LABEL_COLOR: [u8; 3] = [0, 0, 0]; // 黑色
const BOX_THICKNESS: u32 = 3;

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("第 {index} 个边界框不在原图坐标空间: {space:?}")]
  NotOriginal {
    index: usize,
    space: CoordinateSpace,
  },
  #[error("第 {index} 个边界框 {bbox:?} 超出图像 {width}x{height}")]
  OutOfBounds {
    index: usize,
    bbox: BoundingBox,
    width: u32,
    height: u32,
  },
  #[error("读取字体文件失败: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
  #[error("未配置标签字体")]
  MissingFont,
}

/// 在原图副本上绘制随机颜色的边框，标签写在框的下方，背景类别不绘制
pub struct Renderer {
  font: Option<FontVec>,
  font_size: f32,
  thickness: u32,
  background_label: String,
  seed: Option<u64>,
}

impl Renderer {
  pub fn new(background_label: impl Into<String>) -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
      background_label: background_label.into(),
      seed: None,
    }
  }

  /// 按配置加载字体
  pub fn from_config(config: &Config) -> Result<Self, RenderError> {
    let renderer = Self::new(config.background_label.clone());
    match &config.font_path {
      Some(path) => renderer.font_file(path),
      None => Ok(renderer),
    }
  }

  pub fn font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn font_file(self, path: &Path) -> Result<Self, RenderError> {
    debug!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    Ok(self.font(FontVec::try_from_vec(data)?))
  }

  /// 没有字体时无法在框下方写出标签
  pub fn require_font(self) -> Result<Self, RenderError> {
    if self.font.is_none() {
      return Err(RenderError::MissingFont);
    }
    Ok(self)
  }

  pub fn font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  /// 固定颜色序列，相同输入得到相同图像
  pub fn seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  pub fn render(&self, image: &RgbImage, result: &DetectResult) -> Result<RgbImage, RenderError> {
    let (width, height) = image.dimensions();

    for (index, item) in result.items.iter().enumerate() {
      if item.bbox.space != CoordinateSpace::Original {
        return Err(RenderError::NotOriginal {
          index,
          space: item.bbox.space,
        });
      }
      if !item.bbox.is_within(width, height) {
        return Err(RenderError::OutOfBounds {
          index,
          bbox: item.bbox,
          width,
          height,
        });
      }
    }

    let mut rng = match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };

    if self.font.is_none() && !result.is_empty() {
      warn!("未配置字体，只绘制边框");
    }

    let mut canvas = image.clone();
    for item in result.items.iter() {
      if item.label == self.background_label {
        debug!("跳过背景检测: {:?}", item.bbox);
        continue;
      }
      let color = Rgb([
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
      ]);
      self.draw_item(&mut canvas, item, color);
    }

    Ok(canvas)
  }

  fn draw_item(&self, canvas: &mut RgbImage, item: &DetectItem, color: Rgb<u8>) {
    let bbox = &item.bbox;

    // 向内加粗
    for t in 0..self.thickness {
      if bbox.width() <= 2 * t || bbox.height() <= 2 * t {
        break;
      }
      let rect = Rect::at((bbox.left + t) as i32, (bbox.top + t) as i32)
        .of_size(bbox.width() - 2 * t, bbox.height() - 2 * t);
      draw_hollow_rect_mut(canvas, rect, color);
    }

    if let Some(font) = &self.font {
      let height = canvas.height() as i32;
      let text_height = self.font_size.ceil() as i32;
      // 框下方放不下时贴着图像底边
      let y = (bbox.bottom as i32 + LABEL_OFFSET).min(height - text_height).max(0);
      draw_text_mut(
        canvas,
        Rgb(LABEL_COLOR),
        bbox.left as i32,
        y,
        PxScale::from(self.font_size),
        font,
        &item.label,
      );
    }
  }
}
