// 该文件是 Quyu （区域检测） 项目的一部分。
// src/proposal/sliding_window.rs - 金字塔缩放 + 滑动窗口候选区域
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
use tracing::{debug, info};

use crate::{
  bbox::{BoundingBox, CoordinateSpace},
  config::DEFAULT_WORKING_WIDTH,
  proposal::{ProposalError, ProposalSource, Proposals, crop},
};

pub const DEFAULT_PYRAMID_SCALE: f32 = 1.5;

/// 固定尺寸窗口在图像金字塔上滑动
///
/// 输入图像先按比例缩放到 `working_width` 宽，返回的边界框位于该工作图像的坐标空间
/// (`CoordinateSpace::Resized`)，需要经 `BoundingBox::to_original` 换算后才能绘制到原图。
#[derive(Debug, Clone)]
pub struct SlidingWindow {
  window: (u32, u32),
  stride: u32,
  working_width: u32,
  pyramid_scale: f32,
}

impl SlidingWindow {
  pub fn new(window: (u32, u32), stride: u32) -> Self {
    Self {
      window,
      stride,
      working_width: DEFAULT_WORKING_WIDTH,
      pyramid_scale: DEFAULT_PYRAMID_SCALE,
    }
  }

  pub fn working_width(mut self, working_width: u32) -> Self {
    self.working_width = working_width;
    self
  }

  pub fn pyramid_scale(mut self, pyramid_scale: f32) -> Self {
    self.pyramid_scale = pyramid_scale;
    self
  }

  fn check(&self) -> Result<(), ProposalError> {
    let (win_w, win_h) = self.window;
    if win_w == 0 || win_h == 0 {
      return Err(ProposalError::InvalidParameter(format!(
        "窗口尺寸无效: {}x{}",
        win_w, win_h
      )));
    }
    if self.stride == 0 {
      return Err(ProposalError::InvalidParameter("步长必须大于 0".into()));
    }
    if self.working_width == 0 {
      return Err(ProposalError::InvalidParameter("工作宽度必须大于 0".into()));
    }
    // 比例不大于 1 时金字塔无法收敛
    if !(self.pyramid_scale > 1.0) {
      return Err(ProposalError::InvalidParameter(format!(
        "金字塔缩放比例必须大于 1: {}",
        self.pyramid_scale
      )));
    }
    Ok(())
  }

  /// 按比例缩放到工作宽度，高度取整截断
  fn working_image(&self, image: &RgbImage) -> RgbImage {
    let factor = self.working_width as f64 / image.width() as f64;
    let height = ((image.height() as f64 * factor) as u32).max(1);
    image::imageops::resize(image, self.working_width, height, FilterType::Triangle)
  }

  /// 从工作图像开始逐层缩小，直到小于窗口
  fn pyramid(&self, working: RgbImage) -> Vec<RgbImage> {
    let (win_w, win_h) = self.window;
    let mut layers = Vec::new();
    let mut current = working;

    while current.width() >= win_w && current.height() >= win_h {
      let next_w = (current.width() as f32 / self.pyramid_scale) as u32;
      let next_h = (current.height() as f32 / self.pyramid_scale) as u32;
      let next = if next_w >= win_w && next_h >= win_h {
        Some(image::imageops::resize(
          &current,
          next_w,
          next_h,
          FilterType::Triangle,
        ))
      } else {
        None
      };
      layers.push(current);
      match next {
        Some(next) => current = next,
        None => break,
      }
    }

    layers
  }
}

impl ProposalSource for SlidingWindow {
  fn propose(&self, image: &RgbImage) -> Result<Proposals, ProposalError> {
    self.check()?;
    if image.width() == 0 || image.height() == 0 {
      return Err(ProposalError::InvalidParameter("输入图像为空".into()));
    }

    let working = self.working_image(image);
    let (work_w, work_h) = working.dimensions();
    let space = CoordinateSpace::Resized {
      width: work_w,
      height: work_h,
    };
    debug!(
      "工作图像: {}x{} (原图 {}x{})",
      work_w,
      work_h,
      image.width(),
      image.height()
    );

    let (win_w, win_h) = self.window;
    let mut proposals = Proposals::default();

    for (level, layer) in self.pyramid(working).iter().enumerate() {
      let (layer_w, layer_h) = layer.dimensions();
      let rx = work_w as f64 / layer_w as f64;
      let ry = work_h as f64 / layer_h as f64;
      let before = proposals.len();

      for y in (0..=layer_h - win_h).step_by(self.stride as usize) {
        for x in (0..=layer_w - win_w).step_by(self.stride as usize) {
          let window = BoundingBox::new(x, y, x + win_w, y + win_h);
          let left = ((x as f64 * rx).floor() as u32).min(work_w - 1);
          let top = ((y as f64 * ry).floor() as u32).min(work_h - 1);
          let right = (((x + win_w) as f64 * rx).ceil() as u32).clamp(left + 1, work_w);
          let bottom = (((y + win_h) as f64 * ry).ceil() as u32).clamp(top + 1, work_h);

          proposals.push(
            crop(layer, &window),
            BoundingBox::new(left, top, right, bottom).in_space(space),
          );
        }
      }

      debug!(
        "金字塔第 {} 层 {}x{}: {} 个窗口",
        level,
        layer_w,
        layer_h,
        proposals.len() - before
      );
    }

    info!("滑动窗口生成 {} 个候选区域", proposals.len());
    Ok(proposals)
  }
}
