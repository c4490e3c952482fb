// 该文件是 Quyu （区域检测） 项目的一部分。
// src/proposal.rs - 候选区域生成
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

use image::RgbImage;
use thiserror::Error;
use tracing::error;

use crate::bbox::{BoundingBox, CoordinateSpace};

mod selective_search;
mod sliding_window;
mod union_find;

pub use self::selective_search::SelectiveSearch;
pub use self::sliding_window::SlidingWindow;

#[derive(Error, Debug)]
pub enum ProposalError {
  #[error("裁剪图与边界框数量不一致: {crops} 个裁剪图, {boxes} 个边界框")]
  Misaligned { crops: usize, boxes: usize },
  #[error("第 {index} 个边界框越界: {bbox:?}, 图像尺寸 {width}x{height}")]
  OutOfBounds {
    index: usize,
    bbox: BoundingBox,
    width: u32,
    height: u32,
  },
  #[error("参数无效: {0}")]
  InvalidParameter(String),
}

/// 一一对应的裁剪图与边界框
#[derive(Debug, Clone, Default)]
pub struct Proposals {
  pub crops: Vec<RgbImage>,
  pub boxes: Vec<BoundingBox>,
}

impl Proposals {
  pub fn new(crops: Vec<RgbImage>, boxes: Vec<BoundingBox>) -> Self {
    Self { crops, boxes }
  }

  pub fn push(&mut self, crop: RgbImage, bbox: BoundingBox) {
    self.crops.push(crop);
    self.boxes.push(bbox);
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  /// 校验数量一致，且每个边界框都位于其坐标空间的图像范围内
  pub fn validate(&self, image_width: u32, image_height: u32) -> Result<(), ProposalError> {
    if self.crops.len() != self.boxes.len() {
      error!(
        "候选区域未对齐: {} 个裁剪图, {} 个边界框",
        self.crops.len(),
        self.boxes.len()
      );
      return Err(ProposalError::Misaligned {
        crops: self.crops.len(),
        boxes: self.boxes.len(),
      });
    }

    for (index, bbox) in self.boxes.iter().enumerate() {
      let (width, height) = match bbox.space {
        CoordinateSpace::Original => (image_width, image_height),
        CoordinateSpace::Resized { width, height } => (width, height),
      };
      if !bbox.is_within(width, height) {
        error!("第 {} 个边界框越界: {:?}", index, bbox);
        return Err(ProposalError::OutOfBounds {
          index,
          bbox: *bbox,
          width,
          height,
        });
      }
    }

    Ok(())
  }
}

pub trait ProposalSource {
  fn propose(&self, image: &RgbImage) -> Result<Proposals, ProposalError>;
}

impl<P: ProposalSource + ?Sized> ProposalSource for Box<P> {
  fn propose(&self, image: &RgbImage) -> Result<Proposals, ProposalError> {
    (**self).propose(image)
  }
}

/// 从图像中裁剪出边界框对应的区域，边界框须已在 `image` 的坐标空间内
pub(crate) fn crop(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
  image::imageops::crop_imm(image, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_accepts_aligned_in_bounds() {
    let mut proposals = Proposals::default();
    proposals.push(RgbImage::new(5, 5), BoundingBox::new(0, 0, 5, 5));
    proposals.push(RgbImage::new(5, 5), BoundingBox::new(5, 5, 10, 10));
    assert!(proposals.validate(10, 10).is_ok());
  }

  #[test]
  fn validate_rejects_misaligned() {
    let proposals = Proposals::new(vec![RgbImage::new(1, 1)], vec![]);
    assert!(matches!(
      proposals.validate(10, 10),
      Err(ProposalError::Misaligned { crops: 1, boxes: 0 })
    ));
  }

  #[test]
  fn validate_rejects_out_of_bounds() {
    let proposals = Proposals::new(
      vec![RgbImage::new(1, 1), RgbImage::new(1, 1)],
      vec![BoundingBox::new(0, 0, 5, 5), BoundingBox::new(8, 8, 11, 10)],
    );
    assert!(matches!(
      proposals.validate(10, 10),
      Err(ProposalError::OutOfBounds { index: 1, .. })
    ));
  }

  #[test]
  fn resized_boxes_are_checked_against_their_own_frame() {
    let space = CoordinateSpace::Resized {
      width: 750,
      height: 500,
    };
    let proposals = Proposals::new(
      vec![RgbImage::new(1, 1)],
      vec![BoundingBox::new(700, 400, 750, 500).in_space(space)],
    );
    // 原图更小，但框属于缩放空间
    assert!(proposals.validate(100, 100).is_ok());
  }

  #[test]
  fn crop_copies_region() {
    let mut image = RgbImage::new(4, 4);
    image.put_pixel(2, 1, image::Rgb([9, 9, 9]));
    let part = crop(&image, &BoundingBox::new(2, 1, 4, 3));
    assert_eq!(part.dimensions(), (2, 2));
    assert_eq!(part.get_pixel(0, 0), &image::Rgb([9, 9, 9]));
  }
}
