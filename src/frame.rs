// 该文件是 Quyu （区域检测） 项目的一部分。
// src/frame.rs - NHWC 批量帧定义
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

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// `[N, H, W, 3]` 的浮点批量张量，像素值保持 0-255 原始范围
#[derive(Debug, Clone)]
pub struct NhwcBatch {
  data: Box<[f32]>,
  batch: usize,
  height: usize,
  width: usize,
}

impl NhwcBatch {
  /// 将尺寸一致的 RGB 图像堆叠为一个批次
  pub fn stack(images: &[RgbImage], width: u32, height: u32) -> Result<Self, FrameError> {
    let frame_len = RGB_CHANNELS * width as usize * height as usize;
    let mut data = Vec::with_capacity(images.len() * frame_len);

    for image in images {
      if image.dimensions() != (width, height) {
        return Err(FrameError::ShapeMismatch {
          expected: (width, height),
          actual: image.dimensions(),
        });
      }
      data.extend(image.as_raw().iter().map(|&v| v as f32));
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      batch: images.len(),
      height: height as usize,
      width: width as usize,
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    [self.batch, self.height, self.width, RGB_CHANNELS]
  }

  pub fn len(&self) -> usize {
    self.batch
  }

  pub fn is_empty(&self) -> bool {
    self.batch == 0
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  /// 第 `index` 帧的像素数据
  pub fn frame(&self, index: usize) -> Option<&[f32]> {
    let frame_len = RGB_CHANNELS * self.height * self.width;
    let start = index.checked_mul(frame_len)?;
    self.data.get(start..start + frame_len)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn stacks_frames_in_order() {
    let a = RgbImage::from_pixel(2, 3, Rgb([1, 2, 3]));
    let b = RgbImage::from_pixel(2, 3, Rgb([200, 100, 50]));
    let batch = NhwcBatch::stack(&[a, b], 2, 3).unwrap();

    assert_eq!(batch.shape(), [2, 3, 2, 3]);
    assert_eq!(batch.as_nhwc().len(), 2 * 3 * 2 * 3);
    assert_eq!(&batch.frame(0).unwrap()[..3], &[1.0, 2.0, 3.0]);
    assert_eq!(&batch.frame(1).unwrap()[..3], &[200.0, 100.0, 50.0]);
    assert!(batch.frame(2).is_none());
  }

  #[test]
  fn rejects_mismatched_frames() {
    let a = RgbImage::new(4, 4);
    let err = NhwcBatch::stack(&[a], 2, 2).unwrap_err();
    assert_eq!(
      err,
      FrameError::ShapeMismatch {
        expected: (2, 2),
        actual: (4, 4)
      }
    );
  }

  #[test]
  fn empty_batch() {
    let batch = NhwcBatch::stack(&[], 8, 8).unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.shape(), [0, 8, 8, 3]);
  }
}
