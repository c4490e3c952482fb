// 该文件是 Quyu （区域检测） 项目的一部分。
// src/bbox.rs - 边界框与坐标空间
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

/// 边界框所处的坐标空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
  /// 原始输入图像
  Original,
  /// 缩放后的工作图像，记录其尺寸以便换算回原图
  Resized { width: u32, height: u32 },
}

/// `[left, right) x [top, bottom)`，整数像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
  pub left: u32,
  pub top: u32,
  pub right: u32,
  pub bottom: u32,
  pub space: CoordinateSpace,
}

impl BoundingBox {
  pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
      space: CoordinateSpace::Original,
    }
  }

  pub fn in_space(mut self, space: CoordinateSpace) -> Self {
    self.space = space;
    self
  }

  pub fn width(&self) -> u32 {
    self.right.saturating_sub(self.left)
  }

  pub fn height(&self) -> u32 {
    self.bottom.saturating_sub(self.top)
  }

  pub fn area(&self) -> f64 {
    self.width() as f64 * self.height() as f64
  }

  /// `0 <= left < right <= width` 且 `0 <= top < bottom <= height`
  pub fn is_within(&self, width: u32, height: u32) -> bool {
    self.left < self.right && self.top < self.bottom && self.right <= width && self.bottom <= height
  }

  /// 交并比，并集面积为零时返回 0
  pub fn iou(&self, other: &BoundingBox) -> f64 {
    debug_assert_eq!(self.space, other.space, "跨坐标空间比较边界框");

    let left = self.left.max(other.left);
    let top = self.top.max(other.top);
    let right = self.right.min(other.right);
    let bottom = self.bottom.min(other.bottom);

    let intersection = right.saturating_sub(left) as f64 * bottom.saturating_sub(top) as f64;
    let union = self.area() + other.area() - intersection;
    if union <= 0.0 {
      return 0.0;
    }
    intersection / union
  }

  /// 换算到尺寸为 `width x height` 的原始图像坐标
  pub fn to_original(&self, width: u32, height: u32) -> BoundingBox {
    let (from_w, from_h) = match self.space {
      CoordinateSpace::Original => return *self,
      CoordinateSpace::Resized { width, height } => (width, height),
    };

    let sx = width as f64 / from_w as f64;
    let sy = height as f64 / from_h as f64;

    let left = ((self.left as f64 * sx).floor() as u32).min(width.saturating_sub(1));
    let top = ((self.top as f64 * sy).floor() as u32).min(height.saturating_sub(1));
    let right = ((self.right as f64 * sx).ceil() as u32).clamp(left + 1, width.max(left + 1));
    let bottom = ((self.bottom as f64 * sy).ceil() as u32).clamp(top + 1, height.max(top + 1));

    BoundingBox::new(left, top, right, bottom)
  }

  pub fn as_array(&self) -> [u32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_boxes_have_unit_iou() {
    let a = BoundingBox::new(10, 20, 60, 90);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn disjoint_boxes_have_zero_iou() {
    let a = BoundingBox::new(0, 0, 10, 10);
    let b = BoundingBox::new(20, 20, 30, 30);
    assert_eq!(a.iou(&b), 0.0);

    // 仅共享一条边
    let c = BoundingBox::new(10, 0, 20, 10);
    assert_eq!(a.iou(&c), 0.0);
  }

  #[test]
  fn nested_box_iou_is_area_ratio() {
    let outer = BoundingBox::new(0, 0, 100, 100);
    let inner = BoundingBox::new(25, 25, 75, 75);
    let expected = inner.area() / outer.area();
    assert!((outer.iou(&inner) - expected).abs() < 1e-12);
    assert!((inner.iou(&outer) - expected).abs() < 1e-12);
  }

  #[test]
  fn degenerate_boxes_do_not_divide_by_zero() {
    let a = BoundingBox::new(5, 5, 5, 5);
    let b = BoundingBox::new(5, 5, 5, 5);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn partial_overlap_iou() {
    let a = BoundingBox::new(0, 0, 65, 100);
    let b = BoundingBox::new(40, 0, 105, 100);
    // 交集 25x100，并集 6500 + 6500 - 2500
    assert!((a.iou(&b) - 2500.0 / 10500.0).abs() < 1e-12);
  }

  #[test]
  fn bounds_check() {
    let b = BoundingBox::new(0, 0, 10, 10);
    assert!(b.is_within(10, 10));
    assert!(!b.is_within(9, 10));
    assert!(!BoundingBox::new(3, 0, 3, 10).is_within(10, 10));
  }

  #[test]
  fn resized_boxes_scale_back_to_original() {
    let space = CoordinateSpace::Resized {
      width: 750,
      height: 500,
    };
    let b = BoundingBox::new(75, 50, 150, 100).in_space(space);
    let original = b.to_original(1500, 1000);
    assert_eq!(original.space, CoordinateSpace::Original);
    assert_eq!(original.as_array(), [150, 100, 300, 200]);
    assert!(original.is_within(1500, 1000));
  }

  #[test]
  fn scaled_boxes_stay_in_bounds_and_non_empty() {
    let space = CoordinateSpace::Resized {
      width: 750,
      height: 750,
    };
    let b = BoundingBox::new(749, 749, 750, 750).in_space(space);
    let original = b.to_original(100, 100);
    assert!(original.is_within(100, 100));
    assert!(original.width() >= 1 && original.height() >= 1);
  }

  #[test]
  fn original_boxes_are_unchanged_by_conversion() {
    let b = BoundingBox::new(1, 2, 3, 4);
    assert_eq!(b.to_original(10, 10), b);
  }
}
