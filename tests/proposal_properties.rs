// 该文件是 Quyu （区域检测） 项目的一部分。
// tests/proposal_properties.rs - 候选区域生成的性质测试
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

use image::{Rgb, RgbImage};
use proptest::prelude::*;
use quyu::proposal::{ProposalSource, SelectiveSearch, SlidingWindow};

fn arb_image(max: u32) -> impl Strategy<Value = RgbImage> {
  (8u32..max, 8u32..max, any::<u64>()).prop_map(|(width, height, seed)| {
    RgbImage::from_fn(width, height, |x, y| {
      let v = (x as u64 * 31 + y as u64 * 17 + seed) % 251;
      Rgb([v as u8, (v / 2) as u8, (255 - v) as u8])
    })
  })
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(32))]

  #[test]
  fn sliding_window_output_is_aligned_and_in_bounds(
    image in arb_image(160),
    window in (4u32..40, 4u32..40),
    stride in 4u32..30,
    working_width in 16u32..160,
  ) {
    let source = SlidingWindow::new(window, stride).working_width(working_width);
    let proposals = source.propose(&image).unwrap();

    prop_assert_eq!(proposals.crops.len(), proposals.boxes.len());
    prop_assert!(proposals.validate(image.width(), image.height()).is_ok());
    for crop in &proposals.crops {
      prop_assert_eq!(crop.dimensions(), window);
    }
    for bbox in &proposals.boxes {
      let original = bbox.to_original(image.width(), image.height());
      prop_assert!(original.is_within(image.width(), image.height()));
    }
  }

  #[test]
  fn selective_search_output_is_aligned_and_in_bounds(image in arb_image(64)) {
    let source = SelectiveSearch::new().min_size(10).min_box_side(1);
    let proposals = source.propose(&image).unwrap();

    prop_assert_eq!(proposals.crops.len(), proposals.boxes.len());
    prop_assert!(proposals.validate(image.width(), image.height()).is_ok());
    for (crop, bbox) in proposals.crops.iter().zip(&proposals.boxes) {
      prop_assert_eq!(crop.dimensions(), (bbox.width(), bbox.height()));
    }
  }
}
