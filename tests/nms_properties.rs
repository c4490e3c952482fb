// 该文件是 Quyu （区域检测） 项目的一部分。
// tests/nms_properties.rs - NMS 性质测试
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

use proptest::prelude::*;
use quyu::{bbox::BoundingBox, nms::suppress};

fn arb_box() -> impl Strategy<Value = BoundingBox> {
  (0u32..200, 0u32..200, 1u32..80, 1u32..80)
    .prop_map(|(left, top, w, h)| BoundingBox::new(left, top, left + w, top + h))
}

fn arb_bucket() -> impl Strategy<Value = (Vec<BoundingBox>, Vec<f64>)> {
  prop::collection::vec((arb_box(), 0.0f64..=1.0), 0..60)
    .prop_map(|pairs| pairs.into_iter().unzip())
}

proptest! {
  #[test]
  fn rerun_gives_same_indices(
    (boxes, scores) in arb_bucket(),
    max_output in 0usize..30,
    threshold in 0.0f64..=1.0,
  ) {
    let first = suppress(&boxes, &scores, max_output, threshold).unwrap();
    let second = suppress(&boxes, &scores, max_output, threshold).unwrap();
    prop_assert_eq!(first, second);
  }

  #[test]
  fn output_never_exceeds_cap(
    (boxes, scores) in arb_bucket(),
    max_output in 0usize..30,
    threshold in 0.0f64..=1.0,
  ) {
    let keep = suppress(&boxes, &scores, max_output, threshold).unwrap();
    prop_assert!(keep.len() <= max_output);
    prop_assert!(keep.len() <= boxes.len());
  }

  #[test]
  fn indices_are_valid_and_unique(
    (boxes, scores) in arb_bucket(),
    threshold in 0.0f64..=1.0,
  ) {
    let keep = suppress(&boxes, &scores, 17, threshold).unwrap();
    let mut seen = vec![false; boxes.len()];
    for &i in &keep {
      prop_assert!(i < boxes.len());
      prop_assert!(!seen[i]);
      seen[i] = true;
    }
  }

  #[test]
  fn survivors_do_not_overlap_beyond_threshold(
    (boxes, scores) in arb_bucket(),
    threshold in 0.0f64..=1.0,
  ) {
    let keep = suppress(&boxes, &scores, 100, threshold).unwrap();
    for (n, &i) in keep.iter().enumerate() {
      for &j in &keep[n + 1..] {
        prop_assert!(boxes[i].iou(&boxes[j]) <= threshold);
      }
    }
  }

  #[test]
  fn selection_order_follows_scores(
    (boxes, scores) in arb_bucket(),
    threshold in 0.0f64..=1.0,
  ) {
    let keep = suppress(&boxes, &scores, 100, threshold).unwrap();
    if let Some(&first) = keep.first() {
      let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
      prop_assert_eq!(scores[first], best);
    }
    for pair in keep.windows(2) {
      prop_assert!(scores[pair[0]] >= scores[pair[1]]);
    }
  }

  #[test]
  fn dropped_boxes_overlap_a_survivor(
    (boxes, scores) in arb_bucket(),
    threshold in 0.0f64..=1.0,
  ) {
    // 上限足够大时，每个被移除的框都与某个保留且分数不低于它的框重叠
    let keep = suppress(&boxes, &scores, boxes.len(), threshold).unwrap();
    for i in (0..boxes.len()).filter(|i| !keep.contains(i)) {
      let covered = keep
        .iter()
        .any(|&k| scores[k] >= scores[i] && boxes[k].iou(&boxes[i]) > threshold);
      prop_assert!(covered, "第 {} 个框被移除但没有覆盖它的保留框", i);
    }
  }

  #[test]
  fn coincident_clusters_keep_one_box_each(
    sizes in prop::collection::vec(1usize..6, 1..8),
    threshold in 0.0f64..1.0,
  ) {
    // 各组内的框完全重合，组之间互不相交
    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    for (group, &size) in sizes.iter().enumerate() {
      let x = group as u32 * 100;
      for k in 0..size {
        boxes.push(BoundingBox::new(x, 0, x + 50, 50));
        scores.push(1.0 / (1 + k + group) as f64);
      }
    }

    let keep = suppress(&boxes, &scores, boxes.len(), threshold).unwrap();
    prop_assert_eq!(keep.len(), sizes.len());
  }
}
