// 该文件是 Quyu （区域检测） 项目的一部分。
// src/nms.rs - 按类别的非极大值抑制
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

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bbox::BoundingBox,
  config::Config,
  filter::{Buckets, Detection},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NmsError {
  #[error("边界框数量 {boxes} 与分数数量 {scores} 不一致")]
  LengthMismatch { boxes: usize, scores: usize },
  #[error("第 {index} 个边界框与第一个边界框的坐标空间不同")]
  MixedSpace { index: usize },
}

/// 贪心 NMS
///
/// 按分数降序（相同分数保持原顺序）依次选出剩余分数最高的框，
/// 并移除与其 IoU 严格大于 `iou_threshold` 的框，最多输出 `max_output` 个。
/// 返回输入中的下标，按选出顺序排列。
pub fn suppress(
  boxes: &[BoundingBox],
  scores: &[f64],
  max_output: usize,
  iou_threshold: f64,
) -> Result<Vec<usize>, NmsError> {
  if boxes.len() != scores.len() {
    return Err(NmsError::LengthMismatch {
      boxes: boxes.len(),
      scores: scores.len(),
    });
  }
  if let Some(first) = boxes.first()
    && let Some(index) = boxes.iter().position(|b| b.space != first.space)
  {
    return Err(NmsError::MixedSpace { index });
  }

  let mut order: Vec<usize> = (0..boxes.len()).collect();
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut suppressed = vec![false; boxes.len()];
  let mut keep = Vec::with_capacity(max_output.min(boxes.len()));

  for (pos, &i) in order.iter().enumerate() {
    if keep.len() >= max_output {
      break;
    }
    if suppressed[i] {
      continue;
    }
    keep.push(i);

    for &j in &order[pos + 1..] {
      if !suppressed[j] && boxes[i].iou(&boxes[j]) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  Ok(keep)
}

/// 通过 NMS 的检测结果，`label` 为所在桶的类别
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Survivor {
  pub label: usize,
  pub detection: Detection,
}

/// 对每个类别的桶独立执行 NMS
#[derive(Debug, Clone)]
pub struct PerClassNms {
  max_output: usize,
  iou_threshold: f64,
  labels: Vec<String>,
}

impl PerClassNms {
  pub fn from_config(config: &Config) -> Self {
    Self {
      max_output: config.max_output_size,
      iou_threshold: config.iou_threshold,
      labels: config.labels.clone(),
    }
  }

  /// 单个桶内保留的下标，按选出顺序
  pub fn select(&self, bucket: &[Detection]) -> Result<Vec<usize>, NmsError> {
    let boxes: Vec<BoundingBox> = bucket.iter().map(|d| d.bbox).collect();
    let scores: Vec<f64> = bucket.iter().map(|d| d.score).collect();
    suppress(&boxes, &scores, self.max_output, self.iou_threshold)
  }

  /// 展平所有类别的保留结果，类别按标签顺序，类别内按选出顺序
  pub fn apply(&self, buckets: &Buckets) -> Result<Vec<Survivor>, NmsError> {
    let mut survivors = Vec::new();

    for (label, bucket) in buckets.iter() {
      let name = self.labels.get(label).map_or("?", String::as_str);
      if bucket.is_empty() {
        debug!("类别 {} 没有检测结果，跳过", name);
        continue;
      }

      let keep = self.select(bucket)?;
      debug!("类别 {} 保留下标: {:?}", name, keep);
      survivors.extend(keep.into_iter().map(|i| Survivor {
        label,
        detection: bucket[i],
      }));
    }

    info!("NMS 后保留 {} 个检测结果", survivors.len());
    Ok(survivors)
  }
}
