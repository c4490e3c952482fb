// 该文件是 Quyu （区域检测） 项目的一部分。
// src/filter.rs - 置信度过滤与按类别分桶
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
use tracing::{debug, error, info};

use crate::{
  bbox::BoundingBox,
  config::{BackgroundPolicy, Config, ConfigError},
  model::Logits,
};

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
  #[error("分数行数 {rows} 与边界框数量 {boxes} 不一致")]
  Misaligned { boxes: usize, rows: usize },
  #[error("第 {index} 个裁剪图的分数宽度为 {actual}, 期望 {expected}")]
  WrongWidth {
    index: usize,
    expected: usize,
    actual: usize,
  },
  #[error("第 {index} 个裁剪图的分数包含非有限值")]
  MalformedScores { index: usize },
}

/// 一个通过置信度过滤的候选区域
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  /// 在候选区域序列中的位置，同时索引裁剪图与边界框
  pub crop_index: usize,
  pub bbox: BoundingBox,
  /// 预测类别在标签列表中的位置
  pub label: usize,
  pub score: f64,
}

/// `buckets[label]` 为分到该类别的检测结果，保持候选区域顺序
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets {
  buckets: Vec<Vec<Detection>>,
  retained: usize,
}

impl Buckets {
  pub fn new(num_classes: usize) -> Self {
    Self {
      buckets: vec![Vec::new(); num_classes],
      retained: 0,
    }
  }

  pub fn get(&self, label: usize) -> &[Detection] {
    self.buckets.get(label).map_or(&[], Vec::as_slice)
  }

  pub fn iter(&self) -> impl Iterator<Item = (usize, &[Detection])> {
    self
      .buckets
      .iter()
      .enumerate()
      .map(|(label, bucket)| (label, bucket.as_slice()))
  }

  pub fn num_classes(&self) -> usize {
    self.buckets.len()
  }

  /// 置信度达到阈值的裁剪图数量（每个裁剪图只计一次）
  pub fn retained(&self) -> usize {
    self.retained
  }

  pub fn total(&self) -> usize {
    self.buckets.iter().map(Vec::len).sum()
  }
}

/// 数值稳定的 softmax，在 f64 中计算以区分接近 1 的置信度
pub fn softmax(logits: &[f32]) -> Vec<f64> {
  let max = logits
    .iter()
    .map(|&v| v as f64)
    .fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = logits.iter().map(|&v| (v as f64 - max).exp()).collect();
  let sum: f64 = exps.iter().sum();
  exps.into_iter().map(|v| v / sum).collect()
}

/// 最大值及其位置，相同取第一个
fn argmax(scores: &[f64]) -> Option<(usize, f64)> {
  scores.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
    Some((_, b)) if b >= v => best,
    _ => Some((i, v)),
  })
}

#[derive(Debug, Clone)]
pub struct ConfidenceFilter {
  cutoff: f64,
  background: usize,
  policy: BackgroundPolicy,
  num_classes: usize,
}

impl ConfidenceFilter {
  pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
    let background = config
      .background_index()
      .ok_or_else(|| ConfigError::MissingBackground(config.background_label.clone()))?;

    Ok(Self {
      cutoff: config.cutoff,
      background,
      policy: config.background_policy,
      num_classes: config.num_classes(),
    })
  }

  pub fn cutoff(mut self, cutoff: f64) -> Self {
    self.cutoff = cutoff;
    self
  }

  pub fn policy(mut self, policy: BackgroundPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// 置信度 `>= cutoff` 的裁剪图进入其预测类别的桶；背景类别按 `BackgroundPolicy` 处理
  pub fn filter(&self, boxes: &[BoundingBox], logits: &Logits) -> Result<Buckets, FilterError> {
    if boxes.len() != logits.rows() {
      return Err(FilterError::Misaligned {
        boxes: boxes.len(),
        rows: logits.rows(),
      });
    }

    let mut buckets = Buckets::new(self.num_classes);

    for (index, (bbox, row)) in boxes.iter().zip(logits.iter_rows()).enumerate() {
      if row.len() != self.num_classes {
        return Err(FilterError::WrongWidth {
          index,
          expected: self.num_classes,
          actual: row.len(),
        });
      }
      if row.iter().any(|v| !v.is_finite()) {
        error!("第 {} 个裁剪图的分数异常: {:?}", index, row);
        return Err(FilterError::MalformedScores { index });
      }

      let scores = softmax(row);
      let Some((label, confidence)) = argmax(&scores) else {
        continue;
      };

      if confidence < self.cutoff {
        continue;
      }

      buckets.retained += 1;
      let detection = Detection {
        crop_index: index,
        bbox: *bbox,
        label,
        score: confidence,
      };

      if label == self.background {
        match self.policy {
          BackgroundPolicy::FanOut => {
            for bucket in buckets.buckets.iter_mut() {
              bucket.push(detection);
            }
          }
          BackgroundPolicy::Discard => {
            debug!("丢弃背景检测: 第 {} 个裁剪图", index);
          }
        }
      } else {
        buckets.buckets[label].push(detection);
      }
    }

    info!("置信度 >= {} 的裁剪图数量: {}", self.cutoff, buckets.retained);
    Ok(buckets)
  }
}
