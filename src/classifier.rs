// 该文件是 Quyu （区域检测） 项目的一部分。
// src/classifier.rs - 批量分类
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
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::Config,
  frame::{FrameError, NhwcBatch},
  model::{Classifier, Logits},
};

#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("标签数量 {labels} 与模型输出维度 {model} 不一致")]
  LabelCountMismatch { labels: usize, model: usize },
  #[error("模型输出行数 {actual} 与裁剪图数量 {expected} 不一致")]
  RowCountMismatch { expected: usize, actual: usize },
  #[error("组批失败: {0}")]
  Frame(#[from] FrameError),
  #[error("模型推理失败: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 将裁剪图统一缩放后组成一个批次，一次前向推理得到全部分数
pub struct BatchClassifier<M> {
  model: M,
  input_size: (u32, u32),
  num_classes: usize,
}

impl<M: Classifier> BatchClassifier<M> {
  /// 模型声明的类别数与标签数量不一致时立即失败
  pub fn new(model: M, config: &Config) -> Result<Self, ClassifyError> {
    let num_classes = config.num_classes();
    if let Some(model_classes) = model.num_classes()
      && model_classes != num_classes
    {
      error!(
        "标签数量 {} 与模型输出维度 {} 不一致",
        num_classes, model_classes
      );
      return Err(ClassifyError::LabelCountMismatch {
        labels: num_classes,
        model: model_classes,
      });
    }

    Ok(Self {
      model,
      input_size: config.input_size,
      num_classes,
    })
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  /// 缩放到模型输入尺寸，返回新的序列，不修改输入
  pub fn prepare(&self, crops: &[RgbImage]) -> Vec<RgbImage> {
    let (width, height) = self.input_size;
    crops
      .iter()
      .map(|crop| image::imageops::resize(crop, width, height, FilterType::Triangle))
      .collect()
  }

  /// 每个裁剪图对应一行未归一化的分数，顺序与输入一致
  pub fn classify(&self, crops: &[RgbImage]) -> Result<Logits, ClassifyError> {
    if crops.is_empty() {
      debug!("没有候选区域，跳过推理");
      return Ok(Logits::empty());
    }

    let (width, height) = self.input_size;
    let batch = NhwcBatch::stack(&self.prepare(crops), width, height)?;

    let now = std::time::Instant::now();
    let logits = self
      .model
      .infer(&batch)
      .map_err(|e| ClassifyError::Model(Box::new(e)))?;
    let elapsed = now.elapsed();
    info!("批量推理完成 ({} 张)，耗时: {:.2?}", batch.len(), elapsed);

    if logits.rows() != crops.len() {
      return Err(ClassifyError::RowCountMismatch {
        expected: crops.len(),
        actual: logits.rows(),
      });
    }
    if logits.cols() != self.num_classes {
      error!(
        "标签数量 {} 与模型输出维度 {} 不一致",
        self.num_classes,
        logits.cols()
      );
      return Err(ClassifyError::LabelCountMismatch {
        labels: self.num_classes,
        model: logits.cols(),
      });
    }

    Ok(logits)
  }
}
