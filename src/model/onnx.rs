// 该文件是 Quyu （区域检测） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 分类模型
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

use std::{path::Path, sync::Mutex};

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::NhwcBatch,
  model::{Classifier, Logits, LogitsError, ModelLoader},
};

#[derive(Error, Debug)]
pub enum OnnxClassifierError {
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型输出形状错误: {0}")]
  Shape(#[from] LogitsError),
  #[error("推理会话锁已损坏")]
  Poisoned,
  #[error("模型没有输出")]
  NoOutput,
}

/// 输入 `[N, H, W, 3]` f32，输出 `[N, C]` 的 ONNX 分类模型
pub struct OnnxClassifier {
  session: Mutex<Session>,
  num_classes: Option<usize>,
}

impl OnnxClassifier {
  pub fn from_file(path: &Path, intra_threads: usize) -> Result<Self, OnnxClassifierError> {
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(intra_threads)?
      .commit_from_file(path)?;

    if session.outputs.is_empty() {
      return Err(OnnxClassifierError::NoOutput);
    }

    // 动态维度记为 -1
    let num_classes = session.outputs[0]
      .output_type
      .tensor_shape()
      .and_then(|shape| shape.last().copied())
      .filter(|&dim| dim > 0)
      .map(|dim| dim as usize);

    debug!("模型输入数量: {}", session.inputs.len());
    debug!("模型输出数量: {}", session.outputs.len());
    info!("模型加载完成, 类别数: {:?}", num_classes);

    Ok(Self {
      session: Mutex::new(session),
      num_classes,
    })
  }
}

impl Classifier for OnnxClassifier {
  type Error = OnnxClassifierError;

  fn num_classes(&self) -> Option<usize> {
    self.num_classes
  }

  fn infer(&self, batch: &NhwcBatch) -> Result<Logits, Self::Error> {
    let tensor = Tensor::from_array((batch.shape(), batch.as_nhwc().to_vec().into_boxed_slice()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxClassifierError::Poisoned)?;

    debug!("执行模型推理, 输入形状: {:?}", batch.shape());
    let outputs = session.run(ort::inputs![tensor])?;
    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    debug!("模型输出形状: {:?}", shape);

    Ok(Logits::from_flat(data.to_vec(), batch.len())?)
  }
}

#[derive(Debug, Clone)]
pub struct OnnxLoader {
  intra_threads: usize,
}

impl OnnxLoader {
  pub fn new(intra_threads: usize) -> Self {
    Self { intra_threads }
  }
}

impl Default for OnnxLoader {
  fn default() -> Self {
    Self::new(4)
  }
}

impl ModelLoader for OnnxLoader {
  type Model = OnnxClassifier;
  type Error = OnnxClassifierError;

  fn load(&self, path: &Path) -> Result<Self::Model, Self::Error> {
    OnnxClassifier::from_file(path, self.intra_threads)
  }
}
