// 该文件是 Quyu （区域检测） 项目的一部分。
// src/model.rs - 模型
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

use std::path::Path;

use thiserror::Error;

use crate::frame::NhwcBatch;

/// 分类模型：输入 `[N, H, W, 3]`，输出 `[N, C]` 未归一化的类别分数
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 模型声明的类别数，未知时返回 `None`
  fn num_classes(&self) -> Option<usize>;

  fn infer(&self, batch: &NhwcBatch) -> Result<Logits, Self::Error>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogitsError {
  #[error("输出长度 {len} 无法按 {rows} 行切分")]
  BadShape { len: usize, rows: usize },
}

/// 行优先的 `[rows, cols]` 分数矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct Logits {
  data: Box<[f32]>,
  rows: usize,
  cols: usize,
}

impl Logits {
  pub fn empty() -> Self {
    Self {
      data: Box::new([]),
      rows: 0,
      cols: 0,
    }
  }

  pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, LogitsError> {
    let count = rows.len();
    let cols = rows.first().map_or(0, Vec::len);
    let ragged = rows.iter().any(|row| row.len() != cols);
    let data: Vec<f32> = rows.into_iter().flatten().collect();
    if ragged {
      return Err(LogitsError::BadShape {
        len: data.len(),
        rows: count,
      });
    }
    Ok(Self {
      data: data.into_boxed_slice(),
      rows: count,
      cols,
    })
  }

  pub fn from_flat(data: Vec<f32>, rows: usize) -> Result<Self, LogitsError> {
    if rows == 0 {
      return if data.is_empty() {
        Ok(Self::empty())
      } else {
        Err(LogitsError::BadShape {
          len: data.len(),
          rows,
        })
      };
    }
    if data.len() % rows != 0 {
      return Err(LogitsError::BadShape {
        len: data.len(),
        rows,
      });
    }
    let cols = data.len() / rows;
    Ok(Self {
      data: data.into_boxed_slice(),
      rows,
      cols,
    })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn row(&self, index: usize) -> Option<&[f32]> {
    let start = index.checked_mul(self.cols)?;
    if index >= self.rows {
      return None;
    }
    self.data.get(start..start + self.cols)
  }

  pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
    (0..self.rows).filter_map(|i| self.row(i))
  }
}

/// 从存储中加载模型
pub trait ModelLoader {
  type Model: Classifier;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(&self, path: &Path) -> Result<Self::Model, Self::Error>;
}

/// 模型缺失时构建（训练并保存）模型，训练过程本身不在本项目范围内
pub trait ModelBuilder {
  fn build(&self, path: &Path) -> Result<(), BuildError>;
}

/// 已存在则加载，不存在则先构建再加载
pub trait ModelProvider {
  type Model: Classifier;

  fn load_or_build(&self, path: &Path) -> Result<Self::Model, ProviderError>;
}

#[derive(Error, Debug)]
pub enum BuildError {
  #[error("未配置模型构建命令")]
  NotConfigured,
  #[error("构建命令为空")]
  EmptyCommand,
  #[error("无法启动构建命令 '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error("构建命令退出异常: {0}")]
  Failed(std::process::ExitStatus),
}

#[derive(Error, Debug)]
pub enum ProviderError {
  #[error("模型不存在: {0}")]
  Unavailable(std::path::PathBuf),
  #[error("模型构建失败: {0}")]
  Build(#[from] BuildError),
  #[error("模型加载失败: {0}")]
  Load(#[source] Box<dyn std::error::Error + Send + Sync>),
}

mod provider;
pub use self::provider::{ExternalCommand, LoadOrBuild, NoBuild};

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxClassifier, OnnxClassifierError, OnnxLoader};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn logits_from_rows() {
    let logits = Logits::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    assert_eq!(logits.rows(), 2);
    assert_eq!(logits.cols(), 2);
    assert_eq!(logits.row(1), Some(&[3.0, 4.0][..]));
    assert_eq!(logits.row(2), None);
    assert_eq!(logits.iter_rows().count(), 2);
  }

  #[test]
  fn ragged_rows_are_rejected() {
    assert_eq!(
      Logits::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
      Err(LogitsError::BadShape { len: 3, rows: 2 })
    );
  }

  #[test]
  fn logits_from_flat() {
    let logits = Logits::from_flat(vec![0.0; 6], 3).unwrap();
    assert_eq!((logits.rows(), logits.cols()), (3, 2));
    assert!(Logits::from_flat(vec![0.0; 5], 3).is_err());
    assert_eq!(Logits::from_flat(vec![], 0).unwrap().rows(), 0);
  }
}
