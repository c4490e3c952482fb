// 该文件是 Quyu （区域检测） 项目的一部分。
// src/config.rs - 进程级不可变配置
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

use std::{collections::HashSet, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_BACKGROUND_LABEL: &str = "background";
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);
pub const DEFAULT_CUTOFF: f64 = 0.9999999;
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 17;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.1;
pub const DEFAULT_WORKING_WIDTH: u32 = 750;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析配置文件失败: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("标签列表为空")]
  EmptyLabels,
  #[error("标签重复: {0}")]
  DuplicateLabel(String),
  #[error("标签列表中缺少背景标签 '{0}'")]
  MissingBackground(String),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidInputSize(u32, u32),
  #[error("{name} 超出范围 [0, 1]: {value}")]
  OutOfUnitRange { name: &'static str, value: f64 },
  #[error("max_output_size 必须大于 0")]
  ZeroMaxOutput,
  #[error("工作宽度必须大于 0")]
  ZeroWorkingWidth,
}

/// 背景类别检测结果的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundPolicy {
  /// 将背景检测结果加入每一个类别的桶（保留原有的可见行为）
  #[default]
  FanOut,
  /// 直接丢弃背景检测结果
  Discard,
}

/// 进程级配置，构造一次后以引用传入各组件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// 有序标签列表，模型输出的第 i 维对应第 i 个标签
  pub labels: Vec<String>,
  pub background_label: String,
  /// 模型输入尺寸 (宽, 高)
  pub input_size: (u32, u32),
  pub model_path: PathBuf,
  pub cutoff: f64,
  pub max_output_size: usize,
  pub iou_threshold: f64,
  /// 滑动窗口前将图像缩放到的宽度
  pub working_width: u32,
  pub background_policy: BackgroundPolicy,
  /// 模型缺失时执行的构建命令 (argv)
  pub build_command: Option<Vec<String>>,
  pub font_path: Option<PathBuf>,
  pub intra_threads: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      labels: vec![DEFAULT_BACKGROUND_LABEL.to_string()],
      background_label: DEFAULT_BACKGROUND_LABEL.to_string(),
      input_size: DEFAULT_INPUT_SIZE,
      model_path: PathBuf::from("models/classifier.onnx"),
      cutoff: DEFAULT_CUTOFF,
      max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      working_width: DEFAULT_WORKING_WIDTH,
      background_policy: BackgroundPolicy::default(),
      build_command: None,
      font_path: None,
      intra_threads: 4,
    }
  }
}

impl Config {
  pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("加载配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text)
  }

  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    let config: Config = serde_json::from_str(text)?;
    config.validate()?;
    debug!("配置: {:?}", config);
    Ok(config)
  }

  pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
    self.labels = labels.into_iter().map(Into::into).collect();
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.labels.is_empty() {
      return Err(ConfigError::EmptyLabels);
    }

    let mut seen = HashSet::new();
    for label in &self.labels {
      if !seen.insert(label.as_str()) {
        return Err(ConfigError::DuplicateLabel(label.clone()));
      }
    }

    if !seen.contains(self.background_label.as_str()) {
      return Err(ConfigError::MissingBackground(
        self.background_label.clone(),
      ));
    }

    let (w, h) = self.input_size;
    if w == 0 || h == 0 {
      return Err(ConfigError::InvalidInputSize(w, h));
    }

    for (name, value) in [
      ("cutoff", self.cutoff),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfUnitRange { name, value });
      }
    }

    if self.max_output_size == 0 {
      return Err(ConfigError::ZeroMaxOutput);
    }

    if self.working_width == 0 {
      return Err(ConfigError::ZeroWorkingWidth);
    }

    Ok(())
  }

  pub fn num_classes(&self) -> usize {
    self.labels.len()
  }

  /// 背景标签在标签列表中的位置，`validate` 通过后总是存在
  pub fn background_index(&self) -> Option<usize> {
    self
      .labels
      .iter()
      .position(|label| *label == self.background_label)
  }

  pub fn label(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_follow_reference_parameters() {
    let config = Config::default();
    assert_eq!(config.input_size, (224, 224));
    assert_eq!(config.cutoff, 0.9999999);
    assert_eq!(config.max_output_size, 17);
    assert_eq!(config.iou_threshold, 0.1);
    assert_eq!(config.working_width, 750);
    assert_eq!(config.background_policy, BackgroundPolicy::FanOut);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn parses_partial_json_with_defaults() {
    let config = Config::from_json(
      r#"{
        "labels": ["background", "cat", "dog"],
        "input_size": [128, 96],
        "background_policy": "discard"
      }"#,
    )
    .unwrap();

    assert_eq!(config.num_classes(), 3);
    assert_eq!(config.input_size, (128, 96));
    assert_eq!(config.background_policy, BackgroundPolicy::Discard);
    assert_eq!(config.background_index(), Some(0));
    assert_eq!(config.label(2), Some("dog"));
    assert_eq!(config.max_output_size, DEFAULT_MAX_OUTPUT_SIZE);
  }

  #[test]
  fn rejects_inconsistent_labels() {
    let missing = Config::default().with_labels(["cat", "dog"]);
    assert!(matches!(
      missing.validate(),
      Err(ConfigError::MissingBackground(_))
    ));

    let duplicated = Config::default().with_labels(["background", "cat", "cat"]);
    assert!(matches!(
      duplicated.validate(),
      Err(ConfigError::DuplicateLabel(label)) if label == "cat"
    ));

    let empty = Config::default().with_labels(Vec::<String>::new());
    assert!(matches!(empty.validate(), Err(ConfigError::EmptyLabels)));
  }

  #[test]
  fn rejects_out_of_range_parameters() {
    let config = Config {
      cutoff: 1.5,
      ..Config::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::OutOfUnitRange { name: "cutoff", .. })
    ));

    let config = Config {
      input_size: (0, 224),
      ..Config::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::InvalidInputSize(0, 224))
    ));

    let config = Config {
      max_output_size: 0,
      ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::ZeroMaxOutput)));
  }

  #[test]
  fn reads_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
      &path,
      r#"{"labels": ["background", "cat"], "model_path": "/tmp/model.onnx"}"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.model_path, PathBuf::from("/tmp/model.onnx"));
    assert_eq!(config.labels, vec!["background", "cat"]);
  }

  #[test]
  fn invalid_json_is_a_parse_error() {
    assert!(matches!(
      Config::from_json("{ labels: "),
      Err(ConfigError::Parse(_))
    ));
  }
}
