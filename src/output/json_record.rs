// 该文件是 Quyu （区域检测） 项目的一部分。
// src/output/json_record.rs - 以 JSON 记录检测结果
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

use std::path::{Path, PathBuf};

use chrono::Utc;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::Render, pipeline::DetectResult};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordItem {
  pub label: String,
  pub score: f64,
  /// `[left, top, right, bottom]`，原图坐标
  pub bbox: [u32; 4],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
  /// RFC 3339 时间戳
  pub timestamp: String,
  pub image_size: [u32; 2],
  pub detections: Vec<RecordItem>,
}

impl Record {
  pub fn new(frame: &RgbImage, result: &DetectResult) -> Self {
    Self {
      timestamp: Utc::now().to_rfc3339(),
      image_size: [frame.width(), frame.height()],
      detections: result
        .items
        .iter()
        .map(|item| RecordItem {
          label: item.label.clone(),
          score: item.score,
          bbox: item.bbox.as_array(),
        })
        .collect(),
    }
  }
}

/// `json:///path/to/result.json`，每次推理覆盖写入
pub struct JsonRecordOutput {
  path: PathBuf,
  pretty: bool,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch);
    }

    let pretty = uri.query_pairs().any(|(k, _)| k == "pretty");

    Ok(JsonRecordOutput {
      path: PathBuf::from(uri.path()),
      pretty,
    })
  }
}

impl JsonRecordOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<RgbImage, DetectResult> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let record = Record::new(frame, result);
    let text = if self.pretty {
      serde_json::to_string_pretty(&record)?
    } else {
      serde_json::to_string(&record)?
    };
    std::fs::write(&self.path, text)?;

    info!(
      "记录 {} 个检测结果到: {}",
      record.detections.len(),
      self.path.display()
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{bbox::BoundingBox, pipeline::DetectItem};

  #[test]
  fn writes_detections_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records").join("out.json");
    let url = Url::parse(&format!("json://{}?pretty", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), path.as_path());

    let result = DetectResult {
      items: vec![DetectItem {
        label: "cat".into(),
        score: 0.5,
        bbox: BoundingBox::new(40, 0, 105, 100),
      }]
      .into_boxed_slice(),
    };
    output.render_result(&RgbImage::new(120, 150), &result).unwrap();

    let record: Record = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(record.image_size, [120, 150]);
    assert_eq!(
      record.detections,
      vec![RecordItem {
        label: "cat".into(),
        score: 0.5,
        bbox: [40, 0, 105, 100],
      }]
    );
    assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      JsonRecordOutput::from_url(&url),
      Err(JsonRecordError::SchemeMismatch)
    ));
  }
}
