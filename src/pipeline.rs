// 该文件是 Quyu （区域检测） 项目的一部分。
// src/pipeline.rs - 检测流水线
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

use std::cell::Cell;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bbox::BoundingBox,
  classifier::{BatchClassifier, ClassifyError},
  config::{Config, ConfigError},
  filter::{ConfidenceFilter, FilterError},
  model::{Classifier, ModelProvider, ProviderError},
  nms::{NmsError, PerClassNms},
  output::draw::{RenderError, Renderer},
  proposal::{ProposalError, ProposalSource},
};

/// 流水线阶段，单次调用内只会向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
  NoModel,
  ModelLoaded,
  ProposalsGenerated,
  Classified,
  Filtered,
  Suppressed,
  Rendered,
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("模型不可用: {0}")]
  Provider(#[from] ProviderError),
  #[error("候选区域错误: {0}")]
  Proposal(#[from] ProposalError),
  #[error("分类错误: {0}")]
  Classify(#[from] ClassifyError),
  #[error("过滤错误: {0}")]
  Filter(#[from] FilterError),
  #[error("NMS 错误: {0}")]
  Nms(#[from] NmsError),
  #[error("渲染错误: {0}")]
  Render(#[from] RenderError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  /// 预测类别名称
  pub label: String,
  pub score: f64,
  /// 原图坐标
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a DetectItem> + 'a {
    self.items.iter().filter(move |item| item.label == label)
  }
}

/// 一次推理的产物：检测结果与标注后的原图副本
#[derive(Debug, Clone)]
pub struct Inference {
  pub result: DetectResult,
  pub annotated: RgbImage,
}

pub trait Detector {
  type Error;
  fn detect(&self, image: &RgbImage) -> Result<Inference, Self::Error>;
}

/// 候选区域 → 批量分类 → 置信度过滤 → 按类别 NMS → 渲染
///
/// 任一阶段失败即整个调用失败，没有部分结果。
pub struct Pipeline<M> {
  config: Config,
  source: Box<dyn ProposalSource>,
  classifier: BatchClassifier<M>,
  filter: ConfidenceFilter,
  nms: PerClassNms,
  renderer: Renderer,
  stage: Cell<Stage>,
}

impl<M: Classifier> Pipeline<M> {
  /// 校验配置并加载模型，模型缺失时由 `provider` 负责构建
  pub fn new<P>(
    config: Config,
    provider: &P,
    source: Box<dyn ProposalSource>,
  ) -> Result<Self, PipelineError>
  where
    P: ModelProvider<Model = M>,
  {
    config.validate()?;
    debug!("阶段: {:?}", Stage::NoModel);

    let now = std::time::Instant::now();
    let model = provider.load_or_build(&config.model_path)?;
    info!("模型就绪，耗时: {:.2?}", now.elapsed());

    let classifier = BatchClassifier::new(model, &config)?;
    let filter = ConfidenceFilter::from_config(&config)?;
    let nms = PerClassNms::from_config(&config);
    let renderer = Renderer::from_config(&config)?;

    let pipeline = Self {
      config,
      source,
      classifier,
      filter,
      nms,
      renderer,
      stage: Cell::new(Stage::NoModel),
    };
    pipeline.advance(Stage::ModelLoaded);
    Ok(pipeline)
  }

  pub fn with_renderer(mut self, renderer: Renderer) -> Self {
    self.renderer = renderer;
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn classifier(&self) -> &BatchClassifier<M> {
    &self.classifier
  }

  /// 最近一次调用完成到的阶段
  pub fn stage(&self) -> Stage {
    self.stage.get()
  }

  fn advance(&self, stage: Stage) {
    debug!("阶段: {:?}", stage);
    self.stage.set(stage);
  }

  pub fn infer(&self, image: &RgbImage) -> Result<Inference, PipelineError> {
    let (width, height) = image.dimensions();
    self.advance(Stage::ModelLoaded);

    let proposals = self.source.propose(image)?;
    proposals.validate(width, height)?;
    info!("候选区域数量: {}", proposals.len());
    self.advance(Stage::ProposalsGenerated);

    let logits = self.classifier.classify(&proposals.crops)?;
    self.advance(Stage::Classified);

    let buckets = self.filter.filter(&proposals.boxes, &logits)?;
    self.advance(Stage::Filtered);

    let survivors = self.nms.apply(&buckets)?;
    self.advance(Stage::Suppressed);

    // NMS 在候选区域自身的坐标空间内进行，之后统一换算回原图
    let items: Box<[DetectItem]> = survivors
      .iter()
      .map(|survivor| {
        let detection = &survivor.detection;
        DetectItem {
          label: self
            .config
            .label(detection.label)
            .unwrap_or_default()
            .to_string(),
          score: detection.score,
          bbox: detection.bbox.to_original(width, height),
        }
      })
      .collect();
    let result = DetectResult { items };

    let annotated = self.renderer.render(image, &result)?;
    self.advance(Stage::Rendered);

    Ok(Inference { result, annotated })
  }
}

impl<M: Classifier> Detector for Pipeline<M> {
  type Error = PipelineError;

  fn detect(&self, image: &RgbImage) -> Result<Inference, Self::Error> {
    self.infer(image)
  }
}
