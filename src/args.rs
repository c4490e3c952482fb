// 该文件是 Quyu （区域检测） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use url::Url;

use crate::{
  config::{Config, ConfigError},
  output::draw::{RenderError, Renderer},
  proposal::{ProposalSource, SelectiveSearch, SlidingWindow},
};

/// 候选区域生成方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// 图像金字塔上的滑动窗口
  SlidingWindow,
  /// 基于图分割的选择性搜索
  SelectiveSearch,
}

/// Quyu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件路径（标签、模型输入尺寸、模型路径等）
  #[arg(long, value_name = "FILE")]
  pub config: PathBuf,
  /// 输入来源，例如 image:///path/to/input.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///path/to/out.png 或 json:///path/to/out.json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 候选区域生成方式
  #[arg(long, value_enum, default_value_t = Strategy::SlidingWindow)]
  pub strategy: Strategy,
  /// 滑动窗口宽度
  #[arg(long, default_value_t = 65, value_name = "PIXELS")]
  pub crop_width: u32,
  /// 滑动窗口高度
  #[arg(long, default_value_t = 100, value_name = "PIXELS")]
  pub crop_height: u32,
  /// 滑动窗口步长
  #[arg(long, default_value_t = 40, value_name = "PIXELS")]
  pub stride: u32,
  /// 覆盖配置中的模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Option<PathBuf>,
  /// 标签字体 (TrueType)
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 边框颜色的随机种子
  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,
}

impl Args {
  /// 读取配置文件并应用命令行覆盖项
  pub fn load_config(&self) -> Result<Config, ConfigError> {
    let mut config = Config::from_file(&self.config)?;
    if let Some(model) = &self.model {
      config.model_path = model.clone();
    }
    if let Some(font) = &self.font {
      config.font_path = Some(font.clone());
    }
    config.validate()?;
    Ok(config)
  }

  pub fn proposal_source(&self, config: &Config) -> Box<dyn ProposalSource> {
    info!("候选区域生成方式: {:?}", self.strategy);
    match self.strategy {
      Strategy::SlidingWindow => Box::new(
        SlidingWindow::new((self.crop_width, self.crop_height), self.stride)
          .working_width(config.working_width),
      ),
      Strategy::SelectiveSearch => Box::new(SelectiveSearch::new()),
    }
  }

  /// 命令行输出需要写出标签，必须通过 `--font` 或配置文件提供字体
  pub fn renderer(&self, config: &Config) -> Result<Renderer, RenderError> {
    let renderer = Renderer::from_config(config)?.require_font()?;
    Ok(match self.seed {
      Some(seed) => renderer.seed(seed),
      None => renderer,
    })
  }
}

#[cfg(feature = "model_onnx")]
mod onnx {
  use tracing::info;

  use super::Args;
  use crate::{
    model::{ExternalCommand, LoadOrBuild, OnnxClassifier, OnnxLoader},
    pipeline::Pipeline,
  };

  impl Args {
    /// 按参数组装使用 ONNX 模型的检测流水线
    pub fn build_pipeline(&self) -> anyhow::Result<Pipeline<OnnxClassifier>> {
      let config = self.load_config()?;
      let source = self.proposal_source(&config);
      let renderer = self.renderer(&config)?;
      let loader = OnnxLoader::new(config.intra_threads);

      info!("模型文件路径: {}", config.model_path.display());
      let pipeline = match config.build_command.clone() {
        Some(argv) => {
          let provider = LoadOrBuild::new(loader).with_builder(ExternalCommand::new(argv));
          Pipeline::new(config, &provider, source)?
        }
        None => Pipeline::new(config, &LoadOrBuild::new(loader), source)?,
      };

      Ok(pipeline.with_renderer(renderer))
    }
  }
}
