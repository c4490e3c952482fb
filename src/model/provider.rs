// 该文件是 Quyu （区域检测） 项目的一部分。
// src/model/provider.rs - 模型加载与缺失时构建
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

use std::{path::Path, process::Command};

use tracing::{error, info, warn};

use crate::model::{BuildError, ModelBuilder, ModelLoader, ModelProvider, ProviderError};

/// 不支持构建，模型缺失即报错
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBuild;

impl ModelBuilder for NoBuild {
  fn build(&self, _path: &Path) -> Result<(), BuildError> {
    Err(BuildError::NotConfigured)
  }
}

/// 运行外部命令构建模型，阻塞直到命令退出；模型路径通过环境变量 `QUYU_MODEL_PATH` 传入
#[derive(Debug, Clone)]
pub struct ExternalCommand {
  argv: Vec<String>,
}

impl ExternalCommand {
  pub fn new<S: Into<String>>(argv: impl IntoIterator<Item = S>) -> Self {
    Self {
      argv: argv.into_iter().map(Into::into).collect(),
    }
  }
}

impl ModelBuilder for ExternalCommand {
  fn build(&self, path: &Path) -> Result<(), BuildError> {
    let (program, args) = self.argv.split_first().ok_or(BuildError::EmptyCommand)?;
    warn!("模型不存在，执行构建命令: {:?}", self.argv);

    let status = Command::new(program)
      .args(args)
      .env("QUYU_MODEL_PATH", path)
      .status()
      .map_err(|source| BuildError::Spawn {
        program: program.clone(),
        source,
      })?;

    if !status.success() {
      error!("构建命令失败: {}", status);
      return Err(BuildError::Failed(status));
    }

    info!("构建命令完成: {}", status);
    Ok(())
  }
}

pub struct LoadOrBuild<L, B = NoBuild> {
  loader: L,
  builder: B,
}

impl<L: ModelLoader> LoadOrBuild<L, NoBuild> {
  pub fn new(loader: L) -> Self {
    Self {
      loader,
      builder: NoBuild,
    }
  }
}

impl<L: ModelLoader, B: ModelBuilder> LoadOrBuild<L, B> {
  pub fn with_builder<B2: ModelBuilder>(self, builder: B2) -> LoadOrBuild<L, B2> {
    LoadOrBuild {
      loader: self.loader,
      builder,
    }
  }
}

impl<L: ModelLoader, B: ModelBuilder> ModelProvider for LoadOrBuild<L, B> {
  type Model = L::Model;

  fn load_or_build(&self, path: &Path) -> Result<Self::Model, ProviderError> {
    if !path.exists() {
      match self.builder.build(path) {
        Ok(()) => {}
        Err(BuildError::NotConfigured) => {
          error!("模型不存在且未配置构建方式: {}", path.display());
          return Err(ProviderError::Unavailable(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
      }

      if !path.exists() {
        error!("构建完成但模型仍不存在: {}", path.display());
        return Err(ProviderError::Unavailable(path.to_path_buf()));
      }
    }

    info!("加载模型文件: {}", path.display());
    self
      .loader
      .load(path)
      .map_err(|e| ProviderError::Load(Box::new(e)))
  }
}
