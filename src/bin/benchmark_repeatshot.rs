// 该文件是 Quyu （区域检测） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 对同一张图像重复检测并统计耗时
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use quyu::{
  FromUrl,
  args::Args,
  input::ImageFileInput,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};

/// 重复检测基准
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct BenchArgs {
  /// 重复次数
  #[arg(long, default_value_t = 100, value_name = "COUNT")]
  repeat: usize,
  #[command(flatten)]
  args: Args,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let BenchArgs { repeat, args } = BenchArgs::parse();

  info!("配置文件: {}", args.config.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("重复次数: {}", repeat);

  let input = ImageFileInput::from_url(&args.input)?;
  let pipeline = args.build_pipeline()?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::new(repeat).run_task(input, pipeline, output)?;

  Ok(())
}
