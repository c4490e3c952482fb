// 该文件是 Quyu （区域检测） 项目的一部分。
// src/task.rs - 任务：输入 → 检测 → 输出
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

use std::time::Duration;

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  output::Render,
  pipeline::{DetectResult, Detector},
};

pub trait Task<I, D, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: D, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  D: Detector<Error = DE>,
  O: Render<RgbImage, DetectResult, Error = RE>,
> Task<I, D, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: D, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let inference = detector.detect(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    for item in inference.result.items.iter() {
      info!(
        "  - {}: {:.7} at {:?}",
        item.label,
        item.score,
        item.bbox.as_array()
      );
    }
    output.render_result(&inference.annotated, &inference.result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，报告平均耗时（跳过前两次预热）
pub struct RepeatShotTask {
  times: usize,
}

impl RepeatShotTask {
  pub fn new(times: usize) -> Self {
    Self { times }
  }
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self::new(100)
  }
}

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  D: Detector<Error = DE>,
  O: Render<RgbImage, DetectResult, Error = RE>,
> Task<I, D, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: D, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let inference = detector.detect(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&inference.annotated, &inference.result)?;
      info!("({})输出完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if times.len() > 2 {
      warn!(
        "平均推理时间: {:.2?}",
        times.iter().skip(2).sum::<Duration>() / (times.len() - 2) as u32
      );
    } else {
      warn!("重复次数不足，不计算平均推理时间");
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::{Cell, RefCell};

  use super::*;
  use crate::pipeline::Inference;

  struct Echo {
    calls: Cell<usize>,
  }

  impl Detector for Echo {
    type Error = std::io::Error;

    fn detect(&self, image: &RgbImage) -> Result<Inference, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      Ok(Inference {
        result: DetectResult::default(),
        annotated: image.clone(),
      })
    }
  }

  struct Collect {
    frames: RefCell<Vec<(u32, u32)>>,
  }

  impl Render<RgbImage, DetectResult> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, frame: &RgbImage, _result: &DetectResult) -> Result<(), Self::Error> {
      self.frames.borrow_mut().push(frame.dimensions());
      Ok(())
    }
  }

  impl Detector for &Echo {
    type Error = std::io::Error;

    fn detect(&self, image: &RgbImage) -> Result<Inference, Self::Error> {
      (**self).detect(image)
    }
  }

  #[test]
  fn one_shot_runs_once() {
    let echo = Echo {
      calls: Cell::new(0),
    };
    let collect = Collect {
      frames: RefCell::new(Vec::new()),
    };
    OneShotTask
      .run_task(std::iter::once(RgbImage::new(4, 3)), &echo, &collect)
      .unwrap();
    assert_eq!(echo.calls.get(), 1);
    assert_eq!(*collect.frames.borrow(), vec![(4, 3)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let echo = Echo {
      calls: Cell::new(0),
    };
    let collect = Collect {
      frames: RefCell::new(Vec::new()),
    };
    assert!(
      OneShotTask
        .run_task(std::iter::empty(), &echo, &collect)
        .is_err()
    );
    assert_eq!(echo.calls.get(), 0);
  }

  #[test]
  fn repeat_shot_repeats() {
    let echo = Echo {
      calls: Cell::new(0),
    };
    let collect = Collect {
      frames: RefCell::new(Vec::new()),
    };
    RepeatShotTask::new(5)
      .run_task(std::iter::once(RgbImage::new(2, 2)), &echo, &collect)
      .unwrap();
    assert_eq!(echo.calls.get(), 5);
    assert_eq!(collect.frames.borrow().len(), 5);
  }
}
