// 该文件是 Quyu （区域检测） 项目的一部分。
// src/proposal/selective_search.rs - 基于分割的候选区域（选择性搜索）
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

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use image::{RgbImage, imageops::FilterType};
use tracing::{debug, info};

use crate::{
  bbox::{BoundingBox, CoordinateSpace},
  proposal::{ProposalError, ProposalSource, Proposals, crop, union_find::UnionFind},
};

const HISTOGRAM_BINS: usize = 25;

/// 图分割 (Felzenszwalb-Huttenlocher) 后按颜色、大小、填充度逐级合并区域，
/// 每一级出现的区域都作为候选框。边界框位于原图坐标空间。
#[derive(Debug, Clone)]
pub struct SelectiveSearch {
  scale: f32,
  sigma: f32,
  min_size: usize,
  min_box_side: u32,
  max_side: u32,
  max_proposals: usize,
}

impl Default for SelectiveSearch {
  fn default() -> Self {
    Self {
      scale: 200.0,
      sigma: 0.8,
      min_size: 50,
      min_box_side: 8,
      max_side: 500,
      max_proposals: 2000,
    }
  }
}

struct Region {
  bbox: [u32; 4],
  size: usize,
  histogram: Vec<f64>,
}

impl SelectiveSearch {
  pub fn new() -> Self {
    Self::default()
  }

  /// 分割阈值系数，越大区域越大
  pub fn scale(mut self, scale: f32) -> Self {
    self.scale = scale;
    self
  }

  /// 分割前高斯平滑的 sigma，0 表示不平滑
  pub fn sigma(mut self, sigma: f32) -> Self {
    self.sigma = sigma;
    self
  }

  pub fn min_size(mut self, min_size: usize) -> Self {
    self.min_size = min_size;
    self
  }

  pub fn min_box_side(mut self, min_box_side: u32) -> Self {
    self.min_box_side = min_box_side;
    self
  }

  /// 长边超过该值时在缩小的副本上分割
  pub fn max_side(mut self, max_side: u32) -> Self {
    self.max_side = max_side;
    self
  }

  pub fn max_proposals(mut self, max_proposals: usize) -> Self {
    self.max_proposals = max_proposals;
    self
  }

  fn check(&self) -> Result<(), ProposalError> {
    if !(self.scale > 0.0) {
      return Err(ProposalError::InvalidParameter(format!(
        "分割系数必须大于 0: {}",
        self.scale
      )));
    }
    if !(self.sigma >= 0.0) {
      return Err(ProposalError::InvalidParameter(format!(
        "sigma 不能为负: {}",
        self.sigma
      )));
    }
    if self.max_side == 0 {
      return Err(ProposalError::InvalidParameter("max_side 必须大于 0".into()));
    }
    Ok(())
  }

  fn segment(&self, image: &RgbImage) -> (Vec<usize>, usize) {
    let (width, height) = image.dimensions();
    let smoothed = if self.sigma > 0.0 {
      imageproc::filter::gaussian_blur_f32(image, self.sigma)
    } else {
      image.clone()
    };

    let index = |x: u32, y: u32| (y * width + x) as usize;
    let distance = |a: (u32, u32), b: (u32, u32)| -> f32 {
      let pa = smoothed.get_pixel(a.0, a.1).0;
      let pb = smoothed.get_pixel(b.0, b.1).0;
      pa.iter()
        .zip(pb.iter())
        .map(|(&u, &v)| (u as f32 - v as f32).powi(2))
        .sum::<f32>()
        .sqrt()
    };

    // 8 邻域，每对像素只取一次
    let mut edges = Vec::with_capacity(4 * (width * height) as usize);
    for y in 0..height {
      for x in 0..width {
        if x + 1 < width {
          edges.push((distance((x, y), (x + 1, y)), index(x, y), index(x + 1, y)));
        }
        if y + 1 < height {
          edges.push((distance((x, y), (x, y + 1)), index(x, y), index(x, y + 1)));
          if x + 1 < width {
            edges.push((
              distance((x, y), (x + 1, y + 1)),
              index(x, y),
              index(x + 1, y + 1),
            ));
          }
          if x > 0 {
            edges.push((
              distance((x, y), (x - 1, y + 1)),
              index(x, y),
              index(x - 1, y + 1),
            ));
          }
        }
      }
    }
    edges.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut uf = UnionFind::new((width * height) as usize);
    for &(weight, a, b) in &edges {
      let (ra, rb) = (uf.find(a), uf.find(b));
      if ra == rb {
        continue;
      }
      let threshold_a = uf.internal(ra) + self.scale / uf.size(ra) as f32;
      let threshold_b = uf.internal(rb) + self.scale / uf.size(rb) as f32;
      if weight <= threshold_a && weight <= threshold_b {
        uf.union(ra, rb, weight);
      }
    }

    for &(weight, a, b) in &edges {
      let (ra, rb) = (uf.find(a), uf.find(b));
      if ra != rb && (uf.size(ra) < self.min_size || uf.size(rb) < self.min_size) {
        uf.union(ra, rb, weight);
      }
    }

    let mut ids = HashMap::new();
    let labels = (0..(width * height) as usize)
      .map(|i| {
        let root = uf.find(i);
        let next = ids.len();
        *ids.entry(root).or_insert(next)
      })
      .collect();

    (labels, ids.len())
  }

  fn regions(image: &RgbImage, labels: &[usize], count: usize) -> Vec<Region> {
    let width = image.width();
    let mut regions: Vec<Region> = (0..count)
      .map(|_| Region {
        bbox: [u32::MAX, u32::MAX, 0, 0],
        size: 0,
        histogram: vec![0.0; 3 * HISTOGRAM_BINS],
      })
      .collect();

    for (i, &label) in labels.iter().enumerate() {
      let (x, y) = (i as u32 % width, i as u32 / width);
      let region = &mut regions[label];
      region.bbox[0] = region.bbox[0].min(x);
      region.bbox[1] = region.bbox[1].min(y);
      region.bbox[2] = region.bbox[2].max(x + 1);
      region.bbox[3] = region.bbox[3].max(y + 1);
      region.size += 1;
      for (c, &value) in image.get_pixel(x, y).0.iter().enumerate() {
        let bin = value as usize * HISTOGRAM_BINS / 256;
        region.histogram[c * HISTOGRAM_BINS + bin] += 1.0;
      }
    }

    for region in &mut regions {
      let total: f64 = region.histogram.iter().sum();
      if total > 0.0 {
        region.histogram.iter_mut().for_each(|v| *v /= total);
      }
    }

    regions
  }

  fn adjacency(labels: &[usize], width: u32, height: u32) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    let mut link = |a: usize, b: usize| {
      if a != b {
        pairs.insert((a.min(b), a.max(b)));
      }
    };

    for y in 0..height {
      for x in 0..width {
        let i = (y * width + x) as usize;
        if x + 1 < width {
          link(labels[i], labels[i + 1]);
        }
        if y + 1 < height {
          link(labels[i], labels[i + width as usize]);
        }
      }
    }
    pairs
  }

  fn similarity(a: &Region, b: &Region, image_size: f64) -> f64 {
    let colour: f64 = a
      .histogram
      .iter()
      .zip(b.histogram.iter())
      .map(|(u, v)| u.min(*v))
      .sum();
    let size = 1.0 - (a.size + b.size) as f64 / image_size;
    let merged = merge_bbox(a.bbox, b.bbox);
    let merged_area = ((merged[2] - merged[0]) * (merged[3] - merged[1])) as f64;
    let fill = 1.0 - (merged_area - a.size as f64 - b.size as f64) / image_size;
    colour + size + fill
  }

  /// 分层合并，返回所有层级出现过的区域
  fn group(
    mut regions: Vec<Region>,
    adjacency: BTreeSet<(usize, usize)>,
    image_size: f64,
  ) -> Vec<Region> {
    let mut similarities: BTreeMap<(usize, usize), f64> = adjacency
      .into_iter()
      .map(|(a, b)| ((a, b), Self::similarity(&regions[a], &regions[b], image_size)))
      .collect();

    loop {
      let Some((a, b)) = similarities
        .iter()
        .max_by(|x, y| x.1.total_cmp(y.1))
        .map(|(&key, _)| key)
      else {
        break;
      };

      let size = regions[a].size + regions[b].size;
      let histogram = regions[a]
        .histogram
        .iter()
        .zip(regions[b].histogram.iter())
        .map(|(u, v)| (u * regions[a].size as f64 + v * regions[b].size as f64) / size as f64)
        .collect();
      let merged = Region {
        bbox: merge_bbox(regions[a].bbox, regions[b].bbox),
        size,
        histogram,
      };
      let id = regions.len();
      regions.push(merged);

      let stale: Vec<(usize, usize)> = similarities
        .keys()
        .filter(|(u, v)| *u == a || *u == b || *v == a || *v == b)
        .copied()
        .collect();
      let mut neighbours = HashSet::new();
      for key in stale {
        similarities.remove(&key);
        for n in [key.0, key.1] {
          if n != a && n != b {
            neighbours.insert(n);
          }
        }
      }
      for n in neighbours {
        let s = Self::similarity(&regions[n], &regions[id], image_size);
        similarities.insert((n, id), s);
      }
    }

    regions
  }
}

fn merge_bbox(a: [u32; 4], b: [u32; 4]) -> [u32; 4] {
  [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]
}

impl ProposalSource for SelectiveSearch {
  fn propose(&self, image: &RgbImage) -> Result<Proposals, ProposalError> {
    self.check()?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(ProposalError::InvalidParameter("输入图像为空".into()));
    }

    // 大图在缩小的副本上分割，框再换算回原图
    let longest = width.max(height);
    let working = if longest > self.max_side {
      let factor = self.max_side as f64 / longest as f64;
      let w = ((width as f64 * factor) as u32).max(1);
      let h = ((height as f64 * factor) as u32).max(1);
      image::imageops::resize(image, w, h, FilterType::Triangle)
    } else {
      image.clone()
    };
    let (work_w, work_h) = working.dimensions();
    let space = if (work_w, work_h) == (width, height) {
      CoordinateSpace::Original
    } else {
      CoordinateSpace::Resized {
        width: work_w,
        height: work_h,
      }
    };

    let (labels, count) = self.segment(&working);
    debug!("图分割得到 {} 个初始区域", count);

    let regions = Self::regions(&working, &labels, count);
    let adjacency = Self::adjacency(&labels, work_w, work_h);
    let regions = Self::group(regions, adjacency, (work_w * work_h) as f64);

    let mut seen = HashSet::new();
    let mut proposals = Proposals::default();
    // 高层级（后合并）的区域优先
    for region in regions.iter().rev() {
      if proposals.len() >= self.max_proposals {
        break;
      }
      let [left, top, right, bottom] = region.bbox;
      let bbox = BoundingBox::new(left, top, right, bottom)
        .in_space(space)
        .to_original(width, height);
      if bbox.width() < self.min_box_side || bbox.height() < self.min_box_side {
        continue;
      }
      if seen.insert(bbox.as_array()) {
        proposals.push(crop(image, &bbox), bbox);
      }
    }

    info!(
      "选择性搜索生成 {} 个候选区域 (共 {} 个层级区域)",
      proposals.len(),
      regions.len()
    );
    Ok(proposals)
  }
}
