// 该文件是 Quyu （区域检测） 项目的一部分。
// src/proposal/union_find.rs - 并查集
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

/// 按大小合并的并查集，额外记录每个集合的最大内部边权（图分割用）
pub(crate) struct UnionFind {
  parent: Vec<usize>,
  size: Vec<usize>,
  internal: Vec<f32>,
}

impl UnionFind {
  pub fn new(len: usize) -> Self {
    Self {
      parent: (0..len).collect(),
      size: vec![1; len],
      internal: vec![0.0; len],
    }
  }

  /// 查找根节点并压缩路径
  pub fn find(&mut self, mut id: usize) -> usize {
    let mut root = id;
    while self.parent[root] != root {
      root = self.parent[root];
    }

    while self.parent[id] != root {
      let next = self.parent[id];
      self.parent[id] = root;
      id = next;
    }

    root
  }

  /// 合并两个根节点所在集合，`weight` 为连接它们的边权；返回新的根
  pub fn union(&mut self, a: usize, b: usize, weight: f32) -> usize {
    let a = self.find(a);
    let b = self.find(b);
    if a == b {
      return a;
    }

    let (root, child) = if self.size[a] >= self.size[b] {
      (a, b)
    } else {
      (b, a)
    };
    self.parent[child] = root;
    self.size[root] += self.size[child];
    self.internal[root] = weight.max(self.internal[root]).max(self.internal[child]);
    root
  }

  pub fn size(&mut self, id: usize) -> usize {
    let root = self.find(id);
    self.size[root]
  }

  pub fn internal(&mut self, id: usize) -> f32 {
    let root = self.find(id);
    self.internal[root]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn singletons_are_their_own_root() {
    let mut uf = UnionFind::new(4);
    assert_eq!(uf.find(0), 0);
    assert_eq!(uf.find(3), 3);
    assert_eq!(uf.size(2), 1);
  }

  #[test]
  fn union_tracks_size_and_internal_weight() {
    let mut uf = UnionFind::new(6);
    uf.union(0, 1, 2.0);
    uf.union(1, 2, 5.0);
    uf.union(3, 4, 1.0);

    assert_eq!(uf.find(0), uf.find(2));
    assert_ne!(uf.find(0), uf.find(3));
    assert_eq!(uf.size(2), 3);
    assert_eq!(uf.internal(0), 5.0);
    assert_eq!(uf.internal(4), 1.0);

    uf.union(0, 4, 0.5);
    assert_eq!(uf.size(3), 5);
    assert_eq!(uf.internal(3), 5.0);
    assert_eq!(uf.size(5), 1);
  }
}
