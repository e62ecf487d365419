/// Weighted quick-union with path compression and a component size cap.
///
/// Used to merge overlapping cycles into rings. A union that would push
/// the merged component past the cap is refused, leaving both components
/// untouched; the caller decides what to do with the refused group.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            size: Vec::new(),
        }
    }

    /// Add a new singleton and return its index.
    pub fn push(&mut self) -> usize {
        let idx = self.parent.len();
        self.parent.push(idx);
        self.size.push(1);
        idx
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `x`, with path compression.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Members in the component rooted at `root`'s component.
    pub fn component_size(&mut self, x: usize) -> usize {
        let root = self.find(x);
        self.size[root]
    }

    /// Union by size, ignoring any cap. Returns the new root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    /// Union every index in `group` into one component, unless the
    /// merged component would exceed `cap` members. Returns the root on
    /// success, `None` when refused. Refusal leaves all components
    /// unchanged.
    pub fn try_union_group(&mut self, group: &[usize], cap: usize) -> Option<usize> {
        let mut roots: Vec<usize> = group.iter().map(|&x| self.find(x)).collect();
        roots.sort_unstable();
        roots.dedup();

        let merged_size: usize = roots.iter().map(|&r| self.size[r]).sum();
        if merged_size > cap {
            return None;
        }

        let mut root = roots[0];
        for &other in &roots[1..] {
            root = self.union(root, other);
        }
        Some(root)
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_singletons(n: usize) -> UnionFind {
        let mut uf = UnionFind::new();
        for _ in 0..n {
            uf.push();
        }
        uf
    }

    #[test]
    fn test_basic_union_find() {
        let mut uf = with_singletons(4);
        uf.union(0, 1);
        uf.union(2, 3);
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(2));
        assert_eq!(uf.component_size(0), 2);
    }

    #[test]
    fn test_union_group_within_cap() {
        let mut uf = with_singletons(6);
        let root = uf.try_union_group(&[0, 1, 2], 30).unwrap();
        assert_eq!(uf.component_size(root), 3);
        // Overlapping group merges into the same component.
        uf.try_union_group(&[2, 3, 4], 30).unwrap();
        assert_eq!(uf.component_size(0), 5);
    }

    #[test]
    fn test_union_group_refused_at_cap() {
        let mut uf = with_singletons(8);
        uf.try_union_group(&[0, 1, 2, 3], 4).unwrap();
        // 4 existing + 2 new would be 6 > 4: refused, nothing changes.
        assert!(uf.try_union_group(&[3, 4, 5], 4).is_none());
        assert_eq!(uf.component_size(0), 4);
        assert_eq!(uf.component_size(4), 1);
        assert_eq!(uf.component_size(5), 1);
    }

    #[test]
    fn test_union_group_idempotent_on_same_component() {
        let mut uf = with_singletons(3);
        uf.try_union_group(&[0, 1, 2], 3).unwrap();
        // Already one component of exactly cap size: re-union succeeds.
        assert!(uf.try_union_group(&[0, 2], 3).is_some());
        assert_eq!(uf.component_size(1), 3);
    }

    #[test]
    fn test_path_compression_keeps_sizes() {
        let mut uf = with_singletons(16);
        for i in 1..16 {
            uf.union(0, i);
        }
        assert_eq!(uf.component_size(15), 16);
    }
}
