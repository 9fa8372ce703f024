//! Disjoint-set / union-find (`C1`): maps object ids to their canonical
//! base, with path compression and thread-safe expansion.
//!
//! `parent`/`cardinality` are backed by `Vec<AtomicI32>`, not plain `i32`,
//! to make the relaxed tear-free load/store requirement explicit in the
//! type system: concurrent `find_base` calls may each write a *different*
//! valid base for the same index, but every value written is always a
//! valid base at the moment of the write, so callers converge on the next
//! call. This relies on lock-free 32-bit loads/stores; a 64-bit element
//! would not have the same property.

use std::sync::atomic::{AtomicI32, Ordering};

use rayon::prelude::*;

use crate::error::{TiffError, TiffResult};

/// `2^31 - 1001`, the ceiling on tracked object ids (`i32::MAX - 1000`).
pub const MAX_OBJECT_COUNT: i32 = i32::MAX - 1000;

/// Union-find over object ids `0..count()`, with path-compressed `find_base`
/// and size-based union.
pub struct DisjointSet {
    parent: Vec<AtomicI32>,
    cardinality: Vec<AtomicI32>,
}

impl DisjointSet {
    pub fn new() -> Self {
        DisjointSet {
            parent: Vec::new(),
            cardinality: Vec::new(),
        }
    }

    pub fn with_capacity(n: i32) -> TiffResult<Self> {
        let mut set = DisjointSet::new();
        if n > 0 {
            set.expand(n - 1)?;
        }
        Ok(set)
    }

    pub fn count(&self) -> i32 {
        self.parent.len() as i32
    }

    /// Grows the backing arrays (geometric doubling) so that index `i` is
    /// tracked, self-initializing every new slot as its own singleton base.
    /// Fails with `ResourceExhausted` if `i` exceeds `MAX_OBJECT_COUNT`.
    pub fn expand(&mut self, i: i32) -> TiffResult<()> {
        if i < 0 {
            return Err(TiffError::InvalidArgument("negative object id".into()));
        }
        if i >= MAX_OBJECT_COUNT {
            return Err(TiffError::ResourceExhausted);
        }
        if i < self.count() {
            return Ok(());
        }
        let mut new_len = self.count().max(1);
        while new_len <= i {
            new_len = new_len.saturating_mul(2).min(MAX_OBJECT_COUNT);
        }
        let old_len = self.parent.len();
        self.parent.resize_with(new_len as usize, || AtomicI32::new(0));
        self.cardinality.resize_with(new_len as usize, || AtomicI32::new(0));
        for k in old_len..new_len as usize {
            self.parent[k].store(k as i32, Ordering::Relaxed);
            self.cardinality[k].store(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Reads `parent[i]` without expanding, returning `i` itself for any
    /// index outside the tracked range — used by parallel scans that touch
    /// labels the set hasn't been told about yet (e.g. a pixel value that
    /// never participated in a union).
    pub fn parent_or_this(&self, i: i32) -> i32 {
        if i < 0 || i >= self.count() {
            i
        } else {
            self.parent[i as usize].load(Ordering::Relaxed)
        }
    }

    /// Single-pass path compression: walks to the root, then writes it back
    /// to `parent[i]` directly (not every node on the path — one pass is
    /// enough given repeated calls reconverge).
    pub fn find_base(&self, i: i32) -> i32 {
        let mut cur = i;
        loop {
            let p = self.parent[cur as usize].load(Ordering::Relaxed);
            if p == cur {
                break;
            }
            cur = p;
        }
        let base = cur;
        self.parent[i as usize].store(base, Ordering::Relaxed);
        base
    }

    /// Union by size on two already-resolved bases; returns the surviving
    /// base. A no-op (returns `a`) if `a == b`.
    pub fn joint_bases(&self, a: i32, b: i32) -> i32 {
        if a == b {
            return a;
        }
        let ca = self.cardinality[a as usize].load(Ordering::Relaxed);
        let cb = self.cardinality[b as usize].load(Ordering::Relaxed);
        let (big, small) = if ca >= cb { (a, b) } else { (b, a) };
        self.parent[small as usize].store(big, Ordering::Relaxed);
        self.cardinality[big as usize].store(ca + cb, Ordering::Relaxed);
        big
    }

    /// Expands to cover both `a` and `b`, then joins their bases.
    pub fn joint_objects(&mut self, a: i32, b: i32) -> TiffResult<i32> {
        self.expand(a.max(b))?;
        let base_a = self.find_base(a);
        let base_b = self.find_base(b);
        Ok(self.joint_bases(base_a, base_b))
    }

    /// Resolves `find_base` for every tracked index in parallel, fanning
    /// out over blocks of 256 consecutive indices.
    pub fn resolve_all_bases(&self) {
        const BLOCK: usize = 256;
        let n = self.parent.len();
        (0..n).step_by(BLOCK).par_bridge().for_each(|start| {
            let end = (start + BLOCK).min(n);
            for i in start..end {
                self.find_base(i as i32);
            }
        });
    }

    pub fn cardinality_of_base(&self, base: i32) -> i32 {
        self.cardinality[base as usize].load(Ordering::Relaxed)
    }
}

impl Default for DisjointSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_their_own_base() {
        let mut set = DisjointSet::new();
        set.expand(9).unwrap();
        for i in 0..10 {
            assert_eq!(set.find_base(i), i);
        }
    }

    #[test]
    fn expand_grows_geometrically_and_initializes_new_slots() {
        let mut set = DisjointSet::new();
        set.expand(5).unwrap();
        assert!(set.count() >= 6);
        assert_eq!(set.find_base(5), 5);
        assert_eq!(set.cardinality_of_base(5), 1);
    }

    #[test]
    fn joint_objects_unions_by_size_and_find_base_is_idempotent() {
        let mut set = DisjointSet::new();
        set.joint_objects(1, 2).unwrap();
        set.joint_objects(3, 4).unwrap();
        set.joint_objects(2, 3).unwrap();
        let base = set.find_base(1);
        for i in [1, 2, 3, 4] {
            assert_eq!(set.find_base(i), base);
            assert_eq!(set.find_base(set.find_base(i)), set.find_base(i));
        }
        assert_eq!(set.cardinality_of_base(base), 4);
    }

    #[test]
    fn parent_or_this_is_identity_outside_tracked_range() {
        let set = DisjointSet::new();
        assert_eq!(set.parent_or_this(42), 42);
    }

    #[test]
    fn expand_fails_past_max_object_count() {
        let mut set = DisjointSet::new();
        assert!(matches!(
            set.expand(MAX_OBJECT_COUNT),
            Err(TiffError::ResourceExhausted)
        ));
    }

    #[test]
    fn resolve_all_bases_matches_sequential_find_base() {
        let mut set = DisjointSet::new();
        for i in 0..300 {
            set.expand(i).unwrap();
        }
        for i in (1..300).step_by(3) {
            set.joint_objects(i - 1, i).unwrap();
        }
        set.resolve_all_bases();
        for i in 0..300 {
            assert_eq!(set.parent[i as usize].load(Ordering::Relaxed), set.find_base(i));
        }
    }
}
