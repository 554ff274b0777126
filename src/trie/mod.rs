//! Substring trie forest
//!
//! Accumulator for the optimized expansion of the weighted-degree string
//! kernel: one depth-bounded trie per sequence position, holding at each node
//! the summed, weighted contribution of every inserted example whose
//! substring at that position descends through it. Scoring a sequence is a
//! walk per position instead of a pass over the support set.
//!
//! Nodes live in a single arena indexed by `u32`; clearing the forest resets
//! the arena without giving its allocation back, so repeated train/score
//! cycles reuse the same memory.

use crate::core::{Result, StringKernelError};

/// Sentinel child index for "no edge"
const NO_CHILD: u32 = u32::MAX;

/// Arena node: accumulated weight plus one child slot per alphabet symbol
struct TrieNode {
    weight: f64,
    children: Box<[u32]>,
}

/// Forest of depth-bounded tries over encoded sequences
///
/// Created empty; [`create_empty_tries`](Self::create_empty_tries) sizes the
/// forest to a sequence layout, insertion accumulates example contributions,
/// and the `compute_by_tree` walks read scores back out. Symbols are encoded
/// alphabet ranks in `0..alphabet_size`.
pub struct SubstringTrie {
    alphabet_size: usize,
    degree: usize,
    arena: Vec<TrieNode>,
    roots: Vec<u32>,
}

impl SubstringTrie {
    /// Create an empty forest
    ///
    /// # Arguments
    /// * `alphabet_size` - number of distinct symbols (must be positive)
    /// * `degree` - maximum substring length, which bounds trie depth
    pub fn new(alphabet_size: usize, degree: usize) -> Result<Self> {
        if alphabet_size == 0 {
            return Err(StringKernelError::InvalidParameter(
                "alphabet size must be positive".to_string(),
            ));
        }
        if degree == 0 {
            return Err(StringKernelError::InvalidParameter(
                "trie degree must be positive".to_string(),
            ));
        }
        Ok(Self {
            alphabet_size,
            degree,
            arena: Vec::new(),
            roots: Vec::new(),
        })
    }

    /// Reset the forest to `num_positions` fresh empty tries
    ///
    /// The arena allocation is kept and refilled, so resizing an already-used
    /// forest does not reallocate.
    pub fn create_empty_tries(&mut self, num_positions: usize) {
        self.arena.clear();
        self.roots.clear();
        self.roots.reserve(num_positions);
        for _ in 0..num_positions {
            let root = self.alloc_node();
            self.roots.push(root);
        }
    }

    /// Drop all tries
    ///
    /// With `keep_allocation` the arena memory is retained for the next
    /// [`create_empty_tries`](Self::create_empty_tries); otherwise it is
    /// released to the allocator.
    pub fn delete_trees(&mut self, keep_allocation: bool) {
        self.roots.clear();
        if keep_allocation {
            self.arena.clear();
        } else {
            self.arena = Vec::new();
        }
    }

    fn alloc_node(&mut self) -> u32 {
        let idx = self.arena.len();
        assert!(idx < NO_CHILD as usize, "trie arena exhausted");
        self.arena.push(TrieNode {
            weight: 0.0,
            children: vec![NO_CHILD; self.alphabet_size].into_boxed_slice(),
        });
        idx as u32
    }

    fn child_or_create(&mut self, node: u32, symbol: usize) -> u32 {
        let child = self.arena[node as usize].children[symbol];
        if child != NO_CHILD {
            return child;
        }
        let fresh = self.alloc_node();
        self.arena[node as usize].children[symbol] = fresh;
        fresh
    }

    /// Add `alpha` times the substring starting at `pos` to trie `pos`
    ///
    /// Descends along the symbols `seq[pos..]`, creating nodes as needed, for
    /// at most `degree` levels or until the sequence ends; every node on the
    /// path accumulates `alpha`. Per-level kernel weights are applied at read
    /// time, not here.
    ///
    /// # Panics
    /// Panics if `pos` has no trie or a symbol is out of range.
    pub fn add_to_trie(&mut self, pos: usize, seq: &[u8], alpha: f64) {
        assert!(pos < self.roots.len(), "position {} has no trie", pos);
        assert!(pos < seq.len(), "position {} past end of sequence", pos);
        let depth = self.degree.min(seq.len() - pos);
        let mut node = self.roots[pos];
        for j in 0..depth {
            let symbol = seq[pos + j] as usize;
            assert!(symbol < self.alphabet_size, "symbol {} out of range", symbol);
            node = self.child_or_create(node, symbol);
            self.arena[node as usize].weight += alpha;
        }
    }

    /// Add a substring allowing up to `max_mismatch` substitutions
    ///
    /// Every path within the mismatch budget is materialized. A node reached
    /// with `m` mismatches at depth `j` (zero-based) accumulates
    /// `alpha * weights[j + degree * m] / weights[j]`, rescaling the exact
    /// per-level weight applied at read time into the mismatch weight. The
    /// `weights` table is laid out `[level + degree * mismatches]` with
    /// `degree * (max_mismatch + 1)` entries.
    ///
    /// # Panics
    /// Panics if `pos` has no trie, a symbol is out of range, or `weights`
    /// is too short.
    pub fn add_to_trie_mismatch(
        &mut self,
        pos: usize,
        seq: &[u8],
        alpha: f64,
        weights: &[f64],
        max_mismatch: usize,
    ) {
        assert!(pos < self.roots.len(), "position {} has no trie", pos);
        assert!(pos < seq.len(), "position {} past end of sequence", pos);
        assert!(
            weights.len() >= self.degree * (max_mismatch + 1),
            "weights table too short"
        );
        let depth = self.degree.min(seq.len() - pos);
        // worklist of (node, level, mismatches so far)
        let mut stack: Vec<(u32, usize, usize)> = vec![(self.roots[pos], 0, 0)];
        while let Some((node, j, m)) = stack.pop() {
            let symbol = seq[pos + j] as usize;
            assert!(symbol < self.alphabet_size, "symbol {} out of range", symbol);
            for s in 0..self.alphabet_size {
                let nm = if s == symbol { m } else { m + 1 };
                if nm > max_mismatch {
                    continue;
                }
                let child = self.child_or_create(node, s);
                let exact = weights[j];
                if exact != 0.0 {
                    self.arena[child as usize].weight +=
                        alpha * weights[j + self.degree * nm] / exact;
                }
                if j + 1 < depth {
                    stack.push((child, j + 1, nm));
                }
            }
        }
    }

    /// Score an encoded sequence against the forest
    ///
    /// For each position, walks trie `pos` along `seq[pos..]` as far as edges
    /// exist, adding `node.weight * degree_weights[level]` at each step.
    /// Returns 0.0 on an empty forest.
    ///
    /// # Panics
    /// Panics if a symbol is out of range or `degree_weights` is shorter
    /// than the degree.
    pub fn compute_by_tree(&self, seq: &[u8], degree_weights: &[f64]) -> f64 {
        assert!(
            degree_weights.len() >= self.degree,
            "need one weight per level"
        );
        let mut sum = 0.0;
        let positions = self.roots.len().min(seq.len());
        for pos in 0..positions {
            sum += self.walk(pos, seq, |j, w| w * degree_weights[j]);
        }
        sum
    }

    /// Score per trie level instead of summing across levels
    ///
    /// `level_sums` must hold one slot per level (the degree); slot `j`
    /// accumulates the raw weight mass matched at depth `j + 1` across all
    /// positions, without per-level kernel weights.
    pub fn compute_by_tree_levels(&self, seq: &[u8], level_sums: &mut [f64]) {
        assert!(level_sums.len() >= self.degree, "need one slot per level");
        for slot in level_sums.iter_mut().take(self.degree) {
            *slot = 0.0;
        }
        let positions = self.roots.len().min(seq.len());
        for pos in 0..positions {
            let depth = self.degree.min(seq.len() - pos);
            let mut node = self.roots[pos];
            for j in 0..depth {
                let symbol = seq[pos + j] as usize;
                assert!(symbol < self.alphabet_size, "symbol {} out of range", symbol);
                let child = self.arena[node as usize].children[symbol];
                if child == NO_CHILD {
                    break;
                }
                node = child;
                level_sums[j] += self.arena[node as usize].weight;
            }
        }
    }

    fn walk<F: Fn(usize, f64) -> f64>(&self, pos: usize, seq: &[u8], term: F) -> f64 {
        let depth = self.degree.min(seq.len() - pos);
        let mut node = self.roots[pos];
        let mut sum = 0.0;
        for j in 0..depth {
            let symbol = seq[pos + j] as usize;
            assert!(symbol < self.alphabet_size, "symbol {} out of range", symbol);
            let child = self.arena[node as usize].children[symbol];
            if child == NO_CHILD {
                break;
            }
            node = child;
            sum += term(j, self.arena[node as usize].weight);
        }
        sum
    }

    /// Number of tries in the forest
    pub fn num_positions(&self) -> usize {
        self.roots.len()
    }

    /// Total nodes allocated, roots included
    pub fn num_nodes(&self) -> usize {
        self.arena.len()
    }

    /// Whether the forest currently holds any tries
    pub fn is_initialized(&self) -> bool {
        !self.roots.is_empty()
    }

    /// Maximum substring length the forest indexes
    pub fn degree(&self) -> usize {
        self.degree
    }
}
