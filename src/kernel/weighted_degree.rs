//! Weighted-degree string kernel
//!
//! The weighted-degree kernel over equal-length strings x and y of length L:
//! K(x, y) = Σₖ βₖ Σᵢ 1[x[i..i+k] = y[i..i+k]]
//! i.e. every shared substring up to length `degree` contributes, weighted by
//! a decreasing per-length weight βₖ. A mismatch budget optionally admits
//! substrings differing in up to `max_mismatch` positions at reduced weight.
//!
//! Three evaluation strategies produce the same values:
//! - direct per-position comparison (with or without mismatches)
//! - a match-run formulation over precomputed block weights, one table lookup
//!   per maximal run of agreeing positions
//! - a [`SubstringTrie`] holding a trained model's weighted examples, scoring
//!   new sequences without revisiting the support set

use crate::core::{KernelFunction, Result, SequenceSet, StringKernelError};
use crate::trie::SubstringTrie;
use log::info;
use std::sync::Arc;

/// Weighted-degree string kernel over a set of equal-length sequences
///
/// The kernel indexes its sequence set: `compute(i, j)` compares sequences
/// `i` and `j`, which lets a row cache drive evaluation by index. Per-length
/// weights follow the standard weighted-degree scheme, `w[k] ∝ degree - k`,
/// normalized to sum to one; with a mismatch budget the table extends to
/// `w[k + degree * m]`, the weight of a length-k+1 substring carrying `m`
/// substitutions.
pub struct WeightedDegreeKernel<S: SequenceSet> {
    sequences: Arc<S>,
    degree: usize,
    max_mismatch: usize,
    alphabet_size: usize,
    /// `degree * (max_mismatch + 1)` entries, laid out `[level + degree * mm]`
    weights: Vec<f64>,
    /// Cumulative weight of a maximal match run, indexed by run length - 1
    block_weights: Vec<f64>,
    normalization_const: f64,
    block_computation: bool,
}

impl<S: SequenceSet> WeightedDegreeKernel<S> {
    /// Create a kernel with block computation and normalization enabled
    ///
    /// # Arguments
    /// * `sequences` - equal-length encoded sequence set the kernel indexes
    /// * `degree` - maximum substring length (must be positive)
    /// * `max_mismatch` - substitution budget per substring
    pub fn new(sequences: Arc<S>, degree: usize, max_mismatch: usize) -> Result<Self> {
        Self::with_options(sequences, degree, max_mismatch, true, true)
    }

    /// Create a kernel with explicit evaluation options
    ///
    /// # Arguments
    /// * `block_computation` - use the match-run formulation when the
    ///   mismatch budget is zero (identical values, fewer table lookups)
    /// * `use_normalization` - divide all values by K(x, x) of a full-length
    ///   sequence, making the diagonal 1.0
    pub fn with_options(
        sequences: Arc<S>,
        degree: usize,
        max_mismatch: usize,
        block_computation: bool,
        use_normalization: bool,
    ) -> Result<Self> {
        if degree == 0 {
            return Err(StringKernelError::InvalidParameter(
                "degree must be positive".to_string(),
            ));
        }
        if sequences.is_empty() {
            return Err(StringKernelError::EmptySequenceSet);
        }
        let seq_length = sequences.max_len();
        if seq_length == 0 {
            return Err(StringKernelError::InvalidParameter(
                "sequences must be non-empty".to_string(),
            ));
        }
        let alphabet_size = sequences.alphabet_size();
        if max_mismatch > 0 && alphabet_size < 2 {
            return Err(StringKernelError::InvalidParameter(
                "mismatch weighting needs at least two symbols".to_string(),
            ));
        }
        let weights = wd_weights(degree, max_mismatch, alphabet_size);
        let block_weights = wd_block_weights(degree, seq_length);
        let normalization_const = if use_normalization {
            block_weights[seq_length - 1]
        } else {
            1.0
        };
        Ok(Self {
            sequences,
            degree,
            max_mismatch,
            alphabet_size,
            weights,
            block_weights,
            normalization_const,
            block_computation,
        })
    }

    /// Maximum substring length
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Substitution budget per substring
    pub fn max_mismatch(&self) -> usize {
        self.max_mismatch
    }

    /// Per-level weights for exact matches (one entry per level)
    pub fn degree_weights(&self) -> &[f64] {
        &self.weights[..self.degree]
    }

    /// Divisor applied to every kernel value
    pub fn normalization_const(&self) -> f64 {
        self.normalization_const
    }

    fn compute_without_mismatch(&self, a: &[u8], b: &[u8]) -> f64 {
        let mut sum = 0.0;
        for i in 0..a.len() {
            let mut sumi = 0.0;
            for j in 0..self.degree.min(a.len() - i) {
                if a[i + j] != b[i + j] {
                    break;
                }
                sumi += self.weights[j];
            }
            sum += sumi;
        }
        sum
    }

    fn compute_with_mismatch(&self, a: &[u8], b: &[u8]) -> f64 {
        let mut sum = 0.0;
        for i in 0..a.len() {
            let mut sumi = 0.0;
            let mut mismatches = 0;
            for j in 0..self.degree.min(a.len() - i) {
                if a[i + j] != b[i + j] {
                    mismatches += 1;
                    if mismatches > self.max_mismatch {
                        break;
                    }
                }
                sumi += self.weights[j + self.degree * mismatches];
            }
            sum += sumi;
        }
        sum
    }

    /// Sum block weights over maximal runs of agreeing positions
    ///
    /// A run of length r contributes `block_weights[r - 1]`, the closed-form
    /// total of every substring weight inside the run.
    fn compute_using_block(&self, a: &[u8], b: &[u8]) -> f64 {
        let mut sum = 0.0;
        let mut run = 0usize;
        for i in 0..a.len() {
            if a[i] == b[i] {
                run += 1;
            } else {
                if run > 0 {
                    sum += self.block_weights[run - 1];
                }
                run = 0;
            }
        }
        if run > 0 {
            sum += self.block_weights[run - 1];
        }
        sum
    }

    /// Create a trie forest sized for this kernel's sequence layout
    pub fn create_empty_tries(&self) -> Result<SubstringTrie> {
        let mut trie = SubstringTrie::new(self.alphabet_size, self.degree)?;
        trie.create_empty_tries(self.sequences.max_len());
        Ok(trie)
    }

    /// Add sequence `idx` to the forest with coefficient `alpha`
    ///
    /// Inserts the substring at every start position. Zero coefficients are
    /// skipped.
    ///
    /// # Panics
    /// Panics if the mismatch budget is nonzero; use
    /// [`add_example_to_tree_mismatch`](Self::add_example_to_tree_mismatch).
    pub fn add_example_to_tree(&self, trie: &mut SubstringTrie, idx: usize, alpha: f64) {
        assert!(
            self.max_mismatch == 0,
            "exact insertion with a nonzero mismatch budget"
        );
        if alpha == 0.0 {
            return;
        }
        let seq = self.sequences.sequence(idx);
        for pos in 0..seq.len() {
            trie.add_to_trie(pos, seq, alpha);
        }
    }

    /// Add sequence `idx` to the forest, materializing mismatch paths
    pub fn add_example_to_tree_mismatch(&self, trie: &mut SubstringTrie, idx: usize, alpha: f64) {
        if alpha == 0.0 {
            return;
        }
        let seq = self.sequences.sequence(idx);
        for pos in 0..seq.len() {
            trie.add_to_trie_mismatch(pos, seq, alpha, &self.weights, self.max_mismatch);
        }
    }

    /// Score an encoded sequence against a trained forest
    ///
    /// Equals `Σᵢ cᵢ K(xᵢ, seq)` over the inserted examples with their
    /// coefficients, evaluated in one pass over `seq`.
    pub fn compute_by_tree(&self, trie: &SubstringTrie, seq: &[u8]) -> f64 {
        trie.compute_by_tree(seq, self.degree_weights()) / self.normalization_const
    }

    /// Score an encoded sequence, split by substring length
    ///
    /// `level_contrib[k]` receives the weighted contribution of length-k+1
    /// substrings; the slots must cover the degree. The sum over slots
    /// equals [`compute_by_tree`](Self::compute_by_tree).
    pub fn compute_by_tree_levels(
        &self,
        trie: &SubstringTrie,
        seq: &[u8],
        level_contrib: &mut [f64],
    ) {
        trie.compute_by_tree_levels(seq, level_contrib);
        for (j, slot) in level_contrib.iter_mut().enumerate().take(self.degree) {
            *slot *= self.weights[j] / self.normalization_const;
        }
    }

    /// Build a scoring forest from support examples and their coefficients
    ///
    /// Each example contributes `alphas[n] * label(indices[n])`; scoring a
    /// sequence with the returned forest equals the signed kernel expansion
    /// `Σₙ alphas[n] yₙ K(x_indicesₙ, ·)`.
    pub fn init_optimization(&self, indices: &[usize], alphas: &[f64]) -> Result<SubstringTrie> {
        if indices.len() != alphas.len() {
            return Err(StringKernelError::DimensionMismatch {
                expected: indices.len(),
                actual: alphas.len(),
            });
        }
        let mut trie = self.create_empty_tries()?;
        for (&idx, &alpha) in indices.iter().zip(alphas.iter()) {
            if idx >= self.sequences.len() {
                return Err(StringKernelError::InvalidIndex(idx));
            }
            let coeff = alpha * self.sequences.label(idx);
            if self.max_mismatch == 0 {
                self.add_example_to_tree(&mut trie, idx, coeff);
            } else {
                self.add_example_to_tree_mismatch(&mut trie, idx, coeff);
            }
        }
        info!(
            "built scoring forest from {} examples ({} trie nodes)",
            indices.len(),
            trie.num_nodes()
        );
        Ok(trie)
    }
}

impl<S: SequenceSet> KernelFunction for WeightedDegreeKernel<S> {
    fn compute(&self, i: usize, j: usize) -> f64 {
        let a = self.sequences.sequence(i);
        let b = self.sequences.sequence(j);
        assert_eq!(a.len(), b.len(), "sequences must have equal length");
        let raw = if self.max_mismatch == 0 && self.block_computation {
            self.compute_using_block(a, b)
        } else if self.max_mismatch > 0 {
            self.compute_with_mismatch(a, b)
        } else {
            self.compute_without_mismatch(a, b)
        };
        raw / self.normalization_const
    }
}

/// Weighted-degree level weights, extended by mismatch columns
///
/// Exact weights `w[k] = (degree - k) / Σ`, summing to one. The weight of a
/// level-k substring with m > 0 substitutions spreads `w[k]` over the
/// C(k+1, m) * (alphabet - 1)^m strings within distance m, and is zero when
/// m > k (more substitutions than the level admits). The table holds
/// `degree * (max_mismatch + 1)` entries, laid out `[level + degree * mm]`.
pub fn wd_weights(degree: usize, max_mismatch: usize, alphabet_size: usize) -> Vec<f64> {
    let mut weights = vec![0.0; degree * (max_mismatch + 1)];
    let mut sum = 0.0;
    for (k, w) in weights.iter_mut().enumerate().take(degree) {
        *w = (degree - k) as f64;
        sum += *w;
    }
    for w in weights.iter_mut().take(degree) {
        *w /= sum;
    }
    let variants = (alphabet_size - 1).max(1) as f64;
    for k in 0..degree {
        for m in 1..=max_mismatch {
            weights[k + m * degree] = if m < k + 1 {
                weights[k] / (n_choose_k(k + 1, m) * variants.powi(m as i32))
            } else {
                0.0
            };
        }
    }
    weights
}

/// Closed-form total substring weight of a match run, by run length - 1
///
/// For runs shorter than the degree the total is the cubic
/// `(-r³ + (3d-3)r² + (9d-2)r + 6d) / (3d(d+1))`; past the degree it grows
/// linearly, `(-d + 3r + 4) / 3`. The table covers `max(seq_length, degree)`
/// run lengths.
pub fn wd_block_weights(degree: usize, seq_length: usize) -> Vec<f64> {
    let d = degree as f64;
    let n = seq_length.max(degree);
    let mut block = Vec::with_capacity(n);
    for r in 0..n {
        let rf = r as f64;
        let w = if r < degree {
            (-rf.powi(3) + (3.0 * d - 3.0) * rf.powi(2) + (9.0 * d - 2.0) * rf + 6.0 * d)
                / (3.0 * d * (d + 1.0))
        } else {
            (-d + 3.0 * rf + 4.0) / 3.0
        };
        block.push(w);
    }
    block
}

fn n_choose_k(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result = result * (n - i) as f64 / (i + 1) as f64;
    }
    result
}
