//! Core traits for the string kernel engine

/// Kernel function evaluated by example index
///
/// The Gram matrix entry k(i, j) over a fixed example set. Implementations
/// must be symmetric (k(i, j) == k(j, i)) and pure: the row cache calls this
/// on misses and relies on repeated evaluations returning the same value.
/// Implementations must not call back into a cache that queries them.
pub trait KernelFunction: Send + Sync {
    /// Compute the Gram matrix entry k(i, j)
    fn compute(&self, i: usize, j: usize) -> f64;
}

/// Access to a set of encoded sequences with labels
///
/// Sequences are dense symbol indices in `[0, alphabet_size)`. Borrowing a
/// sequence slice replaces the acquire/release pair a feature-vector store
/// would otherwise need.
pub trait SequenceSet: Send + Sync {
    /// Number of sequences in the set
    fn len(&self) -> usize;

    /// Check if the set is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the encoded sequence at index `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    fn sequence(&self, i: usize) -> &[u8];

    /// Get the label of the sequence at index `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    fn label(&self, i: usize) -> f64;

    /// Number of symbols in the alphabet the sequences are encoded over
    fn alphabet_size(&self) -> usize;

    /// Length of the longest sequence in the set
    fn max_len(&self) -> usize;
}
