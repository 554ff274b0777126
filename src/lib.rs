//! Weighted-degree string kernel engine
//!
//! Based on the string-kernel machinery of Sonnenburg, Rätsch and Schäfer,
//! "Large Scale Multiple Kernel Learning", with the row caching scheme of
//! Bordes et al., "Solving MultiClass Support Vector Machines with LaRank"

pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod trie;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, KernelRowCache};
pub use crate::core::error::*;
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::DenseSequenceSet;
pub use crate::kernel::WeightedDegreeKernel;
pub use crate::trie::SubstringTrie;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
