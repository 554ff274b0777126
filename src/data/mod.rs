//! Sequence data loading
//!
//! Implementations of the SequenceSet trait plus loaders for the
//! line-oriented formats the command-line tool reads.

pub mod dense;

pub use self::dense::*;
