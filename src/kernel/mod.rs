//! String kernel implementations

pub mod weighted_degree;

pub use self::weighted_degree::*;
