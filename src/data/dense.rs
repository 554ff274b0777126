//! Dense equal-length sequence sets
//!
//! Loads labeled string data in a line-oriented format:
//! label sequence
//!
//! Example:
//! +1 GATTACA
//! -1 CATTACA
//!
//! The label may be omitted, in which case +1 is assumed. Lines starting
//! with '#' and blank lines are skipped.

use crate::core::{Alphabet, Result, SequenceSet, StringKernelError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Equal-length encoded sequences with labels
///
/// Sequences are stored as alphabet ranks (see [`Alphabet::encode`]); every
/// sequence has the same length, which the weighted-degree kernel requires.
#[derive(Debug, Clone)]
pub struct DenseSequenceSet {
    sequences: Vec<Vec<u8>>,
    labels: Vec<f64>,
    alphabet_size: usize,
    seq_length: usize,
}

impl DenseSequenceSet {
    /// Build a set from already-encoded sequences
    ///
    /// # Arguments
    /// * `sequences` - encoded sequences, all of the same nonzero length
    /// * `labels` - one label per sequence
    /// * `alphabet_size` - exclusive upper bound on the encoded symbols
    pub fn new(sequences: Vec<Vec<u8>>, labels: Vec<f64>, alphabet_size: usize) -> Result<Self> {
        if sequences.is_empty() {
            return Err(StringKernelError::EmptySequenceSet);
        }
        if sequences.len() != labels.len() {
            return Err(StringKernelError::DimensionMismatch {
                expected: sequences.len(),
                actual: labels.len(),
            });
        }
        let seq_length = sequences[0].len();
        if seq_length == 0 {
            return Err(StringKernelError::InvalidParameter(
                "sequences must be non-empty".to_string(),
            ));
        }
        for (i, seq) in sequences.iter().enumerate() {
            if seq.len() != seq_length {
                return Err(StringKernelError::DimensionMismatch {
                    expected: seq_length,
                    actual: seq.len(),
                });
            }
            for &s in seq {
                if s as usize >= alphabet_size {
                    return Err(StringKernelError::InvalidParameter(format!(
                        "sequence {} holds symbol {} outside the alphabet",
                        i, s
                    )));
                }
            }
        }
        Ok(Self {
            sequences,
            labels,
            alphabet_size,
            seq_length,
        })
    }

    /// Encode raw strings through an alphabet
    pub fn from_strings(strings: &[&str], labels: &[f64], alphabet: &Alphabet) -> Result<Self> {
        let sequences = strings
            .iter()
            .map(|s| alphabet.encode(s))
            .collect::<Result<Vec<_>>>()?;
        Self::new(sequences, labels.to_vec(), alphabet.size())
    }

    /// Load a sequence set from a file
    pub fn from_file<P: AsRef<Path>>(path: P, alphabet: &Alphabet) -> Result<Self> {
        let file = File::open(path).map_err(StringKernelError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader, alphabet)
    }

    /// Load a sequence set from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R, alphabet: &Alphabet) -> Result<Self> {
        let mut sequences = Vec::new();
        let mut labels = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(StringKernelError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match Self::parse_line(line, alphabet) {
                Ok((label, seq)) => {
                    labels.push(label);
                    sequences.push(seq);
                }
                Err(e) => {
                    return Err(StringKernelError::ParseError(format!(
                        "Error parsing line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }

        if sequences.is_empty() {
            return Err(StringKernelError::EmptySequenceSet);
        }

        Self::new(sequences, labels, alphabet.size())
    }

    /// Parse a single "label sequence" or bare "sequence" line
    fn parse_line(line: &str, alphabet: &Alphabet) -> Result<(f64, Vec<u8>)> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        let (label, seq_str) = match parts.len() {
            1 => (1.0, parts[0]),
            2 => {
                let label = parts[0].parse::<f64>().map_err(|_| {
                    StringKernelError::ParseError(format!("Invalid label: {}", parts[0]))
                })?;
                (label, parts[1])
            }
            n => {
                return Err(StringKernelError::ParseError(format!(
                    "Expected 'label sequence', found {} fields",
                    n
                )));
            }
        };

        // Collapse to binary labels
        let label = if label > 0.0 { 1.0 } else { -1.0 };

        let seq = alphabet.encode(seq_str)?;
        Ok((label, seq))
    }

    /// All labels in example order
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }
}

impl SequenceSet for DenseSequenceSet {
    fn len(&self) -> usize {
        self.sequences.len()
    }

    fn sequence(&self, i: usize) -> &[u8] {
        assert!(i < self.sequences.len(), "sequence index {} out of range", i);
        &self.sequences[i]
    }

    fn label(&self, i: usize) -> f64 {
        assert!(i < self.labels.len(), "label index {} out of range", i);
        self.labels[i]
    }

    fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    fn max_len(&self) -> usize {
        self.seq_length
    }
}

/// Load support coefficients from a file of "index weight" lines
///
/// Lines starting with '#' and blank lines are skipped. Returns the
/// (index, weight) pairs in file order.
pub fn load_support_weights<P: AsRef<Path>>(path: P) -> Result<Vec<(usize, f64)>> {
    let file = File::open(path).map_err(StringKernelError::IoError)?;
    support_weights_from_reader(BufReader::new(file))
}

/// Parse support coefficients from a reader
pub fn support_weights_from_reader<R: BufRead>(reader: R) -> Result<Vec<(usize, f64)>> {
    let mut weights = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(StringKernelError::IoError)?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(StringKernelError::ParseError(format!(
                "Error parsing line {}: expected 'index weight'",
                line_num + 1
            )));
        }
        let index = parts[0].parse::<usize>().map_err(|_| {
            StringKernelError::ParseError(format!(
                "Error parsing line {}: invalid index: {}",
                line_num + 1,
                parts[0]
            ))
        })?;
        let weight = parts[1].parse::<f64>().map_err(|_| {
            StringKernelError::ParseError(format!(
                "Error parsing line {}: invalid weight: {}",
                line_num + 1,
                parts[1]
            ))
        })?;
        weights.push((index, weight));
    }

    Ok(weights)
}
