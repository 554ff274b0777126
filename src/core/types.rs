//! Core type definitions for the string kernel engine

use crate::core::{Result, StringKernelError};

/// Symbol alphabet mapping raw characters to dense indices
///
/// String kernels and the substring trie operate on sequences encoded as
/// dense symbol indices in `[0, size)`. An `Alphabet` owns that mapping and
/// validates input text against it. Encoding is case-insensitive.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<u8>,
    remap: [u8; 256],
}

const NO_SYMBOL: u8 = u8::MAX;

impl Alphabet {
    /// Create an alphabet from its symbol list
    ///
    /// # Arguments
    /// * `symbols` - distinct ASCII symbols; their order defines the encoding
    pub fn new(symbols: &[u8]) -> Result<Self> {
        if symbols.is_empty() {
            return Err(StringKernelError::InvalidParameter(
                "alphabet must contain at least one symbol".to_string(),
            ));
        }
        if symbols.len() >= NO_SYMBOL as usize {
            return Err(StringKernelError::InvalidParameter(format!(
                "alphabet too large: {} symbols",
                symbols.len()
            )));
        }

        let mut remap = [NO_SYMBOL; 256];
        for (idx, &sym) in symbols.iter().enumerate() {
            for case in [sym.to_ascii_lowercase(), sym.to_ascii_uppercase()] {
                if remap[case as usize] != NO_SYMBOL && remap[case as usize] != idx as u8 {
                    return Err(StringKernelError::InvalidParameter(format!(
                        "duplicate alphabet symbol '{}'",
                        case as char
                    )));
                }
                remap[case as usize] = idx as u8;
            }
        }

        Ok(Self {
            symbols: symbols.to_vec(),
            remap,
        })
    }

    /// The DNA alphabet (A, C, G, T)
    pub fn dna() -> Self {
        // Four distinct letters, construction cannot fail
        Self::new(b"ACGT").unwrap()
    }

    /// Number of symbols
    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// Encode raw text into dense symbol indices
    pub fn encode(&self, raw: &str) -> Result<Vec<u8>> {
        raw.bytes()
            .enumerate()
            .map(|(position, b)| {
                let code = self.remap[b as usize];
                if code == NO_SYMBOL {
                    Err(StringKernelError::InvalidSymbol {
                        symbol: b as char,
                        position,
                    })
                } else {
                    Ok(code)
                }
            })
            .collect()
    }

    /// Decode dense symbol indices back to text
    ///
    /// # Panics
    /// Panics if any index is outside the alphabet
    pub fn decode(&self, encoded: &[u8]) -> String {
        encoded
            .iter()
            .map(|&c| {
                assert!(
                    (c as usize) < self.symbols.len(),
                    "symbol index {} outside alphabet of size {}",
                    c,
                    self.symbols.len()
                );
                self.symbols[c as usize] as char
            })
            .collect()
    }
}
