//! Sequence alphabets and one-hot encoding.
//!
//! Encoded batches are always produced in the canonical `(N, W, C)` order:
//! example, position, alphabet channel. Conversion to a model's own tensor
//! convention happens in [`crate::layout`].

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

const DNA_ALPHABET: &str = "ACGT";
const PROTEIN_ALPHABET: &str = "ACDEFGHIKLMNPQRSTVWY";

/// The sequence space a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceSpace {
    /// Nucleotides, 4 channels.
    #[serde(rename = "DNA", alias = "dna")]
    Dna,
    /// Amino acids, 20 channels.
    #[serde(rename = "protein", alias = "Protein")]
    Protein,
}

impl SequenceSpace {
    /// Symbols of the alphabet in channel order.
    pub const fn alphabet(&self) -> &'static str {
        match self {
            Self::Dna => DNA_ALPHABET,
            Self::Protein => PROTEIN_ALPHABET,
        }
    }

    /// Number of channels in an encoded tensor.
    pub const fn alphabet_size(&self) -> usize {
        match self {
            Self::Dna => 4,
            Self::Protein => 20,
        }
    }

    /// Channel index of `symbol`, case-insensitive.
    pub fn channel(&self, symbol: char) -> Option<usize> {
        let upper = symbol.to_ascii_uppercase();
        self.alphabet().chars().position(|c| c == upper)
    }

    /// Check that every symbol of `sequence` belongs to the alphabet.
    pub fn check_sequence(&self, sequence: &str) -> Result<()> {
        match sequence.chars().find(|c| self.channel(*c).is_none()) {
            Some(bad) => Err(CoreError::InvalidSequence(format!(
                "symbol '{bad}' is not part of the {self} alphabet ({})",
                self.alphabet()
            ))),
            None => Ok(()),
        }
    }

    /// One-hot encode a single sequence as `(W, C)`.
    pub fn encode(&self, sequence: &str) -> Result<Array2<f32>> {
        let width = sequence.chars().count();
        let mut encoded = Array2::<f32>::zeros((width, self.alphabet_size()));
        for (position, symbol) in sequence.chars().enumerate() {
            let channel = self.channel(symbol).ok_or_else(|| {
                CoreError::InvalidSequence(format!(
                    "symbol '{symbol}' at position {} is not part of the {self} alphabet",
                    position + 1
                ))
            })?;
            encoded[[position, channel]] = 1.0;
        }
        Ok(encoded)
    }

    /// One-hot encode a batch of equal-length sequences as `(N, W, C)`.
    ///
    /// # Errors
    ///
    /// [`CoreError::DataMismatch`] when the sequences differ in length,
    /// [`CoreError::InvalidSequence`] for symbols outside the alphabet.
    pub fn encode_batch<S: AsRef<str>>(&self, sequences: &[S]) -> Result<Array3<f32>> {
        let width = sequences
            .first()
            .map(|s| s.as_ref().chars().count())
            .unwrap_or(0);
        let mut batch = Array3::<f32>::zeros((sequences.len(), width, self.alphabet_size()));

        for (i, sequence) in sequences.iter().enumerate() {
            let encoded = self.encode(sequence.as_ref())?;
            if encoded.nrows() != width {
                return Err(CoreError::DataMismatch(format!(
                    "sequence {i} has length {}, expected {width}",
                    encoded.nrows()
                )));
            }
            batch.index_axis_mut(Axis(0), i).assign(&encoded);
        }
        Ok(batch)
    }
}

impl fmt::Display for SequenceSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dna => write!(f, "DNA"),
            Self::Protein => write!(f, "protein"),
        }
    }
}

impl FromStr for SequenceSpace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dna" => Ok(Self::Dna),
            "protein" => Ok(Self::Protein),
            other => Err(CoreError::Configuration(format!(
                "unknown sequence space '{other}' (expected 'DNA' or 'protein')"
            ))),
        }
    }
}
