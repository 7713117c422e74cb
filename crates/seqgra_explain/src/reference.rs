//! Reference inputs for path and difference-from-reference methods.

use std::fmt;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use seqgra_core::Seed;

use crate::error::{ExplainError, Result};

/// The "uninformative" input that attributions are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reference {
    /// All zeros.
    Zeros,
    /// `1 / C` on every channel of every position.
    Uniform,
    /// The input with its positions permuted, independently per example.
    Shuffled {
        /// Seed of the permutations.
        seed: Seed,
    },
}

impl Default for Reference {
    fn default() -> Self {
        Self::Zeros
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zeros => write!(f, "zeros"),
            Self::Uniform => write!(f, "uniform"),
            Self::Shuffled { seed } => write!(f, "shuffled(seed={})", seed.value()),
        }
    }
}

impl Reference {
    /// Build the reference for an `(N, C, H, W)` input.
    pub fn build<B: Backend>(&self, input: &Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        match self {
            Self::Zeros => Ok(input.zeros_like()),
            Self::Uniform => {
                let [_, channels, _, _] = input.dims();
                Ok(input.ones_like() / channels as f32)
            }
            Self::Shuffled { seed } => shuffle_positions(input, *seed),
        }
    }
}

fn shuffle_positions<B: Backend>(input: &Tensor<B, 4>, seed: Seed) -> Result<Tensor<B, 4>> {
    let [n, c, h, w] = input.dims();
    let values = input
        .clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::TensorData(format!("{e:?}")))?;

    let mut shuffled = vec![0.0f32; values.len()];
    for example in 0..n {
        let permutation = seed.derive(&format!("example-{example}")).permutation(w);
        for row in 0..c * h {
            let base = (example * c * h + row) * w;
            for (target, &source) in permutation.iter().enumerate() {
                shuffled[base + target] = values[base + source];
            }
        }
    }

    Ok(Tensor::from_data(TensorData::new(shuffled, [n, c, h, w]), &input.device()))
}
