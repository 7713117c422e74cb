//! Activation capture during a forward pass.

use std::collections::HashMap;

use burn::prelude::*;

use seqgra_core::{Activation, Stage};

use crate::error::Result;

/// Inputs and outputs of every stage of one forward pass, by stage name.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    inputs: HashMap<String, Activation<B>>,
    outputs: HashMap<String, Activation<B>>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    /// Run `stages` on `input`, storing what goes in and out of each stage.
    ///
    /// Returns the capture and the final activation.
    pub fn record(stages: &[Stage<B>], input: Activation<B>) -> Result<(Self, Activation<B>)> {
        let mut capture = Self::new();
        let mut activation = input;
        for stage in stages {
            capture.inputs.insert(stage.name.clone(), activation.clone());
            activation = stage.op.apply(activation)?;
            capture.outputs.insert(stage.name.clone(), activation.clone());
        }
        Ok((capture, activation))
    }

    /// Activation entering stage `name`.
    pub fn input(&self, name: &str) -> Option<&Activation<B>> {
        self.inputs.get(name)
    }

    /// Activation leaving stage `name`.
    pub fn output(&self, name: &str) -> Option<&Activation<B>> {
        self.outputs.get(name)
    }

    /// Get all stage names.
    pub fn names(&self) -> Vec<&str> {
        self.outputs.keys().map(|s| s.as_str()).collect()
    }

    /// Clear all stored activations.
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}

impl<B: Backend> Default for ActivationCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}
