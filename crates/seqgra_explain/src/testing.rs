//! Small hand-built models for strategy tests.

use burn::prelude::*;
use burn::tensor::ops::ConvOptions;
use burn_autodiff::Autodiff;
use seqgra_core::backend::NdArray;
use seqgra_core::{SequenceModel, Stage, StageOp};

pub(crate) type TestBackend = Autodiff<NdArray>;
pub(crate) type TestDevice = <TestBackend as Backend>::Device;

/// A model that is nothing but its stage list.
#[derive(Debug, Clone)]
pub(crate) struct StagedModel {
    pub stages: Vec<Stage<TestBackend>>,
    pub n_classes: usize,
}

impl SequenceModel<TestBackend> for StagedModel {
    fn stages(&self) -> Vec<Stage<TestBackend>> {
        self.stages.clone()
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

pub(crate) fn tensor1(values: Vec<f32>, device: &TestDevice) -> Tensor<TestBackend, 1> {
    let n = values.len();
    Tensor::from_data(TensorData::new(values, [n]), device)
}

pub(crate) fn tensor2(values: Vec<f32>, shape: [usize; 2], device: &TestDevice) -> Tensor<TestBackend, 2> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

pub(crate) fn tensor4(values: Vec<f32>, shape: [usize; 4], device: &TestDevice) -> Tensor<TestBackend, 4> {
    Tensor::from_data(TensorData::new(values, shape), device)
}

pub(crate) fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap()
}

/// Weights `[12, 2]` of the linear model: class 0 weight `0.1 * (i + 1)`,
/// class 1 weight `-0.05 * i`.
pub(crate) fn linear_weights() -> Vec<f32> {
    (0..12)
        .flat_map(|i| [0.1 * (i as f32 + 1.0), -0.05 * i as f32])
        .collect()
}

/// Flatten then a dense layer: `(N, 4, 1, 3)` to 2 logits.
pub(crate) fn linear_model(device: &TestDevice) -> StagedModel {
    StagedModel {
        stages: vec![
            Stage::new("flatten", StageOp::Flatten),
            Stage::new(
                "output",
                StageOp::Linear {
                    weight: tensor2(linear_weights(), [12, 2], device),
                    bias: Some(tensor1(vec![0.5, -0.5], device)),
                },
            ),
        ],
        n_classes: 2,
    }
}

/// Flatten, dense 12 -> 3, ReLU, dense 3 -> 2.
pub(crate) fn relu_model(device: &TestDevice) -> StagedModel {
    let hidden: Vec<f32> = (0..36).map(|i| ((i * 7 % 11) as f32 - 5.0) * 0.1).collect();
    let output = vec![1.0, -0.5, 0.3, 0.8, -0.7, 0.2];
    StagedModel {
        stages: vec![
            Stage::new("flatten", StageOp::Flatten),
            Stage::new(
                "dense1",
                StageOp::Linear {
                    weight: tensor2(hidden, [12, 3], device),
                    bias: Some(tensor1(vec![0.1, -0.2, 0.05], device)),
                },
            ),
            Stage::new("relu1", StageOp::Relu),
            Stage::new(
                "output",
                StageOp::Linear {
                    weight: tensor2(output, [3, 2], device),
                    bias: None,
                },
            ),
        ],
        n_classes: 2,
    }
}

/// Convolution (3 filters, width 3), ReLU, max-pool 4, flatten, dense.
///
/// Input `(N, 4, 1, 16)`; `conv1` keeps 16 positions, `pool1` has 4.
pub(crate) fn conv_model(device: &TestDevice) -> StagedModel {
    let conv: Vec<f32> = (0..36).map(|i| ((i * 5 % 13) as f32 - 4.0) * 0.1).collect();
    let dense: Vec<f32> = (0..24).map(|i| ((i * 3 % 7) as f32 - 2.0) * 0.2).collect();
    StagedModel {
        stages: vec![
            Stage::new(
                "conv1",
                StageOp::Conv2d {
                    weight: tensor4(conv, [3, 4, 1, 3], device),
                    bias: Some(tensor1(vec![0.1, 0.0, -0.1], device)),
                    options: ConvOptions::new([1, 1], [0, 1], [1, 1], 1),
                },
            ),
            Stage::new("relu1", StageOp::Relu),
            Stage::new(
                "pool1",
                StageOp::MaxPool2d {
                    kernel: [1, 4],
                    stride: [1, 4],
                },
            ),
            Stage::new("flatten", StageOp::Flatten),
            Stage::new(
                "output",
                StageOp::Linear {
                    weight: tensor2(dense, [12, 2], device),
                    bias: None,
                },
            ),
        ],
        n_classes: 2,
    }
}

/// One-hot encoded random-looking DNA, `(n, 4, 1, w)`.
pub(crate) fn one_hot_input(n: usize, w: usize, device: &TestDevice) -> Tensor<TestBackend, 4> {
    let mut data = vec![0.0f32; n * 4 * w];
    for e in 0..n {
        for p in 0..w {
            let c = (e * 3 + p * 7 + p / 3) % 4;
            data[(e * 4 + c) * w + p] = 1.0;
        }
    }
    tensor4(data, [n, 4, 1, w], device)
}

/// Integer targets with one label per row.
pub(crate) fn targets(classes: &[usize], n_classes: usize, device: &TestDevice) -> Tensor<TestBackend, 2, Int> {
    let mut data = vec![0i64; classes.len() * n_classes];
    for (i, &c) in classes.iter().enumerate() {
        data[i * n_classes + c] = 1;
    }
    Tensor::from_data(TensorData::new(data, [classes.len(), n_classes]), device)
}
