//! Tensor layout conventions and shape validation.
//!
//! Encoded batches come out of the encoder as `(N, W, C)`. Models trained
//! under different frameworks expect different axis orders:
//!
//! | convention | rank 3 | rank 4 |
//! |---|---|---|
//! | [`TensorConvention::ChannelsLast`] | `(N, W, C)` | `(N, 1, W, C)` |
//! | [`TensorConvention::ChannelsFirst`] | `(N, C, W)` | `(N, C, 1, W)` |
//!
//! Attribution strategies always work in `ChannelsFirst` rank 4. The
//! [`LayoutNormalizer`] is the single place where tensors move between
//! conventions, and [`validate_shape`] is the single place where the
//! channel and height invariants are checked.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayD, Axis, Ix3, IxDyn};
use serde::{Deserialize, Serialize};

use crate::alphabet::SequenceSpace;
use crate::error::{CoreError, Result};

/// Axis order of encoded and importance tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorConvention {
    /// Convention A: `(N, W, C)`, optionally `(N, 1, W, C)`.
    #[serde(rename = "channels-last", alias = "A", alias = "tensorflow")]
    ChannelsLast,
    /// Convention B: `(N, C, 1, W)`, optionally `(N, C, W)`.
    #[serde(rename = "channels-first", alias = "B", alias = "torch")]
    ChannelsFirst,
}

/// Where the channel and height axes live for one `(convention, rank)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLayout {
    /// Index of the alphabet channel axis.
    pub channel_axis: usize,
    /// Index of the singleton height axis, if the rank carries one.
    pub height_axis: Option<usize>,
    /// Index of the sequence position axis.
    pub width_axis: usize,
}

impl TensorConvention {
    /// Axis layout for a tensor of `rank` in this convention.
    ///
    /// Only ranks 3 and 4 exist; anything else is `None`.
    pub const fn axes(&self, rank: usize) -> Option<AxisLayout> {
        match (self, rank) {
            (Self::ChannelsLast, 3) => Some(AxisLayout {
                channel_axis: 2,
                height_axis: None,
                width_axis: 1,
            }),
            (Self::ChannelsLast, 4) => Some(AxisLayout {
                channel_axis: 3,
                height_axis: Some(1),
                width_axis: 2,
            }),
            (Self::ChannelsFirst, 3) => Some(AxisLayout {
                channel_axis: 1,
                height_axis: None,
                width_axis: 2,
            }),
            (Self::ChannelsFirst, 4) => Some(AxisLayout {
                channel_axis: 1,
                height_axis: Some(2),
                width_axis: 3,
            }),
            _ => None,
        }
    }

    /// Rank produced by [`LayoutNormalizer::to_layout`].
    pub const fn native_rank(&self) -> usize {
        match self {
            Self::ChannelsLast => 3,
            Self::ChannelsFirst => 4,
        }
    }

    /// Human readable description of the accepted shapes.
    pub const fn expected_shapes(&self) -> &'static str {
        match self {
            Self::ChannelsLast => "(N, W, C) or (N, 1, W, C)",
            Self::ChannelsFirst => "(N, C, W) or (N, C, 1, W)",
        }
    }
}

impl fmt::Display for TensorConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelsLast => write!(f, "channels-last"),
            Self::ChannelsFirst => write!(f, "channels-first"),
        }
    }
}

impl FromStr for TensorConvention {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "channels-last" | "tensorflow" => Ok(Self::ChannelsLast),
            "b" | "channels-first" | "torch" | "pytorch" => Ok(Self::ChannelsFirst),
            other => Err(CoreError::Configuration(format!(
                "unknown tensor convention '{other}' (expected 'channels-last' or 'channels-first')"
            ))),
        }
    }
}

/// Validate `shape` against the channel and height invariants.
///
/// Accepts rank 3 or 4 only. The channel axis must hold exactly
/// `space.alphabet_size()` entries and the height axis, when present, must be 1.
///
/// # Errors
///
/// [`CoreError::InvalidShape`] naming the expected layout and the actual shape.
pub fn validate_shape(shape: &[usize], space: SequenceSpace, convention: TensorConvention) -> Result<()> {
    let channels = space.alphabet_size();
    let axes = convention.axes(shape.len()).ok_or_else(|| CoreError::InvalidShape {
        expected: format!(
            "rank 3 or 4 tensor {} for {space} sequence space",
            convention.expected_shapes()
        ),
        got: format!("rank {} tensor {shape:?}", shape.len()),
    })?;

    if shape[axes.channel_axis] != channels {
        return Err(CoreError::InvalidShape {
            expected: format!(
                "{channels} channels for {space} sequence space in {}",
                convention.expected_shapes()
            ),
            got: format!(
                "{} channels in shape {shape:?}",
                shape[axes.channel_axis]
            ),
        });
    }

    if let Some(height_axis) = axes.height_axis {
        if shape[height_axis] != 1 {
            return Err(CoreError::InvalidShape {
                expected: format!("height 1 in {}", convention.expected_shapes()),
                got: format!("height {} in shape {shape:?}", shape[height_axis]),
            });
        }
    }

    Ok(())
}

/// Moves encoded and importance tensors between conventions.
pub struct LayoutNormalizer;

impl LayoutNormalizer {
    /// Arrange a canonical `(N, W, C)` batch in `convention`'s native rank.
    ///
    /// `ChannelsLast` stays `(N, W, C)`; `ChannelsFirst` becomes `(N, C, 1, W)`.
    pub fn to_layout(encoded: &Array3<f32>, convention: TensorConvention) -> ArrayD<f32> {
        match convention {
            TensorConvention::ChannelsLast => encoded.clone().into_dyn(),
            TensorConvention::ChannelsFirst => encoded
                .view()
                .permuted_axes([0, 2, 1])
                .insert_axis(Axis(2))
                .as_standard_layout()
                .into_owned()
                .into_dyn(),
        }
    }

    /// Bring a tensor of `convention` (rank 3 or 4) back to `(N, W, C)`.
    ///
    /// Only the axis layout is checked here; channel counts are the job of
    /// [`validate_shape`].
    pub fn from_layout(tensor: &ArrayD<f32>, convention: TensorConvention) -> Result<Array3<f32>> {
        let squeezed = Self::squeeze_height(tensor, convention)?;
        let (channel_axis, width_axis) = match convention {
            TensorConvention::ChannelsLast => (2, 1),
            TensorConvention::ChannelsFirst => (1, 2),
        };
        Ok(squeezed
            .permuted_axes([0, width_axis, channel_axis])
            .as_standard_layout()
            .into_owned())
    }

    /// Re-arrange `tensor` from one convention into the native rank of another.
    pub fn convert(
        tensor: &ArrayD<f32>,
        from: TensorConvention,
        to: TensorConvention,
    ) -> Result<ArrayD<f32>> {
        if from == to && tensor.ndim() == to.native_rank() {
            return Ok(tensor.clone());
        }
        let canonical = Self::from_layout(tensor, from)?;
        Ok(Self::to_layout(&canonical, to))
    }

    /// View a tensor of `convention` as `(N, C, W)` for per-position reductions.
    pub fn channel_major(tensor: &ArrayD<f32>, convention: TensorConvention) -> Result<Array3<f32>> {
        let canonical = Self::from_layout(tensor, convention)?;
        Ok(canonical.permuted_axes([0, 2, 1]).as_standard_layout().into_owned())
    }

    /// Drop the singleton height axis, leaving a rank-3 tensor of `convention`.
    fn squeeze_height(tensor: &ArrayD<f32>, convention: TensorConvention) -> Result<Array3<f32>> {
        let axes = convention.axes(tensor.ndim()).ok_or_else(|| {
            CoreError::shape(
                format!("rank 3 or 4 tensor {}", convention.expected_shapes()),
                tensor.shape(),
            )
        })?;

        let squeezed = match axes.height_axis {
            Some(height_axis) => {
                if tensor.len_of(Axis(height_axis)) != 1 {
                    return Err(CoreError::shape(
                        format!("height 1 in {}", convention.expected_shapes()),
                        tensor.shape(),
                    ));
                }
                tensor.index_axis(Axis(height_axis), 0).to_owned()
            }
            None => tensor.clone(),
        };

        squeezed
            .into_dimensionality::<Ix3>()
            .map_err(|_| CoreError::shape("rank 3 tensor after squeezing height", tensor.shape()))
    }
}

/// Build an `ArrayD` from a flat buffer in standard order.
pub fn array_from_vec(shape: &[usize], values: Vec<f32>) -> Result<ArrayD<f32>> {
    let expected: usize = shape.iter().product();
    if expected != values.len() {
        return Err(CoreError::DataMismatch(format!(
            "{} values cannot fill shape {shape:?}",
            values.len()
        )));
    }
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| CoreError::shape(format!("shape compatible with buffer ({e})"), shape))
}
