use serde::{Deserialize, Serialize};

/// How the detector lays out its single output tensor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `[1, 4 + nc, anchors]`, as exported by YOLOv8 and later. Transposed on read.
    #[default]
    FeaturesFirst,
    /// `[1, anchors, 4 + nc]`, already one row per anchor.
    AnchorsFirst,
}

impl OutputLayout {
    /// Index of the axis holding per-anchor values once the batch axis is dropped.
    pub fn feature_axis(&self) -> usize {
        match self {
            OutputLayout::FeaturesFirst => 0,
            OutputLayout::AnchorsFirst => 1,
        }
    }
}

/// Units of the `cx, cy, w, h` values in each anchor row.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
    /// Fractions of the network input, in `[0, 1]`.
    #[default]
    Normalized,
    /// Pixels of the network input, e.g. `0..640`.
    InputPixels,
}

impl BoxUnits {
    /// Divisors that bring raw box values to fractions of the input.
    pub fn basis(&self, input_shape: (u32, u32)) -> (f32, f32) {
        match self {
            BoxUnits::Normalized => (1.0, 1.0),
            BoxUnits::InputPixels => (input_shape.0.max(1) as f32, input_shape.1.max(1) as f32),
        }
    }
}
