use ndarray::{s, Array2, ArrayView1, ArrayViewD, Axis, Ix2};
use crate::common::OutputLayout;
use crate::error::DetectError;
use crate::Result;

/// Detector output with one row per anchor: `[cx, cy, w, h, score_0 .. score_{n-1}]`.
///
/// All access is bounds-checked, a row or class slice that does not exist comes back as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor(Array2<f32>);

impl RawTensor {
    pub fn new(rows: Array2<f32>) -> Self {
        Self(rows)
    }

    /// Builds a tensor from a flat row-major buffer.
    pub fn from_shape_vec(rows: usize, dimensions: usize, data: Vec<f32>) -> Result<Self> {
        let actual = data.len();
        Array2::from_shape_vec((rows, dimensions), data)
            .map(Self)
            .map_err(|_| DetectError::DimensionMismatch { expected: rows * dimensions, actual })
    }

    /// Normalizes a native model output into anchor rows.
    ///
    /// Accepts `[1, a, b]` or `[a, b]`. With `FeaturesFirst` the two remaining axes are swapped.
    pub fn from_model_output(output: ArrayViewD<'_, f32>, layout: OutputLayout) -> Result<Self> {
        let shape = output.shape().to_vec();
        let plane = match shape.len() {
            3 if shape[0] == 1 => output.index_axis_move(Axis(0), 0),
            2 => output,
            _ => {
                return Err(DetectError::Inference(format!(
                    "unsupported output shape {:?}, expected [1, rows, cols]", shape
                )))
            }
        };
        let plane = plane
            .into_dimensionality::<Ix2>()
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let rows = match layout {
            OutputLayout::FeaturesFirst => plane.t().as_standard_layout().into_owned(),
            OutputLayout::AnchorsFirst => plane.as_standard_layout().into_owned(),
        };
        Ok(Self(rows))
    }

    /// Number of anchor rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Values per anchor row, `4 + number of classes` for a well-formed tensor.
    pub fn dimensions(&self) -> usize {
        self.0.ncols()
    }

    pub fn num_classes(&self) -> usize {
        self.dimensions().saturating_sub(4)
    }

    /// `[cx, cy, w, h]` of `row`.
    pub fn bbox(&self, row: usize) -> Option<[f32; 4]> {
        if row >= self.rows() || self.dimensions() < 4 {
            return None;
        }
        let b = self.0.slice(s![row, 0..4]);
        Some([b[0], b[1], b[2], b[3]])
    }

    /// The first `num_classes` class scores of `row`.
    pub fn class_scores(&self, row: usize, num_classes: usize) -> Option<ArrayView1<'_, f32>> {
        if row >= self.rows() || self.dimensions() < 4 + num_classes {
            return None;
        }
        Some(self.0.slice(s![row, 4..4 + num_classes]))
    }

    /// Fails unless each row holds exactly four box values plus `num_classes` scores.
    pub fn validate_classes(&self, num_classes: usize) -> Result<()> {
        let expected = 4 + num_classes;
        if self.dimensions() != expected {
            return Err(DetectError::DimensionMismatch { expected, actual: self.dimensions() });
        }
        Ok(())
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn features_first_is_transposed() {
        // two anchors, 4 + 2 features: [1, 6, 2]
        let native = Array3::from_shape_vec(
            (1, 6, 2),
            vec![0.1, 0.6, 0.2, 0.7, 0.3, 0.8, 0.4, 0.9, 0.5, 0.0, 0.05, 0.95],
        ).unwrap();
        let t = RawTensor::from_model_output(native.view().into_dyn(), OutputLayout::FeaturesFirst).unwrap();
        assert_eq!((t.rows(), t.dimensions()), (2, 6));
        assert_eq!(t.bbox(1), Some([0.6, 0.7, 0.8, 0.9]));
        assert_eq!(t.class_scores(1, 2).unwrap().to_vec(), vec![0.0, 0.95]);
    }

    #[test]
    fn anchors_first_is_kept() {
        let native = Array3::from_shape_vec((1, 1, 6), vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1]).unwrap();
        let t = RawTensor::from_model_output(native.view().into_dyn(), OutputLayout::AnchorsFirst).unwrap();
        assert_eq!(t.bbox(0), Some([0.5, 0.5, 0.2, 0.2]));
        assert!(t.validate_classes(2).is_ok());
    }

    #[test]
    fn batched_output_is_rejected() {
        let native = Array3::<f32>::zeros((2, 6, 4));
        let err = RawTensor::from_model_output(native.view().into_dyn(), OutputLayout::FeaturesFirst);
        assert!(matches!(err, Err(DetectError::Inference(_))));
    }

    #[test]
    fn out_of_range_reads_are_none() {
        let t = RawTensor::from_shape_vec(1, 6, vec![0.0; 6]).unwrap();
        assert!(t.bbox(1).is_none());
        assert!(t.class_scores(0, 3).is_none());
        assert!(matches!(
            t.validate_classes(80),
            Err(DetectError::DimensionMismatch { expected: 84, actual: 6 })
        ));
    }

    #[test]
    fn short_buffer_is_a_dimension_mismatch() {
        let err = RawTensor::from_shape_vec(2, 6, vec![0.0; 7]);
        assert!(matches!(err, Err(DetectError::DimensionMismatch { expected: 12, actual: 7 })));
    }
}
