use std::collections::BTreeMap;

use ndarray::Array2;

use crate::estimation::domain::landmark_estimator::{
    EstimatorError, FrameEstimate, LandmarkEstimator,
};
use crate::shared::frame::Frame;
use crate::shared::landmarks::CategorySpec;

/// Built-in estimator: luma-weighted centroid of the bright pixels in each
/// frame, reported as a single keypoint with (x, y) coordinates.
///
/// Serves as the default engine for the CLI and the end-to-end tests; real
/// detection engines plug in behind [`LandmarkEstimator`] the same way.
pub struct CentroidEstimator {
    categories: Vec<CategorySpec>,
    min_luma: f64,
}

impl CentroidEstimator {
    pub fn new(category: impl Into<String>, min_luma: f64) -> Self {
        Self {
            categories: vec![CategorySpec::new(category, 1, 2)],
            min_luma,
        }
    }
}

impl LandmarkEstimator for CentroidEstimator {
    fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    fn estimate(&mut self, frame: &Frame) -> Result<FrameEstimate, EstimatorError> {
        let arr = frame.as_ndarray();
        let mut weight_sum = 0.0_f64;
        let mut x_sum = 0.0_f64;
        let mut y_sum = 0.0_f64;

        for y in 0..arr.shape()[0] {
            for x in 0..arr.shape()[1] {
                let luma = 0.299 * f64::from(arr[[y, x, 0]])
                    + 0.587 * f64::from(arr[[y, x, 1]])
                    + 0.114 * f64::from(arr[[y, x, 2]]);
                if luma >= self.min_luma {
                    weight_sum += luma;
                    x_sum += luma * x as f64;
                    y_sum += luma * y as f64;
                }
            }
        }

        if weight_sum == 0.0 {
            return Ok(FrameEstimate::Missing);
        }

        let centroid = Array2::from_shape_vec(
            (1, 2),
            vec![x_sum / weight_sum, y_sum / weight_sum],
        )
        .map_err(|e| EstimatorError::Fatal(e.to_string()))?;

        let mut landmarks = BTreeMap::new();
        landmarks.insert(self.categories[0].name.clone(), centroid);
        Ok(FrameEstimate::Detected(landmarks))
    }
}
