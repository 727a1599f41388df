use ndarray::Array2;

use crate::shared::landmarks::{CategorySpec, FrameRecord};
use crate::sinks::domain::collector_sink::SinkError;

/// One growable row-major buffer per category, filled frame by frame.
///
/// Backs every sink that writes its output whole at finalize (flat arrays,
/// archives, tensor bundles). Each frame appends `values_per_frame` scalars
/// per category; `array` reshapes a category's buffer to
/// `(frames, keypoints * coords)`.
pub struct CategoryBuffers {
    categories: Vec<CategorySpec>,
    buffers: Vec<Vec<f64>>,
    frames: usize,
}

impl CategoryBuffers {
    pub fn new(categories: &[CategorySpec]) -> Self {
        Self {
            categories: categories.to_vec(),
            buffers: categories.iter().map(|_| Vec::new()).collect(),
            frames: 0,
        }
    }

    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Appends one frame's values for every category.
    pub fn push(&mut self, record: &FrameRecord) -> Result<(), SinkError> {
        for (cat, buffer) in self.categories.iter().zip(&mut self.buffers) {
            let arr = record
                .landmarks
                .get(&cat.name)
                .ok_or_else(|| SinkError::Encode(format!("missing category '{}'", cat.name)))?;
            if arr.len() != cat.values_per_frame() {
                return Err(SinkError::Encode(format!(
                    "category '{}' carries {} values, expected {}",
                    cat.name,
                    arr.len(),
                    cat.values_per_frame()
                )));
            }
            buffer.extend(arr.iter().copied());
        }
        self.frames += 1;
        Ok(())
    }

    /// The full accumulated array for category `i`, shaped
    /// `(frames, values_per_frame)`.
    pub fn array(&self, i: usize) -> Result<Array2<f64>, SinkError> {
        let cat = &self.categories[i];
        Array2::from_shape_vec(
            (self.frames, cat.values_per_frame()),
            self.buffers[i].clone(),
        )
        .map_err(|e| SinkError::Encode(e.to_string()))
    }

    /// Raw little-endian bytes of category `i`'s buffer.
    pub fn le_bytes(&self, i: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.buffers[i].len() * 8);
        for v in &self.buffers[i] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}
