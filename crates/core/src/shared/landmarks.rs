use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Engine-declared shape of one landmark category.
///
/// Every frame of a job contributes one `keypoints x coords` array per
/// category; the frame dimension is appended by the sinks, never by the
/// estimation engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub keypoints: usize,
    pub coords: usize,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, keypoints: usize, coords: usize) -> Self {
        Self {
            name: name.into(),
            keypoints,
            coords,
        }
    }

    /// Number of scalar values one frame contributes to this category.
    pub fn values_per_frame(&self) -> usize {
        self.keypoints * self.coords
    }
}

/// One frame's estimation result: the frame index plus one array per
/// category, keyed by category name.
///
/// `BTreeMap` keeps category iteration order deterministic, which makes
/// every artifact byte-stable across runs and executor strategies.
/// Frames recorded as missing data carry all-NaN arrays of the declared
/// shape, so sinks never see a gap in the index sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub index: usize,
    pub landmarks: BTreeMap<String, Array2<f64>>,
}

impl FrameRecord {
    pub fn new(index: usize, landmarks: BTreeMap<String, Array2<f64>>) -> Self {
        Self { index, landmarks }
    }

    /// Builds a missing-data record: all-NaN arrays of each category's
    /// declared shape.
    pub fn missing(index: usize, categories: &[CategorySpec]) -> Self {
        let landmarks = categories
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    Array2::from_elem((c.keypoints, c.coords), f64::NAN),
                )
            })
            .collect();
        Self { index, landmarks }
    }

    /// True if every value in every category is NaN.
    pub fn is_missing(&self) -> bool {
        self.landmarks
            .values()
            .all(|arr| arr.iter().all(|v| v.is_nan()))
    }
}

/// Per-job context handed to every sink at open time.
#[derive(Clone, Debug)]
pub struct JobMetadata {
    pub source: PathBuf,
    pub stem: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count probed at open. The authoritative processed count is
    /// what each sink observed by finalize time.
    pub frame_count: usize,
    pub categories: Vec<CategorySpec>,
}

impl JobMetadata {
    pub fn category(&self, name: &str) -> Option<&CategorySpec> {
        self.categories.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_a() -> CategorySpec {
        CategorySpec::new("pointA", 1, 2)
    }

    #[test]
    fn test_values_per_frame() {
        assert_eq!(point_a().values_per_frame(), 2);
        assert_eq!(CategorySpec::new("body", 17, 3).values_per_frame(), 51);
    }

    #[test]
    fn test_missing_record_is_all_nan() {
        let record = FrameRecord::missing(4, &[point_a()]);
        assert_eq!(record.index, 4);
        assert!(record.is_missing());
        let arr = &record.landmarks["pointA"];
        assert_eq!(arr.shape(), &[1, 2]);
        assert!(arr.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_detected_record_is_not_missing() {
        let mut landmarks = BTreeMap::new();
        landmarks.insert(
            "pointA".to_string(),
            Array2::from_shape_vec((1, 2), vec![3.0, 4.0]).unwrap(),
        );
        let record = FrameRecord::new(0, landmarks);
        assert!(!record.is_missing());
    }

    #[test]
    fn test_category_lookup() {
        let meta = JobMetadata {
            source: PathBuf::from("/tmp/a.mp4"),
            stem: "a".to_string(),
            width: 100,
            height: 100,
            fps: 30.0,
            frame_count: 10,
            categories: vec![point_a()],
        };
        assert!(meta.category("pointA").is_some());
        assert!(meta.category("pointB").is_none());
    }

    #[test]
    fn test_category_spec_serde_roundtrip() {
        let spec = point_a();
        let json = serde_json::to_string(&spec).unwrap();
        let back: CategorySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
