pub mod centroid_estimator;
pub mod estimator_factory;
