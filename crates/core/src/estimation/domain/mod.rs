pub mod landmark_estimator;
