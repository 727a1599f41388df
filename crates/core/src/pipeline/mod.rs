pub mod extract_landmarks_use_case;
pub mod infrastructure;
pub mod job_executor;
pub mod report;
pub mod run_spec;
