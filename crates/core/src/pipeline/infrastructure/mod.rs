pub mod process_pool_executor;
pub mod sequential_executor;
pub mod thread_pool_executor;
