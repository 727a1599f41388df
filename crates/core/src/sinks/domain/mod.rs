pub mod category_buffers;
pub mod collector_sink;
