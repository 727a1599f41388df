pub mod archive_sink;
pub mod chunked_store;
pub mod csv_sink;
pub mod npy_sink;
pub mod safetensors_sink;
pub mod sink_factory;
