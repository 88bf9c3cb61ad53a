pub mod compute_provider;
pub mod stream_provider;
