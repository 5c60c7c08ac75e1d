pub mod gcp;
pub mod http;
