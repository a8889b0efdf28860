//! Network facing adapters: the HTTP client, the time source and the probe strategies.

pub mod http;
pub mod probe_client;
pub mod time_source;
