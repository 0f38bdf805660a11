//! Byte transport for quarry: conditional metadata requests and streaming
//! artifact downloads over `http(s)://` and `file://`.

pub mod error;
pub mod http_client;
pub mod transport;
