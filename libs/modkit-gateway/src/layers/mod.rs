//! Tower layers for the hyper transport
//!
//! - [`DefaultHeadersLayer`] - Fills in JSON `Accept`/`Content-Type` and `User-Agent`

mod default_headers;

pub use default_headers::{
    DEFAULT_ACCEPT, DEFAULT_CONTENT_TYPE, DefaultHeadersLayer, DefaultHeadersService,
};
