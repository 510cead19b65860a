//! `echox` is a thin HTTP client wrapper built around an interceptor
//! pipeline: an ordered, keyed chain of request/response transformation and
//! recovery hooks wired around a single transport call, with configuration
//! deep-merging, content-aware response decoding and uniform errors.
//!
//! # Quick Start
//!
//! ```no_run
//! use echox::prelude::{Echo, EchoConfig, Interceptor};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Echo::builder()
//!         .base_url("https://api.example.com/v1")
//!         .default_header("Accept", "application/json")
//!         .try_build()?;
//!
//!     client.interceptors().request().use_interceptor(
//!         "auth",
//!         Interceptor::new().on_fulfilled(|config: EchoConfig| async move {
//!             Ok(config.header("Authorization", "Bearer token"))
//!         }),
//!     );
//!
//!     let item: Item = client
//!         .get("/items/1", EchoConfig::default())
//!         .await?
//!         .json()?;
//!
//!     println!("fetched id={}", item.id);
//!     Ok(())
//! }
//! ```
//!
//! # Interceptors
//!
//! Each client owns two independent, insertion-ordered hook chains: one
//! for the request phase, one for the response phase. A fulfilled hook
//! transforms the phase's value; a rejected hook sees the phase's failure
//! and either recovers (first recovery wins, the rest of the chain is
//! skipped) or passes the failure on. A rejection chain that runs dry
//! returns the failure to the caller.

mod body;
mod client;
mod config;
mod decode;
mod error;
mod interceptor;
mod merge;
mod request;
mod response;
mod transport;
mod util;

pub use crate::body::{Blob, EchoBody, FormBody, FormPart, RequestBody};
pub use crate::client::{Echo, EchoBuilder};
pub use crate::config::{EchoConfig, ResponseType};
pub use crate::error::{
    BoxError, EchoError, EchoErrorCode, TransportErrorKind, TransportFailure, is_echo_error,
};
pub use crate::interceptor::{Interceptor, InterceptorSet, Interceptors, Recovery};
pub use crate::merge::{deep_merge, merge_configs};
pub use crate::request::EchoRequest;
pub use crate::response::{EchoResponse, ResponseData};
pub use crate::transport::{ByteStream, HyperTransport, RawBody, RawResponse, Transport};

pub type EchoResult<T> = std::result::Result<T, EchoError>;

pub mod prelude {
    pub use crate::{
        Blob, Echo, EchoBody, EchoConfig, EchoError, EchoErrorCode, EchoRequest, EchoResponse,
        EchoResult, FormBody, HyperTransport, Interceptor, RawBody, RawResponse, Recovery,
        ResponseData, ResponseType, Transport, TransportErrorKind, TransportFailure,
    };
}
