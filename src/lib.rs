//! Declarative REST API clients assembled from operation metadata.
//!
//! Describe an API once as a group of named operations - verb, path
//! template, query/header/form/multipart/body bindings, status handlers,
//! timeouts, endpoint, backend - and invoke it through a synthesized
//! client. Network I/O is delegated to one of two interchangeable
//! backends: [`ureq`] (synchronous, the default) or [`reqwest`]
//! (synchronous and asynchronous).
//!
//! ## Examples
//!
//! ```rust,no_run
//! use declarest::{Api, Client, Operation};
//!
//! let dogs = Api::builder("dog_ceo")
//!     .endpoint("https://dog.ceo/api")
//!     .operation(Operation::get("list_subbreeds", "breed/{name}/list").query("limit"))
//!     .build()?;
//!
//! let client = Client::new(&dogs);
//! let subbreeds = client
//!     .invoke("list_subbreeds")
//!     .arg("name", "hound")
//!     .arg("limit", 5)
//!     .send()?;
//! # Ok::<(), declarest::Error>(())
//! ```
//!
//! Groups compose: one client can merge several independently declared
//! groups, each keeping its own endpoint, and override any declared
//! aspect per instance or per call.

pub mod api;
pub mod args;
pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod method;
pub mod request;
pub mod response;
pub mod session;

mod metadata;
mod resolve;

pub use api::{Api, ApiBuilder, Operation};
pub use args::ArgValue;
pub use auth::Auth;
pub use backend::BackendKind;
pub use client::{Call, Client, ClientBuilder};
pub use error::{ConfigError, Error, HttpError, TransportError};
pub use metadata::{OperationSpec, StatusRule};
pub use method::HttpMethod;
pub use request::{Body, Part, Payload, RequestDescriptor};
pub use response::{Response, ResponseValue};
pub use session::{AsyncSession, BackendSession, Session};
