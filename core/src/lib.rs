//! Base abstraction for building REST-style API clients.
//!
//! # Overview
//! The crate defines how a connection is opened, how authentication layers
//! on top of it, how responses classify into success, tolerated failure and
//! raised failure, and how the transport is released on every exit path.
//!
//! # Design
//! - [`ApiClient`] is the contract: the four lifecycle operations plus the
//!   body-decode hook, with classification and scoped acquisition provided.
//! - [`Session`] guards an authenticated client; dropping it deauthenticates
//!   (best effort) and unconditionally closes the transport.
//! - [`HttpApiClient`] concretizes the contract with a persistent blocking
//!   HTTP session, default headers and JSON on both sides of the wire.
//!   Authenticated services wrap it and supply their own `login`/`logout`.
//! - The core never retries; cleanup is the only automatic recovery.

pub mod client;
pub mod error;
pub mod host;
pub mod http;
pub mod session;

pub use client::{ApiClient, Session, SUCCESS_STATUS};
pub use error::ApiError;
pub use host::{ApiDefaults, ResolvedHost};
pub use http::{ApiResponse, HttpMethod};
pub use session::{Accept, CallOptions, ClientBuilder, ClientProfile, HttpApiClient, VerifyCert};
