//! LinkedIn OAuth2 authorization-code client
//!
//! Drives a server-side web application through the LinkedIn login flow and
//! wraps authenticated calls to the REST API. This crate is a standalone
//! library with no dependency on any particular web framework; collaborators
//! (storage, transport, URL building) sit behind traits so the protocol core
//! can be tested without a network or a session.
//!
//! Login flow:
//! 1. The app redirects the user to whatever `LinkedIn::login_url()` returns
//! 2. The user signs in on www.linkedin.com and authorizes the application
//! 3. LinkedIn redirects back with `code` and `state` query parameters
//! 4. The app calls `is_authenticated()` or `access_token()`
//! 5. The authenticator verifies the CSRF state, exchanges the code for an
//!    access token, and persists both in the [`storage::DataStorage`]
//! 6. Subsequent requests find the stored token and skip the exchange; the
//!    facade keeps it in memory for the lifetime of one request
//!
//! [`storage::DataStorage`]: crate::storage::DataStorage

pub mod authenticator;
pub mod callback;
pub mod client;
pub mod csrf;
pub mod error;
pub mod response;
pub mod secret;
pub mod storage;
pub mod token;
pub mod transport;
pub mod urls;

pub use authenticator::{Authenticator, LoginOptions, Scope};
pub use callback::{CallbackParams, LoginError};
pub use client::{ApiOptions, LinkedIn};
pub use error::{Error, Result};
pub use response::{ApiResponse, Format, ResponseKind};
pub use secret::Secret;
pub use storage::{DataStorage, InMemoryStorage, StorageKey};
pub use token::AccessToken;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use urls::{Domain, RequestContext, UrlBuilder, UrlGenerator};
