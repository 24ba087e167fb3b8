//! Inbound callback parameters
//!
//! When the provider redirects the user back, the interesting values arrive
//! as query parameters: `code` and `state` on success, `error` and
//! `error_description` when the user denied consent. The host application
//! extracts them from its own request type and hands them in here, so the
//! protocol core never touches ambient request state.

use std::fmt;

use url::Url;

/// Read-only view of the provider-set parameters on the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// No callback parameters at all, the usual case for any request that
    /// is not the provider redirect.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse from a raw query string (`code=...&state=...`).
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Parse from a full inbound URL.
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_description(&self) -> Option<&str> {
        self.error_description.as_deref()
    }

    /// Did the provider report a consent failure?
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The consent failure as a value object, if present.
    pub fn login_error(&self) -> Option<LoginError> {
        self.error.as_ref().map(|name| LoginError {
            name: name.clone(),
            description: self.error_description.clone().unwrap_or_default(),
        })
    }
}

/// Provider-reported login failure: an error code and a human-readable
/// description. Not a protocol state transition, purely informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginError {
    name: String,
    description: String,
}

impl LoginError {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {}, Description: {}", self.name, self.description)
    }
}
