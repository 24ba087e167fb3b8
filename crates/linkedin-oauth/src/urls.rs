//! Provider URL construction and current-URL reconstruction
//!
//! Two jobs: build URLs on the provider's domains with RFC3986 query
//! encoding (the authorize endpoint wants `%20` between scopes, not `+`),
//! and rebuild the inbound request's own URL so it can serve as the default
//! `redirect_uri`, minus the provider's callback parameters, which must
//! not leak into the redirect target of the next login attempt.

use url::Url;

use crate::error::{Error, Result};

/// Query parameters the provider appends on the redirect back. Dropped
/// when reconstructing the current URL.
const KNOWN_CALLBACK_PARAMS: [&str; 4] = ["code", "state", "error", "error_description"];

/// Provider domain aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// `https://www.linkedin.com/`, the authorize and token endpoints
    Www,
    /// `https://api.linkedin.com/`, the REST API
    Api,
}

impl Domain {
    fn base(&self) -> &'static str {
        match self {
            Domain::Www => "https://www.linkedin.com/",
            Domain::Api => "https://api.linkedin.com/",
        }
    }
}

/// URL construction seam. The default implementation is [`UrlGenerator`];
/// tests substitute their own to pin endpoint URLs.
pub trait UrlBuilder: Send + Sync {
    /// Build a URL on one of the provider domains. `params` are appended
    /// as an RFC3986-encoded query string.
    fn url(&self, domain: Domain, path: &str, params: &[(String, String)]) -> Result<String>;

    /// The inbound request's own URL with callback parameters stripped,
    /// or `None` when no request context was provided.
    fn current_url(&self) -> Option<String>;
}

/// The pieces of the inbound request needed to reconstruct its URL.
/// The host application fills this from its own request type.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// "http" or "https" as seen by this server
    pub scheme: String,
    /// Host header value, may include a port
    pub host: String,
    /// Path plus query string, e.g. `/callback?code=...`
    pub path_and_query: String,
    /// `X-Forwarded-Proto` value, honored only when trusted
    pub forwarded_proto: Option<String>,
    /// `X-Forwarded-Host` value, honored only when trusted
    pub forwarded_host: Option<String>,
}

/// Default URL builder with the LinkedIn domain map.
#[derive(Debug, Default)]
pub struct UrlGenerator {
    context: Option<RequestContext>,
    trust_forwarded: bool,
}

impl UrlGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the inbound request context, enabling [`UrlBuilder::current_url`].
    pub fn with_request_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Honor `X-Forwarded-Proto`/`X-Forwarded-Host`. Off by default: only
    /// enable behind a proxy you control, since clients can set these.
    pub fn trust_forwarded(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }
}

impl UrlBuilder for UrlGenerator {
    fn url(&self, domain: Domain, path: &str, params: &[(String, String)]) -> Result<String> {
        let base = Url::parse(domain.base()).expect("domain map URLs are valid");
        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidArgument(format!("invalid resource path {path:?}: {e}")))?;

        if !params.is_empty() {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params {
                query.append_pair(key, value);
            }
            // form_urlencoded emits '+' for spaces; the provider expects
            // RFC3986, i.e. %20 between scopes. Literal '+' input is
            // already %2B at this point, so the replace is unambiguous.
            let query = query.finish().replace('+', "%20");
            url.set_query(Some(&query));
        }

        Ok(url.into())
    }

    fn current_url(&self) -> Option<String> {
        let context = self.context.as_ref()?;

        let scheme = match (&context.forwarded_proto, self.trust_forwarded) {
            (Some(proto), true) if proto == "https" => "https",
            (Some(_), true) => "http",
            _ => context.scheme.as_str(),
        };
        let host = match (&context.forwarded_host, self.trust_forwarded) {
            (Some(forwarded), true) => forwarded.as_str(),
            _ => context.host.as_str(),
        };

        let raw = format!("{scheme}://{host}{}", context.path_and_query);
        let mut url = Url::parse(&raw).ok()?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !KNOWN_CALLBACK_PARAMS.contains(&key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            let mut query = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
            let query = query.finish().replace('+', "%20");
            url.set_query(Some(&query));
        }

        Some(url.into())
    }
}
