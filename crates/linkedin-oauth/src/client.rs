//! Client facade
//!
//! The only type application code talks to directly. Orchestrates the
//! authenticator, URL builder and transport, and keeps the access token in
//! memory for its own lifetime: once a token is cached here it is returned
//! unconditionally, so one request sees one stable token even if the store
//! changes underneath it. Instances are request-scoped: construct one per
//! inbound request and do not share across concurrent requests.

use std::sync::Arc;

use tracing::debug;

use crate::authenticator::{Authenticator, LoginOptions};
use crate::callback::{CallbackParams, LoginError};
use crate::error::{Error, Result};
use crate::response::{self, ApiResponse, Format, ResponseKind};
use crate::secret::Secret;
use crate::storage::DataStorage;
use crate::token::AccessToken;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::urls::{Domain, UrlBuilder, UrlGenerator};

/// Per-call options for [`LinkedIn::api`].
#[derive(Debug, Clone, Default)]
pub struct ApiOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// JSON body; forces [`Format::Json`] and serializes into `body`
    pub json: Option<serde_json::Value>,
    /// Exchange format override; defaults to the facade's format
    pub format: Option<Format>,
    /// Response representation override; defaults to the facade's
    pub response_kind: Option<ResponseKind>,
}

impl ApiOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.json = Some(value);
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = Some(kind);
        self
    }
}

/// The LinkedIn client.
///
/// When a new user arrives and wants to authenticate:
/// 1. Redirect them to whatever [`login_url`] returns
/// 2. They sign in on www.linkedin.com and authorize the application
/// 3. They return with `code` and `state` in the query string; hand those
///    in via [`with_callback`]
/// 4. Call [`is_authenticated`] or [`access_token`]; the authenticator
///    exchanges the code and persists the result
/// 5. Call [`api`] to talk to the REST API on the user's behalf
///
/// [`login_url`]: LinkedIn::login_url
/// [`with_callback`]: LinkedIn::with_callback
/// [`is_authenticated`]: LinkedIn::is_authenticated
/// [`access_token`]: LinkedIn::access_token
/// [`api`]: LinkedIn::api
pub struct LinkedIn {
    authenticator: Authenticator,
    urls: Arc<dyn UrlBuilder>,
    transport: Arc<dyn Transport>,
    callback: CallbackParams,
    format: Format,
    response_kind: ResponseKind,
    /// In-memory token cache, scoped to this instance
    access_token: Option<AccessToken>,
    last_response: Option<HttpResponse>,
}

impl LinkedIn {
    /// A client with default collaborators: reqwest transport, in-memory
    /// storage, and a URL generator with no request context. Production
    /// hosts attach their own storage and request context via the
    /// `with_*` builders.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<Secret>) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new());
        Self {
            authenticator: Authenticator::new(transport.clone(), client_id, client_secret),
            urls: Arc::new(UrlGenerator::new()),
            transport,
            callback: CallbackParams::empty(),
            format: Format::Json,
            response_kind: ResponseKind::Decoded,
            access_token: None,
            last_response: None,
        }
    }

    /// Attach the host application's session-backed storage.
    pub fn with_storage(mut self, storage: Arc<dyn DataStorage>) -> Self {
        self.authenticator = self.authenticator.with_storage(storage);
        self
    }

    /// Replace the transport, for both the token exchange and API calls.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.authenticator = self.authenticator.with_transport(transport.clone());
        self.transport = transport;
        self
    }

    pub fn with_url_builder(mut self, urls: Arc<dyn UrlBuilder>) -> Self {
        self.urls = urls;
        self
    }

    /// Hand in the provider-set parameters from the inbound request.
    pub fn with_callback(mut self, callback: CallbackParams) -> Self {
        self.callback = callback;
        self
    }

    /// Default exchange format for [`api`](LinkedIn::api) calls.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Default response representation for [`api`](LinkedIn::api) calls.
    pub fn with_response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = kind;
        self
    }

    /// The access token for this request, fetching one via the
    /// authenticator on first call. The cached value is returned
    /// unconditionally afterwards.
    pub async fn access_token(&mut self) -> Result<Option<AccessToken>> {
        if self.access_token.is_none() {
            if let Some(token) = self
                .authenticator
                .fetch_new_access_token(self.urls.as_ref(), &self.callback)
                .await?
            {
                self.access_token = Some(token);
            }
        }
        Ok(self.access_token.clone())
    }

    /// Seed the in-memory cache, e.g. with a token loaded from the
    /// application's own database.
    pub fn set_access_token(&mut self, token: impl Into<AccessToken>) {
        self.access_token = Some(token.into());
    }

    /// Is the current user authenticated?
    ///
    /// Policy: a token must exist AND a live profile fetch must succeed
    /// and return a user id. A cached token may already be revoked
    /// server-side; only the live check proves it still works. A rejected
    /// token or a transport failure reports `false`, not an error.
    pub async fn is_authenticated(&mut self) -> Result<bool> {
        let Some(token) = self.access_token().await? else {
            return Ok(false);
        };
        if !token.has_token() {
            return Ok(false);
        }

        let options = ApiOptions::new()
            .format(Format::Json)
            .response_kind(ResponseKind::Decoded);
        match self
            .api("GET", "/v1/people/~:(id,firstName,lastName)", options)
            .await
        {
            Ok(profile) => Ok(profile
                .as_json()
                .and_then(|value| value.get("id"))
                .and_then(|id| id.as_str())
                .is_some_and(|id| !id.is_empty())),
            Err(Error::TokenExpired(_)) | Err(Error::Transfer(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Make an authenticated API call.
    ///
    /// Injects `Authorization: Bearer <token>`, normalizes headers and
    /// query for the exchange format, performs the request, records the
    /// raw response for [`last_response`](LinkedIn::last_response), and
    /// converts the body to the requested representation. A 401 surfaces
    /// as [`Error::TokenExpired`] and leaves stored state intact.
    pub async fn api(
        &mut self,
        method: &str,
        resource: &str,
        mut options: ApiOptions,
    ) -> Result<ApiResponse> {
        let token = self.access_token().await?.unwrap_or_else(AccessToken::absent);
        set_pair(
            &mut options.headers,
            "Authorization",
            &format!("Bearer {token}"),
        );

        let format = filter_request_options(self.format, &mut options)?;

        let url = self.urls.url(Domain::Api, resource, &options.query)?;
        debug!(method, %url, "api call");

        let mut request = HttpRequest::new(method, url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = options.body.take() {
            request = request.body(body);
        }

        let response = self.transport.send(request).await?;
        self.last_response = Some(response.clone());

        if response.status == 401 {
            return Err(Error::TokenExpired(format!(
                "API returned 401: {}",
                response.text()
            )));
        }

        let kind = options.response_kind.unwrap_or(self.response_kind);
        response::convert(response, format, kind)
    }

    /// See [`api`](LinkedIn::api).
    pub async fn get(&mut self, resource: &str, options: ApiOptions) -> Result<ApiResponse> {
        self.api("GET", resource, options).await
    }

    /// See [`api`](LinkedIn::api).
    pub async fn post(&mut self, resource: &str, options: ApiOptions) -> Result<ApiResponse> {
        self.api("POST", resource, options).await
    }

    /// The URL to redirect the user to for login. `redirect_uri` defaults
    /// to the current inbound request URL when the URL builder knows it.
    pub fn login_url(&self, mut options: LoginOptions) -> Result<String> {
        if options.redirect_uri.is_none() {
            options.redirect_uri = self.urls.current_url();
        }
        self.authenticator.login_url(self.urls.as_ref(), &options)
    }

    /// Did the provider report a consent failure on the inbound request?
    pub fn has_error(&self) -> bool {
        self.callback.has_error()
    }

    /// The consent failure, if any.
    pub fn login_error(&self) -> Option<LoginError> {
        self.callback.login_error()
    }

    /// Forget all stored protocol state, logout.
    pub fn clear_storage(&self) -> Result<()> {
        self.authenticator.clear_storage()
    }

    /// The raw response of the most recent [`api`](LinkedIn::api) call,
    /// for header inspection.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last_response.as_ref()
    }
}

/// Resolve the exchange format and set the matching headers and query
/// parameters. A `json` option always wins and serializes into the body.
fn filter_request_options(default_format: Format, options: &mut ApiOptions) -> Result<Format> {
    if let Some(json) = options.json.take() {
        options.format = Some(Format::Json);
        let body = serde_json::to_vec(&json)
            .map_err(|e| Error::InvalidArgument(format!("unserializable json body: {e}")))?;
        options.body = Some(body);
    }

    let format = options.format.unwrap_or(default_format);
    match format {
        Format::Json => {
            set_pair(&mut options.headers, "Content-Type", "application/json");
            set_pair(&mut options.headers, "x-li-format", "json");
            set_pair(&mut options.query, "format", "json");
        }
        Format::Xml => {
            set_pair(&mut options.headers, "Content-Type", "text/xml");
        }
    }

    Ok(format)
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter_mut().find(|(existing, _)| existing == key) {
        Some(entry) => entry.1 = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }
}
