//! Authorization-code protocol state machine
//!
//! Owns the CSRF state and the code-for-token exchange. The states are not
//! an explicit enum; they are observable through storage contents:
//!
//! - no `state`, no `code`, no `access_token`: nothing attempted yet
//! - `state` stored: login URL issued, awaiting the redirect back
//! - inbound `code`/`state` present: redemption pending
//! - `access_token` stored: authenticated
//! - everything cleared: the last exchange failed and reset the session
//!
//! A failed exchange invalidates everything derived from the presented
//! code, including any previously stored token. The caller restarts the
//! whole login flow; the single-use state and code are already spent.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::callback::CallbackParams;
use crate::csrf;
use crate::error::{Error, Result};
use crate::secret::Secret;
use crate::storage::{DataStorage, InMemoryStorage, StorageKey};
use crate::token::AccessToken;
use crate::transport::{HttpRequest, Transport};
use crate::urls::{Domain, UrlBuilder};

/// Options for building a login URL.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Where the provider should send the user back. The facade defaults
    /// this to the current request URL when unset; if it stays unresolved
    /// the parameter is omitted entirely.
    pub redirect_uri: Option<String>,
    pub scope: Option<Scope>,
    /// Extra query parameters, merged on top; the caller wins on key
    /// collisions, except `scope` which is always the normalized value.
    pub extra: Vec<(String, String)>,
}

impl LoginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn scope_list<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = Some(Scope::List(scopes.into_iter().map(Into::into).collect()));
        self
    }

    pub fn scope_raw(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(Scope::Raw(scope.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

/// Requested scopes. The authorize endpoint wants a space-separated list;
/// a raw string may use commas, which are rewritten to spaces. The two
/// normalization paths are chosen by the variant, not by content sniffing.
#[derive(Debug, Clone)]
pub enum Scope {
    List(Vec<String>),
    Raw(String),
}

impl Scope {
    fn normalize(&self) -> String {
        match self {
            Scope::List(items) => items.join(" "),
            Scope::Raw(raw) => raw.replace(',', " "),
        }
    }
}

/// The protocol core. Holds the app credentials and drives storage and
/// transport; it knows nothing about the hosting web framework.
pub struct Authenticator {
    client_id: String,
    client_secret: Secret,
    storage: Arc<dyn DataStorage>,
    transport: Arc<dyn Transport>,
}

impl Authenticator {
    /// An authenticator with in-memory storage. Use [`with_storage`] to
    /// attach the host application's session-backed store.
    ///
    /// [`with_storage`]: Authenticator::with_storage
    pub fn new(
        transport: Arc<dyn Transport>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            storage: Arc::new(InMemoryStorage::new()),
            transport,
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn DataStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Lay down a CSRF state token for the next login attempt.
    ///
    /// Idempotent: an already-pending state is never overwritten, so two
    /// login URLs built in one session share one state token.
    pub fn establish_csrf_state(&self) -> Result<()> {
        if self.storage.get(StorageKey::State).is_none() {
            debug!("issuing new CSRF state token");
            self.storage.set(StorageKey::State, csrf::generate_state())?;
        }
        Ok(())
    }

    /// Build the authorization URL the user should be redirected to, and
    /// persist the resolved `redirect_uri`, since the provider requires the
    /// same value again on the token-exchange leg.
    pub fn login_url(&self, urls: &dyn UrlBuilder, options: &LoginOptions) -> Result<String> {
        self.establish_csrf_state()?;
        let state = self
            .storage
            .get(StorageKey::State)
            .ok_or_else(|| Error::Storage("CSRF state vanished after being set".into()))?;

        let mut params: Vec<(String, String)> = vec![
            ("response_type".into(), "code".into()),
            ("client_id".into(), self.client_id.clone()),
            ("state".into(), state),
        ];

        match &options.redirect_uri {
            Some(redirect_uri) => {
                params.push(("redirect_uri".into(), redirect_uri.clone()));
                self.storage
                    .set(StorageKey::RedirectUri, redirect_uri.clone())?;
            }
            None => {
                // unresolved: omit the parameter and leave no stale value
                // behind for the exchange leg
                self.storage.clear(StorageKey::RedirectUri)?;
            }
        }

        for (key, value) in &options.extra {
            override_param(&mut params, key, value);
        }
        if let Some(scope) = &options.scope {
            override_param(&mut params, "scope", &scope.normalize());
        }

        urls.url(Domain::Www, "oauth/v2/authorization", &params)
    }

    /// Produce an access token for this request, if one can be had.
    ///
    /// No inbound code: return whatever the store holds (possibly nothing)
    /// without any network traffic. This is the common "second request, already
    /// authenticated" path. A presented code is exchanged; failure clears
    /// all stored protocol state before the error propagates, so a bogus
    /// code can never leave a stale token behind.
    pub async fn fetch_new_access_token(
        &self,
        urls: &dyn UrlBuilder,
        callback: &CallbackParams,
    ) -> Result<Option<AccessToken>> {
        let Some(code) = self.consume_code(callback)? else {
            return Ok(self
                .storage
                .get(StorageKey::AccessToken)
                .map(|raw| AccessToken::from_stored(&raw)));
        };

        let token = match self.access_token_from_code(urls, &code).await {
            Ok(token) => token,
            Err(e) => {
                // the code was bogus, so everything based on it is invalid
                warn!(error = %e, "code exchange failed, resetting stored protocol state");
                self.storage.clear_all()?;
                return Err(e);
            }
        };

        self.storage.set(StorageKey::Code, code)?;
        self.storage
            .set(StorageKey::AccessToken, token.to_stored())?;
        debug!("authorization code exchanged and token stored");

        Ok(Some(token))
    }

    /// Exchange an authorization code for an access token.
    ///
    /// POSTs the form-encoded grant to the token endpoint using the
    /// `redirect_uri` stored when the login URL was built.
    async fn access_token_from_code(
        &self,
        urls: &dyn UrlBuilder,
        code: &str,
    ) -> Result<AccessToken> {
        if code.is_empty() {
            return Err(Error::InvalidArgument(
                "could not get access token: the code was empty".into(),
            ));
        }

        let redirect_uri = self.storage.get(StorageKey::RedirectUri);
        let url = urls.url(Domain::Www, "oauth/v2/accessToken", &[])?;

        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "authorization_code");
            form.append_pair("code", code);
            if let Some(redirect_uri) = &redirect_uri {
                form.append_pair("redirect_uri", redirect_uri);
            }
            form.append_pair("client_id", &self.client_id);
            form.append_pair("client_secret", self.client_secret.expose());
            form.finish()
        };

        let request = HttpRequest::new("POST", url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);

        let response = self.transport.send(request).await.map_err(|e| {
            // most likely the user revoked authorization between the
            // redirect and the exchange
            Error::TokenExchange(format!(
                "could not get access token: the user may have revoked the authorization: {e}"
            ))
        })?;

        if response.body.is_empty() {
            return Err(Error::TokenExchange(
                "could not get access token: the response from the provider was empty".into(),
            ));
        }
        if !(200..300).contains(&response.status) {
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {}: {}",
                response.status,
                response.text()
            )));
        }

        let payload: TokenPayload = serde_json::from_slice(&response.body).map_err(|e| {
            Error::TokenExchange(format!("could not parse the token response: {e}"))
        })?;

        let token = match (payload.access_token, payload.expires_in) {
            (Some(token), Some(expires_in)) => AccessToken::with_expires_in(token, expires_in),
            (Some(token), None) => AccessToken::new(token),
            (None, _) => AccessToken::absent(),
        };

        if !token.has_token() {
            return Err(Error::TokenExchange(
                "could not get access token: the response did not contain a token".into(),
            ));
        }

        Ok(token)
    }

    /// Pull the authorization code out of the inbound request, if there is
    /// a fresh one, verifying CSRF state first.
    ///
    /// Absence is `Ok(None)`: no code at all, or a code that was already
    /// redeemed (replay of the same redirect, e.g. a page refresh). Any
    /// CSRF inconsistency is a hard error and mutates nothing.
    fn consume_code(&self, callback: &CallbackParams) -> Result<Option<String>> {
        let Some(code) = callback.code() else {
            return Ok(None);
        };

        if self.storage.get(StorageKey::Code).as_deref() == Some(code) {
            // we have already validated this code
            debug!("inbound authorization code already redeemed, ignoring");
            return Ok(None);
        }

        let Some(stored_state) = self.storage.get(StorageKey::State) else {
            return Err(Error::Protocol(
                "could not find a stored CSRF state token".into(),
            ));
        };
        let Some(inbound_state) = callback.state() else {
            return Err(Error::Protocol(
                "could not find a CSRF state token in the request".into(),
            ));
        };
        if stored_state != inbound_state {
            return Err(Error::Protocol(
                "the CSRF state token from the request does not match the stored token".into(),
            ));
        }

        // the state has done its job, single use
        self.storage.clear(StorageKey::State)?;

        Ok(Some(code.to_string()))
    }

    /// Forget everything, explicit logout.
    pub fn clear_storage(&self) -> Result<()> {
        self.storage.clear_all()
    }
}

/// Token-endpoint response body. `expires_in` is a delta in seconds from
/// the response time; conversion to an absolute timestamp happens in the
/// `AccessToken` constructor.
#[derive(Debug, serde::Deserialize)]
struct TokenPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn override_param(params: &mut Vec<(String, String)>, key: &str, value: &str) {
    match params.iter_mut().find(|(existing, _)| existing == key) {
        Some(entry) => entry.1 = value.to_string(),
        None => params.push((key.to_string(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpResponse;
    use crate::urls::UrlGenerator;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport stub: counts calls, records the last request, and serves
    /// a canned response (or a transfer failure when none is set).
    struct StubTransport {
        calls: AtomicUsize,
        last_request: Mutex<Option<HttpRequest>>,
        response: Option<HttpResponse>,
    }

    impl StubTransport {
        fn returning(body: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
                response: Some(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: body.as_bytes().to_vec(),
                }),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
                response: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for StubTransport {
        fn send<'a>(
            &'a self,
            request: HttpRequest,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = crate::error::Result<HttpResponse>> + Send + 'a>,
        > {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            let result = match &self.response {
                Some(response) => Ok(response.clone()),
                None => Err(Error::Transfer("stubbed network failure".into())),
            };
            Box::pin(async move { result })
        }
    }

    /// Storage wrapper that counts writes and resets.
    struct RecordingStorage {
        inner: InMemoryStorage,
        sets: Mutex<Vec<StorageKey>>,
        clear_alls: AtomicUsize,
    }

    impl RecordingStorage {
        fn new() -> Self {
            Self {
                inner: InMemoryStorage::new(),
                sets: Mutex::new(Vec::new()),
                clear_alls: AtomicUsize::new(0),
            }
        }

        fn set_writes(&self, key: StorageKey) -> usize {
            self.sets.lock().unwrap().iter().filter(|k| **k == key).count()
        }

        fn clear_alls(&self) -> usize {
            self.clear_alls.load(Ordering::SeqCst)
        }
    }

    impl DataStorage for RecordingStorage {
        fn set(&self, key: StorageKey, value: String) -> crate::error::Result<()> {
            self.sets.lock().unwrap().push(key);
            self.inner.set(key, value)
        }

        fn get(&self, key: StorageKey) -> Option<String> {
            self.inner.get(key)
        }

        fn clear(&self, key: StorageKey) -> crate::error::Result<()> {
            self.inner.clear(key)
        }

        fn clear_all(&self) -> crate::error::Result<()> {
            self.clear_alls.fetch_add(1, Ordering::SeqCst);
            self.inner.clear_all()
        }
    }

    fn authenticator(
        transport: Arc<StubTransport>,
        storage: Arc<RecordingStorage>,
    ) -> Authenticator {
        Authenticator::new(transport, "app-id", "app-secret").with_storage(storage)
    }

    #[test]
    fn establish_csrf_state_is_idempotent() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());

        auth.establish_csrf_state().unwrap();
        let first = storage.get(StorageKey::State).unwrap();

        auth.establish_csrf_state().unwrap();
        let second = storage.get(StorageKey::State).unwrap();

        assert_eq!(first, second, "pending state must not be overwritten");
        assert_eq!(
            storage.set_writes(StorageKey::State),
            1,
            "second call must perform no write"
        );
    }

    #[test]
    fn login_url_contains_protocol_params_and_persists_redirect_uri() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());
        let urls = UrlGenerator::new();

        let options = LoginOptions::new().redirect_uri("https://example.com/callback");
        let url = auth.login_url(&urls, &options).unwrap();

        assert!(url.starts_with("https://www.linkedin.com/oauth/v2/authorization?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=app-id"));
        let state = storage.get(StorageKey::State).unwrap();
        assert!(url.contains(&format!("state={state}")));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcallback"));
        assert_eq!(
            storage.get(StorageKey::RedirectUri).as_deref(),
            Some("https://example.com/callback")
        );
    }

    #[test]
    fn login_url_scope_list_is_space_joined() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage);
        let urls = UrlGenerator::new();

        let options = LoginOptions::new().scope_list(["r_basicprofile", "w_member_social"]);
        let url = auth.login_url(&urls, &options).unwrap();

        assert!(
            url.contains("scope=r_basicprofile%20w_member_social"),
            "scopes must be space-joined and percent-encoded, got: {url}"
        );
    }

    #[test]
    fn login_url_scope_string_commas_become_spaces() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage);
        let urls = UrlGenerator::new();

        let options = LoginOptions::new().scope_raw("r_basicprofile,w_member_social");
        let url = auth.login_url(&urls, &options).unwrap();

        assert!(url.contains("scope=r_basicprofile%20w_member_social"), "got: {url}");
    }

    #[test]
    fn login_url_caller_params_override_defaults() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage);
        let urls = UrlGenerator::new();

        let options = LoginOptions::new().param("response_type", "token");
        let url = auth.login_url(&urls, &options).unwrap();

        assert!(url.contains("response_type=token"));
        assert!(!url.contains("response_type=code"));
    }

    #[test]
    fn login_url_without_redirect_omits_param_and_clears_slot() {
        let storage = Arc::new(RecordingStorage::new());
        storage
            .set(StorageKey::RedirectUri, "https://stale.example/cb".into())
            .unwrap();
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());
        let urls = UrlGenerator::new();

        let url = auth.login_url(&urls, &LoginOptions::new()).unwrap();

        assert!(!url.contains("redirect_uri"));
        assert_eq!(storage.get(StorageKey::RedirectUri), None);
    }

    #[tokio::test]
    async fn no_code_and_empty_storage_is_none_without_network() {
        let transport = Arc::new(StubTransport::failing());
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(transport.clone(), storage);

        let token = auth
            .fetch_new_access_token(&UrlGenerator::new(), &CallbackParams::empty())
            .await
            .unwrap();

        assert!(token.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn no_code_falls_back_to_stored_token_without_network() {
        let transport = Arc::new(StubTransport::failing());
        let storage = Arc::new(RecordingStorage::new());
        storage
            .set(StorageKey::AccessToken, "cached".into())
            .unwrap();
        let auth = authenticator(transport.clone(), storage);

        let token = auth
            .fetch_new_access_token(&UrlGenerator::new(), &CallbackParams::empty())
            .await
            .unwrap()
            .expect("stored token must be returned");

        assert_eq!(token.to_string(), "cached");
        assert_eq!(transport.calls(), 0, "fallback path must not hit the network");
    }

    #[tokio::test]
    async fn replayed_code_is_ignored() {
        let transport = Arc::new(StubTransport::failing());
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::Code, "X".into()).unwrap();
        storage
            .set(StorageKey::AccessToken, "cached".into())
            .unwrap();
        let auth = authenticator(transport.clone(), storage.clone());

        let callback = CallbackParams::from_query("code=X&state=anything");
        let token = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(token.to_string(), "cached");
        assert_eq!(transport.calls(), 0, "replay must not re-exchange");
        assert_eq!(storage.set_writes(StorageKey::Code), 1, "no extra writes");
    }

    #[tokio::test]
    async fn code_without_any_stored_state_is_protocol_violation() {
        let storage = Arc::new(RecordingStorage::new());
        let auth = authenticator(Arc::new(StubTransport::failing()), storage);

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn request_missing_state_is_protocol_violation() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let auth = authenticator(Arc::new(StubTransport::failing()), storage);

        let callback = CallbackParams::from_query("code=abc");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn state_mismatch_is_protocol_violation_and_mutates_nothing() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());

        let callback = CallbackParams::from_query("code=abc&state=s2");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol(_)), "got: {err:?}");
        assert_eq!(
            storage.get(StorageKey::State).as_deref(),
            Some("s1"),
            "stored state must survive a mismatch"
        );
        assert_eq!(storage.get(StorageKey::Code), None);
        assert_eq!(storage.clear_alls(), 0);
    }

    #[tokio::test]
    async fn successful_exchange_stores_code_and_token() {
        let transport = Arc::new(StubTransport::returning(
            r#"{"access_token":"foobar","expires_in":10}"#,
        ));
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        storage
            .set(StorageKey::RedirectUri, "https://example.com/cb".into())
            .unwrap();
        let auth = authenticator(transport.clone(), storage.clone());

        let callback = CallbackParams::from_query("code=the-code&state=s1");
        let token = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap()
            .expect("exchange must yield a token");

        assert!(token.has_token());
        assert_eq!(token.to_string(), "foobar");
        assert!(token.expires_at().is_some());

        // single-use state consumed, code and token persisted
        assert_eq!(storage.get(StorageKey::State), None);
        assert_eq!(storage.get(StorageKey::Code).as_deref(), Some("the-code"));
        let stored = storage.get(StorageKey::AccessToken).unwrap();
        assert_eq!(AccessToken::from_stored(&stored).to_string(), "foobar");

        // and the exchange leg carried the right grant
        let request = transport.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://www.linkedin.com/oauth/v2/accessToken");
        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=the-code"));
        assert!(body.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcb"));
        assert!(body.contains("client_id=app-id"));
        assert!(body.contains("client_secret=app-secret"));
        assert!(
            request
                .headers
                .iter()
                .any(|(name, value)| name == "Content-Type"
                    && value == "application/x-www-form-urlencoded")
        );
    }

    #[tokio::test]
    async fn transport_failure_resets_everything_once() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        storage
            .set(StorageKey::AccessToken, "old-token".into())
            .unwrap();
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert_eq!(storage.clear_alls(), 1, "exactly one full reset");
        assert_eq!(
            storage.get(StorageKey::AccessToken),
            None,
            "a stale token must not survive a failed exchange"
        );
    }

    #[tokio::test]
    async fn empty_response_body_fails_and_resets() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let auth = authenticator(Arc::new(StubTransport::returning("")), storage.clone());

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert_eq!(storage.clear_alls(), 1);
    }

    #[tokio::test]
    async fn response_without_token_field_fails_and_resets() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let auth = authenticator(
            Arc::new(StubTransport::returning(r#"{"expires_in":10}"#)),
            storage.clone(),
        );

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert_eq!(storage.clear_alls(), 1);
    }

    #[tokio::test]
    async fn response_with_empty_token_string_fails() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let auth = authenticator(
            Arc::new(StubTransport::returning(r#"{"access_token":""}"#)),
            storage.clone(),
        );

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::TokenExchange(_)),
            "an empty token string must not produce a token-shaped value, got: {err:?}"
        );
    }

    #[tokio::test]
    async fn non_success_status_fails_and_resets() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::State, "s1".into()).unwrap();
        let transport = Arc::new(StubTransport {
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            response: Some(HttpResponse {
                status: 400,
                headers: HashMap::new(),
                body: br#"{"error":"invalid_grant"}"#.to_vec(),
            }),
        });
        let auth = authenticator(transport, storage.clone());

        let callback = CallbackParams::from_query("code=abc&state=s1");
        let err = auth
            .fetch_new_access_token(&UrlGenerator::new(), &callback)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TokenExchange(_)), "got: {err:?}");
        assert_eq!(storage.clear_alls(), 1);
    }

    #[test]
    fn clear_storage_delegates_to_clear_all() {
        let storage = Arc::new(RecordingStorage::new());
        storage.set(StorageKey::AccessToken, "t".into()).unwrap();
        let auth = authenticator(Arc::new(StubTransport::failing()), storage.clone());

        auth.clear_storage().unwrap();

        assert_eq!(storage.clear_alls(), 1);
        assert_eq!(storage.get(StorageKey::AccessToken), None);
    }
}
