//! # Auth
//!
//! Identity is owned by Firebase Authentication, we only keep the resulting session.
//!
//! ## Session
//! - One process wide session, `None` means anonymous
//! - Observers register with [`SessionWatch::subscribe`] and get called right away with the current
//!   value, then on every change
//! - Dropping or [`Subscription::unsubscribe`]-ing the handle stops the callbacks
//!
//! ## Sign in
//! - Google Identity Services renders the popup and posts back an ID token (`credential`)
//! - The token is exchanged through `accounts:signInWithIdp`
//! - Email/password accounts are created through `accounts:signUp`
//! - Sign out just forgets the session, Firebase has no server side call for it
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::form_urlencoded::Serializer;

use crate::config::Config;

const GOOGLE_PROVIDER: &str = "google.com";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Sign in to do that")]
    NotAuthenticated,

    #[error("Sign in rejected: {0}")]
    Rejected(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Sign in is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Unavailable(e.to_string())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

type Listener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct WatchInner {
    current: Option<Session>,
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

fn lock(inner: &Mutex<WatchInner>) -> MutexGuard<'_, WatchInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct SessionWatch {
    inner: Arc<Mutex<WatchInner>>,
}

impl SessionWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        lock(&self.inner).current.clone()
    }

    pub fn subscribe(
        &self,
        on_change: impl Fn(Option<&Session>) + Send + Sync + 'static,
    ) -> Subscription {
        let listener: Listener = Arc::new(on_change);

        let (id, current) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.insert(id, listener.clone());
            (id, inner.current.clone())
        };

        listener(current.as_ref());

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Replaces the session and notifies every observer.
    ///
    /// Callbacks run after the lock is released, so they may call back into the watch.
    pub fn set(&self, session: Option<Session>) {
        let listeners: Vec<Listener> = {
            let mut inner = lock(&self.inner);
            inner.current = session.clone();
            inner.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener(session.as_ref());
        }
    }

    pub fn subscribers(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<WatchInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner).listeners.remove(&self.id);
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, AuthError>;

    async fn sign_up_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
}

impl From<TokenResponse> for Session {
    fn from(response: TokenResponse) -> Self {
        Self {
            uid: response.local_id,
            email: response.email.filter(|email| !email.is_empty()),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

pub struct FirebaseIdentity {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl FirebaseIdentity {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AuthError::Unavailable(format!("invalid identity url {base_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> Result<Url, AuthError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthError::Unavailable("identity url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&format!("accounts:{method}"));

        Ok(url)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            warn!("Identity provider rejected {method}: {message}");
            return Err(AuthError::Rejected(message));
        }

        let token: TokenResponse = response.error_for_status()?.json().await?;
        Ok(token.into())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, AuthError> {
        let post_body = Serializer::new(String::new())
            .append_pair("id_token", id_token)
            .append_pair("providerId", GOOGLE_PROVIDER)
            .finish();

        self.call(
            "signInWithIdp",
            json!({
                "postBody": post_body,
                "requestUri": "http://localhost",
                "returnIdpCredential": true,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.call(
            "signUp",
            json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }),
        )
        .await
    }
}

/// Identity provider plus the session it feeds.
#[derive(Clone)]
pub struct Auth {
    identity: Option<Arc<dyn IdentityProvider>>,
    sessions: SessionWatch,
}

impl Auth {
    pub fn new(identity: Option<Arc<dyn IdentityProvider>>, sessions: SessionWatch) -> Self {
        Self { identity, sessions }
    }

    pub fn from_config(config: &Config, sessions: SessionWatch) -> Result<Self, AuthError> {
        let identity: Option<Arc<dyn IdentityProvider>> = match &config.firebase_api_key {
            Some(api_key) => Some(Arc::new(FirebaseIdentity::new(
                Client::new(),
                &config.identity_url,
                api_key,
            )?)),
            None => {
                info!("FIREBASE_API_KEY not set, sign in disabled");
                None
            }
        };

        Ok(Self::new(identity, sessions))
    }

    pub fn sessions(&self) -> &SessionWatch {
        &self.sessions
    }

    pub fn is_configured(&self) -> bool {
        self.identity.is_some()
    }

    fn identity(&self) -> Result<&Arc<dyn IdentityProvider>, AuthError> {
        self.identity.as_ref().ok_or(AuthError::NotConfigured)
    }

    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, AuthError> {
        let session = self.identity()?.sign_in_with_google(id_token).await?;

        info!("Signed in {}", session.uid);
        self.sessions.set(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .identity()?
            .sign_up_with_password(email, password)
            .await?;

        info!("Registered {}", session.uid);
        self.sessions.set(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if let Some(session) = self.sessions.current() {
            debug!("Signing out {}", session.uid);
        }
        self.sessions.set(None);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use httpmock::prelude::*;

    use super::*;

    fn session(uid: &str) -> Session {
        Session {
            uid: uid.to_string(),
            email: None,
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_subscribe_sees_current_value() {
        let watch = SessionWatch::new();
        watch.set(Some(session("a")));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = watch.subscribe(move |s| {
            sink.lock().unwrap().push(s.map(|s| s.uid.clone()));
        });

        assert_eq!(*seen.lock().unwrap(), vec![Some("a".to_string())]);
    }

    #[test]
    fn test_changes_reach_subscribers() {
        let watch = SessionWatch::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _subscription = watch.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        watch.set(Some(session("a")));
        watch.set(None);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(watch.current().is_none());
    }

    #[test]
    fn test_unsubscribe_stops_callbacks() {
        let watch = SessionWatch::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = watch.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(watch.subscribers(), 1);

        subscription.unsubscribe();
        watch.set(Some(session("a")));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(watch.subscribers(), 0);
    }

    #[test]
    fn test_subscription_outliving_watch() {
        let watch = SessionWatch::new();
        let subscription = watch.subscribe(|_| {});

        drop(watch);
        subscription.unsubscribe();
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let rendered = format!("{:?}", session("a"));

        assert!(rendered.contains("uid"));
        assert!(!rendered.contains("refresh"));
    }

    #[test]
    fn test_endpoint() {
        let identity =
            FirebaseIdentity::new(Client::new(), "https://identitytoolkit.googleapis.com/v1", "k")
                .unwrap();

        assert_eq!(
            identity.endpoint("signUp").unwrap().as_str(),
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_sign_in() {
        let auth = Auth::new(None, SessionWatch::new());

        assert_eq!(
            auth.sign_in_with_google("token").await.unwrap_err(),
            AuthError::NotConfigured
        );
        assert!(auth.sessions().current().is_none());
    }

    #[test]
    fn test_sign_out_clears_session() {
        let auth = Auth::new(None, SessionWatch::new());
        auth.sessions().set(Some(session("a")));

        auth.sign_out();

        assert!(auth.sessions().current().is_none());
    }

    fn identity(server: &MockServer) -> FirebaseIdentity {
        FirebaseIdentity::new(Client::new(), &format!("{}/v1", server.base_url()), "k").unwrap()
    }

    #[tokio::test]
    async fn test_google_sign_in() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:signInWithIdp")
                    .query_param("key", "k")
                    .body_contains("id_token=tok%26providerId%3Devil.com&providerId=google.com");
                then.status(200).json_body(json!({
                    "localId": "uid-1",
                    "email": "admin@example.com",
                    "idToken": "id",
                    "refreshToken": "refresh",
                }));
            })
            .await;

        let auth = Auth::new(Some(Arc::new(identity(&server))), SessionWatch::new());
        let session = auth
            .sign_in_with_google("tok&providerId=evil.com")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.uid, "uid-1");
        assert_eq!(auth.sessions().current(), Some(session));
    }

    #[tokio::test]
    async fn test_rejected_sign_in_keeps_anonymous() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signInWithIdp");
                then.status(400).json_body(json!({
                    "error": { "code": 400, "message": "INVALID_IDP_RESPONSE" }
                }));
            })
            .await;

        let auth = Auth::new(Some(Arc::new(identity(&server))), SessionWatch::new());

        assert_eq!(
            auth.sign_in_with_google("expired").await.unwrap_err(),
            AuthError::Rejected("INVALID_IDP_RESPONSE".to_string())
        );
        assert!(auth.sessions().current().is_none());
    }

    #[tokio::test]
    async fn test_sign_up() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:signUp")
                    .json_body(json!({
                        "email": "new@example.com",
                        "password": "secret",
                        "returnSecureToken": true,
                    }));
                then.status(200).json_body(json!({
                    "localId": "uid-2",
                    "email": "new@example.com",
                    "idToken": "id",
                    "refreshToken": "refresh",
                }));
            })
            .await;

        let session = identity(&server)
            .sign_up_with_password("new@example.com", "secret")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.email.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn test_identity_outage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signUp");
                then.status(503);
            })
            .await;

        let err = identity(&server)
            .sign_up_with_password("new@example.com", "secret")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Unavailable(_)));
    }

    #[test]
    fn test_token_response() {
        let response: TokenResponse = serde_json::from_value(json!({
            "localId": "uid-1",
            "email": "",
            "idToken": "tok",
            "refreshToken": "ref",
            "expiresIn": "3600",
        }))
        .unwrap();
        let session = Session::from(response);

        assert_eq!(session.uid, "uid-1");
        assert!(session.email.is_none());
    }
}
