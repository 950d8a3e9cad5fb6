// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running operations "as" a principal.
//!
//! A [`Principal`] is a role plus its credentials and lives for the whole run. Entering a
//! principal scope turns it into a [`Session`] (a bearer token) which lives only until the
//! scope is left. [`IdentityScope::with_principal`] releases the session on every exit path,
//! including when the scope's budget runs out.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use url::Url;

use http_client::BaseApiClient;

use crate::error::{IdentityError, ScopeError};
use crate::shared::config::{Config, Credentials};
use crate::shared::types::PrincipalKind;

// The cf CLI's public OAuth client: id "cf", empty secret.
const OAUTH_CLIENT: &str = "cf:";

#[derive(Debug, Clone)]
pub struct Principal {
    kind: PrincipalKind,
    credentials: Credentials,
}

impl Principal {
    pub fn new(kind: PrincipalKind, credentials: Credentials) -> Self {
        Self { kind, credentials }
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// The principals of a run, created once at startup and lent to every case.
#[derive(Debug, Clone)]
pub struct Principals {
    admin: Principal,
    regular_user: Principal,
}

impl Principals {
    pub fn new(admin: Credentials, regular_user: Credentials) -> Self {
        Self {
            admin: Principal::new(PrincipalKind::Admin, admin),
            regular_user: Principal::new(PrincipalKind::RegularUser, regular_user),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.admin.clone(), config.regular_user.clone())
    }

    pub fn get(&self, kind: PrincipalKind) -> &Principal {
        match kind {
            PrincipalKind::Admin => &self.admin,
            PrincipalKind::RegularUser => &self.regular_user,
        }
    }
}

#[derive(Clone)]
pub struct Session {
    id: u64,
    principal: PrincipalKind,
    token: String,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn principal(&self) -> PrincipalKind {
        self.principal
    }

    pub fn authorization_header(&self) -> (String, String) {
        ("Authorization".to_owned(), format!("bearer {}", self.token))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// Hands out session ids and tracks which sessions have not been released yet.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

impl SessionRegistry {
    pub fn open(&self, principal: PrincipalKind, token: String) -> Session {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        Session {
            id,
            principal,
            token,
        }
    }

    /// Returns false if the session was not live.
    pub fn close(&self, session: &Session) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.id)
    }

    pub fn live(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait::async_trait]
pub trait IdentityProvider {
    async fn acquire(&self, principal: &Principal) -> Result<Session, IdentityError>;

    async fn release(&self, session: Session);

    /// Sessions acquired and not yet released.
    fn live_sessions(&self) -> usize;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
}

fn bearer() -> String {
    String::from("bearer")
}

/// Exchanges password credentials for a token at the UAA, and passes pre-issued tokens through.
pub struct UaaIdentityProvider {
    client: BaseApiClient,
    token_url: Option<Url>,
    registry: SessionRegistry,
}

impl UaaIdentityProvider {
    pub fn new(client: BaseApiClient, uaa_url: Option<&Url>) -> Self {
        let token_url = uaa_url.map(|base| {
            let mut url = base.clone();
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(["oauth", "token"]);
            }
            url
        });
        Self {
            client,
            token_url,
            registry: SessionRegistry::default(),
        }
    }

    async fn password_grant(
        &self,
        kind: PrincipalKind,
        username: &str,
        password: &str,
    ) -> Result<String, IdentityError> {
        let token_url = self
            .token_url
            .as_ref()
            .ok_or(IdentityError::NoTokenIssuer { principal: kind })?;

        let headers = [
            (
                "Authorization".to_owned(),
                format!("Basic {}", BASE64.encode(OAUTH_CLIENT)),
            ),
            ("Accept".to_owned(), "application/json".to_owned()),
        ];
        let response: TokenResponse = self
            .client
            .form_json_post(
                token_url.as_str(),
                &[
                    ("grant_type", "password"),
                    ("username", username),
                    ("password", password),
                ],
                &headers,
            )
            .await?;

        if !response.token_type.eq_ignore_ascii_case("bearer") {
            return Err(IdentityError::UnexpectedTokenType(response.token_type));
        }
        Ok(response.access_token)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for UaaIdentityProvider {
    async fn acquire(&self, principal: &Principal) -> Result<Session, IdentityError> {
        let kind = principal.kind();
        let token = match principal.credentials() {
            Credentials::Token { token } => token.clone(),
            Credentials::Password { username, password } => {
                self.password_grant(kind, username, password).await?
            }
        };
        let session = self.registry.open(kind, token);
        debug!("opened {kind} session {}", session.id());
        Ok(session)
    }

    async fn release(&self, session: Session) {
        if self.registry.close(&session) {
            debug!("closed {} session {}", session.principal(), session.id());
        } else {
            warn!("released unknown session {}", session.id());
        }
    }

    fn live_sessions(&self) -> usize {
        self.registry.live()
    }
}

/// Acquire, run, release.
#[derive(Clone)]
pub struct IdentityScope {
    provider: Arc<dyn IdentityProvider + Send + Sync>,
}

impl IdentityScope {
    pub fn new(provider: Arc<dyn IdentityProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    pub fn live_sessions(&self) -> usize {
        self.provider.live_sessions()
    }

    /// Run `body` with a fresh session for `principal`. `budget` is a single deadline covering
    /// session acquisition and `body`; running out of it at either step is
    /// [`ScopeError::TimedOut`]. The session is released on every exit path, including a
    /// panicking `body` or the returned future being dropped.
    pub async fn with_principal<F, Fut, T>(
        &self,
        principal: &Principal,
        budget: Duration,
        body: F,
    ) -> Result<T, ScopeError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = T>,
    {
        let deadline = Instant::now() + budget;

        let session = match timeout_at(deadline, self.provider.acquire(principal)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(ScopeError::Acquire(e)),
            Err(_) => return Err(ScopeError::TimedOut { after: budget }),
        };
        let guard = SessionGuard {
            provider: self.provider.clone(),
            session: Some(session.clone()),
        };

        let result = timeout_at(deadline, body(session)).await;
        guard.release().await;

        result.map_err(|_| ScopeError::TimedOut { after: budget })
    }
}

/// Holds a live session and releases it when dropped without [`SessionGuard::release`].
struct SessionGuard {
    provider: Arc<dyn IdentityProvider + Send + Sync>,
    session: Option<Session>,
}

impl SessionGuard {
    async fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.provider.release(session).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        // release is async, so hand it to the runtime
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let provider = self.provider.clone();
                handle.spawn(async move { provider.release(session).await });
            }
            Err(_) => warn!(
                "session {} dropped outside a runtime and was not released",
                session.id()
            ),
        }
    }
}

impl fmt::Debug for IdentityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityScope").finish_non_exhaustive()
    }
}
