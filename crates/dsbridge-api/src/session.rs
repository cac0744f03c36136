// Session token ownership.
//
// One mutex guards the token. Login runs while holding it, so callers that
// arrive during a login wait and then reuse the token it produced.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Error;
use crate::model::TokenResponse;
use crate::transport::{Params, Transport};

const LOGIN: &str = "json/system/login";
const LOGIN_APPLICATION: &str = "json/system/loginApplication";

/// How to authenticate with the controller.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Interactive user login.
    Password {
        username: String,
        password: SecretString,
    },
    /// Application token registered on the dSS (`loginApplication`).
    ApiKey(SecretString),
}

/// A session token together with the login generation that produced it.
#[derive(Debug, Clone)]
pub struct Token {
    value: SecretString,
    generation: u64,
}

impl Token {
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Increments on every successful login.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct SessionState {
    token: Option<SecretString>,
    generation: u64,
}

impl SessionState {
    fn current(&self) -> Option<Token> {
        self.token.as_ref().map(|value| Token {
            value: value.clone(),
            generation: self.generation,
        })
    }
}

/// Owns the current token. Created empty; mutated only by login and invalidation.
pub struct Session {
    credentials: Credentials,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Return the current token, logging in first when there is none.
    ///
    /// The flag is `true` when this call performed the login, which is the
    /// caller's cue to re-register event subscriptions.
    pub async fn ensure(&self, transport: &Transport) -> Result<(Token, bool), Error> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.current() {
            return Ok((token, false));
        }
        let token = self.login_locked(&mut state, transport).await?;
        Ok((token, true))
    }

    /// Force a fresh login, replacing any current token.
    pub async fn login(&self, transport: &Transport) -> Result<Token, Error> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state, transport).await
    }

    /// The stored token, without forcing a login.
    pub async fn current_token(&self) -> Option<Token> {
        self.state.lock().await.current()
    }

    /// Drop `stale` so the next request cycle logs in again.
    ///
    /// No-op when a newer login has already replaced it. Returns whether the
    /// token was cleared.
    pub async fn invalidate(&self, stale: &Token) -> bool {
        let mut state = self.state.lock().await;
        if state.token.is_some() && state.generation == stale.generation {
            debug!(generation = stale.generation, "invalidating session token");
            state.token = None;
            true
        } else {
            false
        }
    }

    /// Forget the token unconditionally, returning it for a best-effort logout.
    pub async fn clear(&self) -> Option<Token> {
        let mut state = self.state.lock().await;
        let token = state.current();
        state.token = None;
        token
    }

    async fn login_locked(
        &self,
        state: &mut SessionState,
        transport: &Transport,
    ) -> Result<Token, Error> {
        let (endpoint, params) = match &self.credentials {
            Credentials::Password { username, password } => (
                LOGIN,
                Params::new()
                    .with("user", username)
                    .with("password", password.expose_secret()),
            ),
            Credentials::ApiKey(key) => (
                LOGIN_APPLICATION,
                Params::new().with("loginToken", key.expose_secret()),
            ),
        };

        let value = transport
            .send(Method::GET, endpoint, &params, None, None, None)
            .await
            .map_err(|e| Error::Authentication {
                message: format!("login via {endpoint} failed: {e}"),
            })?;

        let resp: TokenResponse =
            serde_json::from_value(value).map_err(|e| Error::Authentication {
                message: format!("login response from {endpoint} carried no token: {e}"),
            })?;

        state.generation += 1;
        state.token = Some(resp.token);
        info!(generation = state.generation, "logged in to dSS");

        state.current().ok_or_else(|| Error::Authentication {
            message: "token vanished after login".into(),
        })
    }
}
