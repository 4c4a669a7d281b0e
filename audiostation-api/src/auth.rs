//! Session management: login, logout and re-authentication.
//!
//! Audio Station authenticates through `SYNO.API.Auth`:
//!
//! ```text
//! POST /webapi/auth.cgi
//!   api=SYNO.API.Auth&version=6&method=login
//!   &account=<user>&passwd=<password>&session=AudioStation&format=sid[&otp_code=<code>]
//! ```
//!
//! ```json
//! { "success": true, "data": { "sid": "Iy3b8H..." } }
//! ```
//!
//! The returned `sid` is attached to every later call as `_sid`. When the
//! server reports the session as expired (codes 106, 107, 119) the client logs
//! in again. All logins go through one [`SessionManager`], which holds its lock
//! across the login round-trip: callers that found no session, or noticed the
//! same stale one, queue behind the first and reuse whatever it produced.

use crate::error::{AudioStationError, Result};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Account credentials.
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    password: String,
    /// One-time code for accounts with 2-step verification.
    pub otp_code: Option<String>,
}

impl Credentials {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            otp_code: None,
        }
    }

    pub fn with_otp(mut self, code: impl Into<String>) -> Self {
        self.otp_code = Some(code.into());
        self
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("otp_code", &self.otp_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The session a request was sent with.
///
/// `generation` increases with every login attempt, which lets the manager
/// tell a stale session from one that has already been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    sid: String,
    generation: u64,
}

impl SessionContext {
    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

enum State {
    SignedOut,
    Active(SessionContext),
    Failed(AudioStationError),
}

struct Inner {
    credentials: Credentials,
    state: State,
    generation: u64,
}

/// Owner of the client's single session.
pub struct SessionManager {
    inner: Mutex<Inner>,
    /// Finished login attempts, readable without the lock.
    settled: AtomicU64,
}

impl SessionManager {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Inner {
                credentials,
                state: State::SignedOut,
                generation: 0,
            }),
            settled: AtomicU64::new(0),
        }
    }

    /// The live session, if any.
    pub async fn current(&self) -> Option<SessionContext> {
        match &self.inner.lock().await.state {
            State::Active(ctx) => Some(ctx.clone()),
            _ => None,
        }
    }

    /// Return the live session, logging in first if there is none.
    ///
    /// Callers that queued behind a login in flight get its outcome, failure
    /// included. A rejected login is remembered: later calls fail with the
    /// same error without contacting the server until [`set_credentials`] is
    /// called. Other failures are retried by the next caller.
    ///
    /// [`set_credentials`]: Self::set_credentials
    pub async fn ensure_authenticated<F, Fut>(&self, login: F) -> Result<SessionContext>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let seen = self.settled.load(Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        let settled_while_waiting = self.settled.load(Ordering::SeqCst) != seen;
        match &inner.state {
            State::Active(ctx) => return Ok(ctx.clone()),
            State::Failed(err @ AudioStationError::Authentication { code: Some(_), .. }) => {
                return Err(err.clone());
            }
            State::Failed(err) if settled_while_waiting => return Err(err.clone()),
            State::SignedOut | State::Failed(_) => {}
        }
        self.login_locked(&mut inner, login).await
    }

    /// Replace `stale` with a fresh session.
    ///
    /// If another caller already replaced `stale`, its outcome (new session or
    /// failure) is returned and no login is sent.
    pub async fn reauthenticate<F, Fut>(
        &self,
        stale: &SessionContext,
        login: F,
    ) -> Result<SessionContext>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let mut inner = self.inner.lock().await;
        if inner.generation != stale.generation {
            match &inner.state {
                State::Active(ctx) => return Ok(ctx.clone()),
                State::Failed(err) => return Err(err.clone()),
                State::SignedOut => {}
            }
        }
        warn!(generation = stale.generation, "session expired, logging in again");
        self.login_locked(&mut inner, login).await
    }

    /// Forget the current session and return it for server-side logout.
    pub async fn sign_out(&self) -> Option<SessionContext> {
        let mut inner = self.inner.lock().await;
        match std::mem::replace(&mut inner.state, State::SignedOut) {
            State::Active(ctx) => Some(ctx),
            _ => None,
        }
    }

    /// Use new credentials for the next login. Clears a remembered failure.
    pub async fn set_credentials(&self, credentials: Credentials) {
        let mut inner = self.inner.lock().await;
        inner.credentials = credentials;
        if matches!(inner.state, State::Failed(_)) {
            inner.state = State::SignedOut;
        }
    }

    async fn login_locked<F, Fut>(&self, inner: &mut Inner, login: F) -> Result<SessionContext>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        inner.generation += 1;
        let generation = inner.generation;
        debug!(generation, account = %inner.credentials.account, "logging in");
        let outcome = login(inner.credentials.clone()).await;
        self.settled.fetch_add(1, Ordering::SeqCst);
        match outcome {
            Ok(sid) => {
                info!(generation, account = %inner.credentials.account, "logged in");
                let ctx = SessionContext { sid, generation };
                inner.state = State::Active(ctx.clone());
                Ok(ctx)
            }
            Err(err) => {
                warn!(generation, error = %err, "login failed");
                inner.state = State::Failed(err.clone());
                Err(err)
            }
        }
    }
}

/// Reason text for `SYNO.API.Auth` error codes.
pub fn describe_auth_code(code: i64) -> String {
    let reason = match code {
        400 => "no such account or incorrect password",
        401 => "account disabled",
        402 => "permission denied",
        403 => "2-step verification code required",
        404 => "failed to authenticate 2-step verification code",
        406 => "2-step verification must be enabled",
        407 => "IP address blocked",
        408 | 409 => "password expired",
        410 => "password must be changed",
        _ => return format!("login rejected (code {code})"),
    };
    format!("{reason} (code {code})")
}
