use anyhow::{Context, Result};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{oauth, token_store, tokens_file};
use crate::config::Config;
use crate::error::ArchiveError;

/// A token with less than this many seconds left is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

fn epoch_now() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

/// Bearer token plus the epoch second it stops working, if known.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<i64>,
}

impl AccessToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|exp| now + EXPIRY_SKEW_SECS < exp)
    }
}

/// Something that can hand out a new access token when the current one lapses.
pub trait TokenSource {
    fn acquire(&self, now: i64) -> Result<AccessToken>;
}

/// Authenticated capability for the mail API.
///
/// Renews its bearer token before each call once the token is about to expire,
/// so a run can outlive a single token.
pub struct Session {
    token: RefCell<AccessToken>,
    renew: Option<Box<dyn TokenSource>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("renewable", &self.renew.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Fixed token that is never renewed.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            token: RefCell::new(AccessToken {
                secret: access_token.into(),
                expires_at: None,
            }),
            renew: None,
        }
    }

    /// Acquire a token from `source` now and renew through it later.
    pub fn with_source(source: Box<dyn TokenSource>, now: i64) -> Result<Self, ArchiveError> {
        let token = source.acquire(now).map_err(ArchiveError::session)?;
        Ok(Self {
            token: RefCell::new(token),
            renew: Some(source),
        })
    }

    /// Cached token if still valid, else refresh, else the interactive flow.
    pub fn establish(cfg: &Config, config_dir: &Path) -> Result<Self, ArchiveError> {
        let auth = Authenticator::from_config(cfg, config_dir).map_err(ArchiveError::session)?;
        let now = epoch_now().map_err(ArchiveError::session)?;
        Self::with_source(Box::new(auth), now)
    }

    /// Current bearer token, renewed first if it is about to expire.
    pub fn access_token(&self) -> Result<String, ArchiveError> {
        let now = epoch_now().map_err(ArchiveError::session)?;
        self.access_token_at(now)
    }

    fn access_token_at(&self, now: i64) -> Result<String, ArchiveError> {
        let mut token = self.token.borrow_mut();
        if let Some(source) = &self.renew
            && !token.is_fresh(now)
        {
            log::info!("access token about to expire, renewing");
            *token = source.acquire(now).map_err(ArchiveError::session)?;
        }
        Ok(token.secret.clone())
    }
}

struct Authenticator {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    config_dir: PathBuf,
}

impl Authenticator {
    fn from_config(cfg: &Config, config_dir: &Path) -> Result<Self> {
        let client_secret = match &cfg.client_secret {
            Some(s) => Some(s.clone()),
            None => token_store::load_client_secret(&cfg.client_id)
                .context("reading client secret from keyring")?
                .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok()),
        };

        Ok(Self {
            client_id: cfg.client_id.clone(),
            client_secret,
            redirect_uri: cfg.redirect_uri().to_string(),
            config_dir: config_dir.to_path_buf(),
        })
    }

    fn remember(&self, t: oauth::Tokens, now: i64) -> Result<AccessToken> {
        if let Some(rt) = &t.refresh_token
            && let Err(e) = token_store::save_refresh_token(&self.client_id, rt)
        {
            log::warn!("could not store refresh token in keyring: {e:#}");
        }

        let exp = now + t.expires_in.map(|s| s as i64).unwrap_or(3600);
        tokens_file::save_tokens(&self.config_dir, Some(&t.access_token), Some(exp))?;
        Ok(AccessToken {
            secret: t.access_token,
            expires_at: Some(exp),
        })
    }
}

impl TokenSource for Authenticator {
    fn acquire(&self, now: i64) -> Result<AccessToken> {
        if let Some(tf) = tokens_file::load_tokens(&self.config_dir)?
            && let Some(at) = tf.usable_at(now + EXPIRY_SKEW_SECS)
            && let Some(exp) = tf.expires_at_epoch
        {
            log::info!("using cached access token");
            return Ok(AccessToken {
                secret: at.to_string(),
                expires_at: Some(exp),
            });
        }

        if let Some(rt) = token_store::load_refresh_token(&self.client_id)? {
            log::info!("refreshing access token");
            match oauth::refresh_access_token(&self.client_id, self.client_secret.as_deref(), &rt)
            {
                Ok(t) => return self.remember(t, now),
                Err(e) => {
                    log::warn!("refresh failed ({e:#}), falling back to interactive auth");
                    if let Err(e) = token_store::clear_refresh_token(&self.client_id) {
                        log::warn!("could not clear stale refresh token: {e:#}");
                    }
                }
            }
        }

        log::info!("running interactive PKCE auth flow");
        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            oauth::GMAIL_READONLY_SCOPE,
        )?;
        self.remember(t, now)
    }
}
