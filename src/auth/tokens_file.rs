use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cached access token stored in <config dir>/tokens.json
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokensFile {
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

impl TokensFile {
    /// The cached token, if it is still valid at `now`.
    pub fn usable_at(&self, now: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp => Some(at.as_str()),
            _ => None,
        }
    }
}

fn tokens_path(dir: &Path) -> PathBuf {
    dir.join("tokens.json")
}

pub fn save_tokens(
    dir: &Path,
    access_token: Option<&str>,
    expires_at_epoch: Option<i64>,
) -> Result<()> {
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)?;

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut f = opts.open(tokens_path(dir))?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Load tokens file if present. An unparsable file is ignored like a missing one.
pub fn load_tokens(dir: &Path) -> Result<Option<TokensFile>> {
    let p = tokens_path(dir);
    if !p.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(&p)?;
    match serde_json::from_str::<TokensFile>(&s) {
        Ok(tf) => Ok(Some(tf)),
        Err(e) => {
            log::warn!("ignoring unreadable token cache {}: {e}", p.display());
            Ok(None)
        }
    }
}
