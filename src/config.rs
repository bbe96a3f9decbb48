use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub user_id: Option<String>,
    pub mail_dir: Option<String>,
    pub include_spam_trash: Option<bool>,
    /// Minimum gap between metered API calls
    pub throttle_ms: Option<u64>,
    /// Stop at the first already archived message (newest-first feeds only)
    pub stop_at_first_known: Option<bool>,
    pub api_base: Option<String>,
}

impl Config {
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(DEFAULT_REDIRECT_URI)
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("me")
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn include_spam_trash(&self) -> bool {
        self.include_spam_trash.unwrap_or(true)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms.unwrap_or(10))
    }

    pub fn stop_at_first_known(&self) -> bool {
        self.stop_at_first_known.unwrap_or(true)
    }

    pub fn mail_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.mail_dir {
            Some(p) => PathBuf::from(p),
            None => config_dir.join("mail"),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_archive"))
}

/// Create `path` and any missing parents, readable by the owner only.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    Ok(())
}

pub fn load_config(dir: &Path) -> Result<Config> {
    let path = dir.join("config.toml");
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            client_secret: None,
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            user_id: Some("me".to_string()),
            mail_dir: None,
            include_spam_trash: Some(true),
            throttle_ms: Some(10),
            stop_at_first_known: Some(true),
            api_base: None,
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(&path)?;
    let cfg: Config =
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}
