use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "rs_mail_archive";

fn refresh_key(client_id: &str) -> String {
    format!("refresh:{client_id}")
}

fn load(account: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, account)?;
    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Save the refresh token issued to this OAuth client
pub fn save_refresh_token(client_id: &str, refresh_token: &str) -> Result<()> {
    Entry::new(SERVICE, &refresh_key(client_id))?
        .set_password(refresh_token)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

pub fn load_refresh_token(client_id: &str) -> Result<Option<String>> {
    load(&refresh_key(client_id))
}

/// Forget a refresh token the provider no longer accepts
pub fn clear_refresh_token(client_id: &str) -> Result<()> {
    match Entry::new(SERVICE, &refresh_key(client_id))?.delete_credential() {
        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(client_id)
}
