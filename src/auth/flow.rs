//! Interactive sign-in and token refresh against the Questrade login service

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use url::Url;

use super::tokens::Token;
use super::AuthConfig;
use crate::error::{Result, TokenError};

/// Obtains new tokens on behalf of the token store.
pub trait AuthorizationFlow {
    /// Open the provider's sign-in page. Returns once the browser has been
    /// started; the token itself arrives later, out of band.
    fn launch_interactive_login(&self) -> Result<()>;

    /// Trade a refresh token for a fresh token.
    fn refresh_token(&self, refresh_token: &str) -> impl Future<Output = Result<Token>> + Send;
}

/// Browser + HTTP implementation of [`AuthorizationFlow`] for Questrade.
pub struct QuestradeFlow {
    config: AuthConfig,
    token_path: PathBuf,
    http: reqwest::Client,
}

impl QuestradeFlow {
    /// `token_path` is where [`QuestradeFlow::save_token`] writes.
    pub fn new(config: AuthConfig, token_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            token_path: token_path.into(),
            http: reqwest::Client::new(),
        }
    }

    fn refresh_url(&self, refresh_token: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.config.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .map_err(|e| {
            TokenError::Config(format!("invalid token_url '{}': {}", self.config.token_url, e))
        })
    }

    /// Replace the token file with `token`.
    ///
    /// Writes a sibling temp file and renames it into place.
    pub fn save_token(&self, token: &Token) -> Result<()> {
        write_token_file(&self.token_path, token)
    }
}

impl AuthorizationFlow for QuestradeFlow {
    fn launch_interactive_login(&self) -> Result<()> {
        tracing::info!(
            "Opening {} at {}",
            self.config.browser,
            self.config.sign_in_url
        );

        let mut child = Command::new(&self.config.browser)
            .args(&self.config.browser_args)
            .arg(&self.config.sign_in_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TokenError::Browser {
                browser: self.config.browser.clone(),
                source,
            })?;

        // Reap the browser in the background so no zombie is left behind
        let browser = self.config.browser.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) => tracing::debug!("{} exited with {}", browser, status),
            Err(e) => tracing::warn!("Failed to wait for {}: {}", browser, e),
        });

        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token> {
        let url = self.refresh_url(refresh_token)?;
        tracing::info!("Refreshing token at {}", self.config.token_url);

        let resp = self.http.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TokenError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let token = Token::from_value(body).ok_or_else(|| TokenError::Provider {
            status: status.as_u16(),
            message: "response body is not a JSON object".to_string(),
        })?;

        tracing::debug!("Token refreshed (valid: {})", token.is_valid());
        Ok(token)
    }
}

fn write_token_file(path: &Path, token: &Token) -> Result<()> {
    let content = serde_json::to_string_pretty(token).map_err(|source| TokenError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| TokenError::file_access(&tmp, e))?;

    // Token file holds live credentials
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp, perms).map_err(|e| TokenError::file_access(&tmp, e))?;
    }

    fs::rename(&tmp, path).map_err(|e| TokenError::file_access(path, e))?;
    tracing::info!("Token saved to {}", path.display());
    Ok(())
}
