//! Disk-backed token store
//!
//! Every call re-reads `questrade_token.json`; nothing is cached between
//! calls. The store never writes the file, that is left to the
//! [`AuthorizationFlow`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::flow::AuthorizationFlow;
use super::tokens::{self, Token, ACCESS_TOKEN, API_SERVER, EXPIRES_IN, REFRESH_TOKEN, TOKEN_TYPE};
use crate::error::{Result, TokenError};

/// Default file name, relative to the user's home directory.
pub const TOKEN_FILE_NAME: &str = "questrade_token.json";

pub struct TokenStore<F> {
    path: PathBuf,
    flow: F,
}

impl<F: AuthorizationFlow> TokenStore<F> {
    pub fn new(path: impl Into<PathBuf>, flow: F) -> Self {
        Self {
            path: path.into(),
            flow,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Load the stored token, or start an interactive login.
    ///
    /// With `request_new` the browser is launched and `None` is returned
    /// straight away. Otherwise a missing or unreadable file yields `None`,
    /// while a file holding malformed JSON is an error. A token lacking any
    /// required field is reported as `None`.
    pub fn get_token(&self, request_new: bool) -> Result<Option<Token>> {
        if request_new {
            self.flow.launch_interactive_login()?;
            return Ok(None);
        }

        let token = self.read_token()?;
        Ok(token.filter(Token::is_valid))
    }

    fn read_token(&self) -> Result<Option<Token>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No token file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!("Cannot read token file {}: {}", self.path.display(), e);
                return Ok(None);
            }
        };

        let value: Value = serde_json::from_slice(&bytes).map_err(|source| TokenError::Parse {
            path: self.path.clone(),
            source,
        })?;

        Ok(Token::from_value(value))
    }

    /// Exchange `refresh_token` for a new token. The result is not persisted.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token> {
        self.flow.refresh_token(refresh_token).await
    }

    /// Remove the token file. A missing file is an error.
    pub fn delete_token(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| TokenError::file_access(&self.path, e))?;
        tracing::info!("Deleted {}", self.path.display());
        Ok(())
    }

    /// Look up `key` in the stored token; `None` if there is no valid token
    /// or the key is absent.
    pub fn get_token_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .get_token(false)?
            .and_then(|token| token.get(key).cloned()))
    }

    fn string_value(&self, token: Option<&Token>, key: &str) -> Result<Option<String>> {
        match token {
            Some(token) => Ok(token.nullable_string_field(key)?.map(str::to_string)),
            None => self
                .get_token_value(key)?
                .filter(|value| !value.is_null())
                .map(|value| tokens::as_str(key, &value).map(str::to_string))
                .transpose(),
        }
    }

    /// Access token of `token`, or of the stored token when `None` is given.
    ///
    /// An explicit token missing the field is a [`TokenError::MissingField`];
    /// the stored-token lookup degrades to `Ok(None)` instead. A `null`
    /// value is `Ok(None)` on both paths.
    pub fn get_access_token(&self, token: Option<&Token>) -> Result<Option<String>> {
        self.string_value(token, ACCESS_TOKEN)
    }

    pub fn get_refresh_token(&self, token: Option<&Token>) -> Result<Option<String>> {
        self.string_value(token, REFRESH_TOKEN)
    }

    pub fn get_api_server(&self, token: Option<&Token>) -> Result<Option<String>> {
        self.string_value(token, API_SERVER)
    }

    pub fn get_token_type(&self, token: Option<&Token>) -> Result<Option<String>> {
        self.string_value(token, TOKEN_TYPE)
    }

    /// Modification time of the token file as it is on disk right now.
    pub fn modified_at(&self) -> Result<DateTime<Utc>> {
        let modified = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|e| TokenError::file_access(&self.path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Instant after which the token counts as expired.
    ///
    /// `expires_in` is taken from `token` when given, otherwise from the
    /// stored token. The baseline is always the token file's mtime, even for
    /// a token that did not come from that file.
    pub fn expires_at(&self, token: Option<&Token>) -> Result<Option<DateTime<Utc>>> {
        let expires_in = match token {
            Some(token) => token.expires_in()?,
            None => self
                .get_token_value(EXPIRES_IN)?
                .filter(|value| !value.is_null())
                .map(|value| tokens::as_seconds(&value))
                .transpose()?,
        };

        let Some(secs) = expires_in else {
            return Ok(None);
        };

        let modified = self.modified_at()?;
        tracing::debug!("Token file modified at {}, valid for {}s", modified, secs);

        // Saturate absurd lifetimes instead of overflowing
        let deadline = Duration::try_seconds(secs)
            .and_then(|lifetime| modified.checked_add_signed(lifetime))
            .unwrap_or(if secs > 0 {
                DateTime::<Utc>::MAX_UTC
            } else {
                DateTime::<Utc>::MIN_UTC
            });
        Ok(Some(deadline))
    }

    /// A token without `expires_in` is always expired.
    pub fn is_token_expired(&self, token: Option<&Token>) -> Result<bool> {
        self.is_token_expired_at(token, Utc::now())
    }

    pub fn is_token_expired_at(&self, token: Option<&Token>, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self.expires_at(token)? {
            Some(deadline) => now > deadline,
            None => true,
        })
    }
}
