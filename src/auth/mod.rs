//! Authentication module for the Questrade API
//!
//! Keeps the locally stored token (`questrade_token.json`) and talks to the
//! Questrade login service for interactive sign-in and token refresh.

pub mod flow;
pub mod store;
pub mod tokens;

pub use flow::{AuthorizationFlow, QuestradeFlow};
pub use store::TokenStore;
pub use tokens::{is_valid_token, print_token, write_token, Token};

use serde::{Deserialize, Serialize};

/// Questrade login endpoints and the browser used for interactive sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Page where the user signs in and authorizes API access
    pub sign_in_url: String,
    /// OAuth2 token endpoint used for refresh
    pub token_url: String,
    /// Browser executable launched for interactive sign-in
    pub browser: String,
    /// Arguments passed to the browser before the URL
    pub browser_args: Vec<String>,
}

impl AuthConfig {
    /// Config for live accounts
    pub fn live() -> Self {
        Self {
            sign_in_url: "https://login.questrade.com/Signin.aspx?ReturnUrl=%2fAPIAccess%2f"
                .to_string(),
            token_url: "https://login.questrade.com/oauth2/token".to_string(),
            browser: "firefox".to_string(),
            browser_args: vec!["--new-tab".to_string()],
        }
    }

    /// Config for practice accounts
    pub fn practice() -> Self {
        Self {
            sign_in_url:
                "https://practicelogin.questrade.com/Signin.aspx?ReturnUrl=%2fAPIAccess%2f"
                    .to_string(),
            token_url: "https://practicelogin.questrade.com/oauth2/token".to_string(),
            ..Self::live()
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::live()
    }
}
