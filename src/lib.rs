//! Questrade token store
//!
//! Reads, validates and expiry-checks the OAuth token kept in
//! `~/questrade_token.json`, and drives the browser sign-in and refresh
//! calls that produce new tokens.

pub mod auth;
pub mod config;
pub mod error;

pub use auth::{
    is_valid_token, print_token, AuthConfig, AuthorizationFlow, QuestradeFlow, Token, TokenStore,
};
pub use config::Config;
pub use error::{Result, TokenError};
