//! Token record and structural checks

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TokenError};

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const API_SERVER: &str = "api_server";
pub const TOKEN_TYPE: &str = "token_type";
pub const EXPIRES_IN: &str = "expires_in";

/// Keys that must all be present for a token to be usable.
pub const REQUIRED_FIELDS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, API_SERVER, TOKEN_TYPE];

/// A Questrade credential as stored in `questrade_token.json`.
///
/// Kept as the raw JSON object so that every key the provider sent survives
/// a read/print cycle, and so validity can be judged on key presence alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(Map<String, Value>);

impl Token {
    /// Build a token from the five well-known fields.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        api_server: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: Option<i64>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert(ACCESS_TOKEN.to_string(), Value::String(access_token.into()));
        fields.insert(REFRESH_TOKEN.to_string(), Value::String(refresh_token.into()));
        fields.insert(API_SERVER.to_string(), Value::String(api_server.into()));
        fields.insert(TOKEN_TYPE.to_string(), Value::String(token_type.into()));
        if let Some(secs) = expires_in {
            fields.insert(EXPIRES_IN.to_string(), Value::from(secs));
        }
        Self(fields)
    }

    /// Wrap an arbitrary JSON value. Only objects make a token.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Strict lookup of a string field. A `null` value counts as missing.
    pub fn string_field(&self, key: &str) -> Result<&str> {
        self.nullable_string_field(key)?
            .ok_or_else(|| TokenError::MissingField(key.to_string()))
    }

    /// Strict lookup that tells an absent key from a `null` value: the
    /// former is [`TokenError::MissingField`], the latter `Ok(None)`.
    pub fn nullable_string_field(&self, key: &str) -> Result<Option<&str>> {
        let value = self
            .get(key)
            .ok_or_else(|| TokenError::MissingField(key.to_string()))?;
        non_null(value).map(|v| as_str(key, v)).transpose()
    }

    pub fn access_token(&self) -> Result<&str> {
        self.string_field(ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Result<&str> {
        self.string_field(REFRESH_TOKEN)
    }

    pub fn api_server(&self) -> Result<&str> {
        self.string_field(API_SERVER)
    }

    pub fn token_type(&self) -> Result<&str> {
        self.string_field(TOKEN_TYPE)
    }

    /// Validity in seconds, `None` when the key is absent or `null`.
    pub fn expires_in(&self) -> Result<Option<i64>> {
        self.get(EXPIRES_IN)
            .and_then(non_null)
            .map(as_seconds)
            .transpose()
    }

    /// All required keys present. Values are not inspected.
    pub fn is_valid(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|key| self.contains(key))
    }
}

/// `None` is never valid.
pub fn is_valid_token(token: Option<&Token>) -> bool {
    token.map_or(false, Token::is_valid)
}

/// `null` reads the same as an absent key.
pub(crate) fn non_null(value: &Value) -> Option<&Value> {
    (!value.is_null()).then_some(value)
}

pub(crate) fn as_str<'a>(key: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| TokenError::InvalidField {
        field: key.to_string(),
        expected: "a string",
    })
}

/// Whole seconds; `1800.0` is accepted, `1800.5` is not.
pub(crate) fn as_seconds(value: &Value) -> Result<i64> {
    let whole_float = || {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    };
    value.as_i64().or_else(whole_float).ok_or_else(|| TokenError::InvalidField {
        field: EXPIRES_IN.to_string(),
        expected: "an integer",
    })
}

/// Serialize `token` as one line of JSON. `None` is written as `null`.
pub fn write_token<W: Write>(mut writer: W, token: Option<&Token>) -> io::Result<()> {
    serde_json::to_writer(&mut writer, &token)?;
    writeln!(writer)
}

/// Print `token` as JSON on stdout.
pub fn print_token(token: Option<&Token>) -> io::Result<()> {
    let stdout = io::stdout();
    write_token(stdout.lock(), token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Token {
        Token::new(
            "access-123",
            "refresh-456",
            "https://api01.iq.questrade.com/",
            "Bearer",
            Some(1800),
        )
    }

    #[test]
    fn test_valid_with_all_required_fields() {
        let token = sample();
        assert!(token.is_valid());
        assert!(is_valid_token(Some(&token)));

        // expires_in is optional
        let mut token = sample();
        token.remove(EXPIRES_IN);
        assert!(is_valid_token(Some(&token)));
    }

    #[test]
    fn test_invalid_when_any_required_field_missing() {
        for key in REQUIRED_FIELDS {
            let mut token = sample();
            token.remove(key);
            assert!(!is_valid_token(Some(&token)), "missing {} still valid", key);
        }
        assert!(!is_valid_token(None));
        assert!(!is_valid_token(Some(&Token::default())));
    }

    #[test]
    fn test_validity_is_key_presence_only() {
        let token = Token::from_value(json!({
            "access_token": null,
            "refresh_token": "",
            "api_server": 42,
            "token_type": false
        }))
        .unwrap();
        assert!(token.is_valid());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Token::from_value(json!(null)).is_none());
        assert!(Token::from_value(json!(["access_token"])).is_none());
        assert!(Token::from_value(json!("token")).is_none());
        assert!(Token::from_value(json!({})).is_some());
    }

    #[test]
    fn test_strict_accessors() {
        let token = sample();
        assert_eq!(token.access_token().unwrap(), "access-123");
        assert_eq!(token.refresh_token().unwrap(), "refresh-456");
        assert_eq!(
            token.api_server().unwrap(),
            "https://api01.iq.questrade.com/"
        );
        assert_eq!(token.token_type().unwrap(), "Bearer");
        assert_eq!(token.expires_in().unwrap(), Some(1800));

        let mut token = sample();
        token.remove(ACCESS_TOKEN);
        token.remove(EXPIRES_IN);
        match token.access_token() {
            Err(TokenError::MissingField(field)) => assert_eq!(field, ACCESS_TOKEN),
            other => panic!("expected MissingField, got {:?}", other),
        }
        assert_eq!(token.expires_in().unwrap(), None);
    }

    #[test]
    fn test_wrong_types_are_invalid_fields() {
        let token = Token::from_value(json!({
            "access_token": 7,
            "expires_in": "soon"
        }))
        .unwrap();
        assert!(matches!(
            token.access_token(),
            Err(TokenError::InvalidField { .. })
        ));
        assert!(matches!(
            token.expires_in(),
            Err(TokenError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_null_values_read_as_absent() {
        let token = Token::from_value(json!({
            "access_token": null,
            "refresh_token": "r",
            "api_server": "https://api01.iq.questrade.com/",
            "token_type": "Bearer",
            "expires_in": null
        }))
        .unwrap();

        assert_eq!(token.expires_in().unwrap(), None);
        assert_eq!(token.nullable_string_field(ACCESS_TOKEN).unwrap(), None);
        match token.access_token() {
            Err(TokenError::MissingField(field)) => assert_eq!(field, ACCESS_TOKEN),
            other => panic!("expected MissingField, got {:?}", other),
        }
        assert!(matches!(
            token.nullable_string_field("scope"),
            Err(TokenError::MissingField(_))
        ));
        assert_eq!(token.nullable_string_field(REFRESH_TOKEN).unwrap(), Some("r"));
    }

    #[test]
    fn test_whole_float_expires_in() {
        let mut token = sample();
        token.insert(EXPIRES_IN, json!(1800.0));
        assert_eq!(token.expires_in().unwrap(), Some(1800));

        token.insert(EXPIRES_IN, json!(1800.5));
        assert!(matches!(
            token.expires_in(),
            Err(TokenError::InvalidField { .. })
        ));

        token.insert(EXPIRES_IN, json!(1e300));
        assert!(matches!(
            token.expires_in(),
            Err(TokenError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_unknown_keys_survive_serialization() {
        let raw = json!({
            "access_token": "a",
            "refresh_token": "r",
            "api_server": "https://api05.iq.questrade.com/",
            "token_type": "Bearer",
            "expires_in": 1800,
            "scope": "read_acc"
        });
        let token: Token = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&token).unwrap(), raw);
    }

    #[test]
    fn test_write_token() {
        let mut out = Vec::new();
        write_token(&mut out, None).unwrap();
        assert_eq!(out, b"null\n");

        let mut out = Vec::new();
        write_token(&mut out, Some(&sample())).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        let back: Token = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(back, sample());
    }
}
