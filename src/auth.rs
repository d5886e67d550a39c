//! Credentials and the authenticators that produce them.
//!
//! The request pipeline only ever calls [`Authenticator::authenticate`]: once
//! while creating a [`Spreadsheet`](crate::Spreadsheet), and once more per
//! request that comes back `401 Unauthorized`.

use crate::error::Error;
use crate::util::{DEFAULT_TIMEOUT, http_client};

/// Default OAuth2 token endpoint for [`OAuth2Refresh`].
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// An access token plus the scheme it is presented with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// Authorization scheme, e.g. `Bearer`.
    pub token_type: String,
    pub token: String,
}

impl AuthToken {
    pub fn new(token_type: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token_type: token_type.into(),
            token: token.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new("Bearer", token)
    }

    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.token.trim())
    }
}

/// What an authenticator is told about the session asking for a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    /// Unset while the spreadsheet is still being looked up by name.
    pub spreadsheet_id: Option<String>,
    pub worksheet_id: Option<String>,
    pub use_cell_text_values: bool,
    pub use_https: bool,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, params: &AuthParams) -> Result<AuthToken, Error>;
}

/// A fixed access token. Re-authenticating hands back the same token.
impl Authenticator for AuthToken {
    fn authenticate(&self, _params: &AuthParams) -> Result<AuthToken, Error> {
        Ok(self.clone())
    }
}

impl<F> Authenticator for F
where
    F: Fn(&AuthParams) -> Result<AuthToken, Error> + Send + Sync,
{
    fn authenticate(&self, params: &AuthParams) -> Result<AuthToken, Error> {
        self(params)
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges an OAuth2 refresh token for a fresh access token on every call.
#[derive(Debug, Clone)]
pub struct OAuth2Refresh {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_url: String,
    http: reqwest::blocking::Client,
}

impl OAuth2Refresh {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(
            client_id,
            client_secret,
            refresh_token,
            http_client(DEFAULT_TIMEOUT)?,
        ))
    }

    /// Uses an already configured client for the token endpoint.
    pub fn with_client(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        http: reqwest::blocking::Client,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http,
        }
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

impl Authenticator for OAuth2Refresh {
    fn authenticate(&self, _params: &AuthParams) -> Result<AuthToken, Error> {
        log::debug!("refreshing access token at {}", self.token_url);

        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .map_err(|e| Error::Auth(format!("token request failed: {}", e)))?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&text) {
                return Err(Error::Auth(format!(
                    "token endpoint returned HTTP {}: {}{}{}",
                    status.as_u16(),
                    err.error,
                    if err.error_description.is_some() { ": " } else { "" },
                    err.error_description.as_deref().unwrap_or("")
                )));
            }
            return Err(Error::Auth(format!(
                "token endpoint returned HTTP {}\n{}",
                status.as_u16(),
                text
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Auth(format!("failed to parse token response: {}", e)))?;
        if let Some(secs) = token.expires_in {
            log::debug!("access token valid for {}s", secs);
        }

        Ok(AuthToken::new(
            token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            token.access_token,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AuthParams {
        AuthParams {
            spreadsheet_id: Some("sheet".into()),
            worksheet_id: Some("od6".into()),
            use_cell_text_values: true,
            use_https: true,
        }
    }

    #[test]
    fn test_header_value() {
        assert_eq!(AuthToken::bearer("abc").header_value(), "Bearer abc");
        assert_eq!(
            AuthToken::new("GoogleLogin", "auth=xyz\n").header_value(),
            "GoogleLogin auth=xyz"
        );
    }

    #[test]
    fn test_static_token_returns_itself() {
        let token = AuthToken::bearer("fixed");
        assert_eq!(token.authenticate(&params()).unwrap(), token);
    }

    #[test]
    fn test_closure_sees_params() {
        let auth = |p: &AuthParams| -> Result<AuthToken, Error> {
            Ok(AuthToken::bearer(format!(
                "{}-{}",
                p.spreadsheet_id.as_deref().unwrap_or(""),
                p.worksheet_id.as_deref().unwrap_or("")
            )))
        };
        assert_eq!(auth.authenticate(&params()).unwrap().token, "sheet-od6");
    }

    #[test]
    fn test_oauth2_refresh_builds_its_client() {
        let auth = OAuth2Refresh::new("client", "secret", "refresh").unwrap();
        assert_eq!(auth.token_url, DEFAULT_TOKEN_URL);

        let http = reqwest::blocking::Client::builder().build().unwrap();
        let auth = OAuth2Refresh::with_client("client", "secret", "refresh", http)
            .with_token_url("http://127.0.0.1/token");
        assert_eq!(auth.client_id, "client");
        assert_eq!(auth.token_url, "http://127.0.0.1/token");
    }
}
