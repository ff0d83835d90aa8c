//! Account login and session cookie handling

use crate::downloader::retry::{send_with_retry, RetryPolicy};
use crate::utils::error::{NicoloaderError, Result};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Account login endpoint
pub const DEFAULT_LOGIN_URL: &str = "https://account.nicovideo.jp/api/v1/login?site=niconico";

/// Name of the cookie that proves a successful login
pub const SESSION_COOKIE: &str = "user_session";

/// Account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_identifier: user_identifier.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_identifier", &self.user_identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session, valid for the lifetime of the process
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for a `Cookie:` request header
    pub fn cookie_header(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// Performs the login handshake
pub struct SessionClient {
    client: Client,
    login_url: Url,
    retry: RetryPolicy,
}

impl SessionClient {
    pub fn new(login_url: Url, retry: RetryPolicy) -> Result<Self> {
        // The session cookie is set on the redirect response itself.
        let client = Client::builder()
            .user_agent(concat!("nicoloader/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            login_url,
            retry,
        })
    }

    pub fn with_default_endpoint(retry: RetryPolicy) -> Result<Self> {
        let login_url = Url::parse(DEFAULT_LOGIN_URL)
            .map_err(|e| NicoloaderError::Config(format!("bad login endpoint: {}", e)))?;
        Self::new(login_url, retry)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Post credentials and extract the session cookie
    #[instrument(skip_all, fields(user = %credentials.user_identifier))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        debug!("Logging in via {}", self.login_url);

        let form = [
            ("mail_tel", credentials.user_identifier.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = send_with_retry(&self.retry, || {
            self.client.post(self.login_url.clone()).form(&form)
        })
        .await?;

        let status = response.status();
        if status.is_server_error() {
            warn!("Login endpoint still failing after retries: {}", status);
            return Err(NicoloaderError::HttpStatus {
                status,
                url: self.login_url.to_string(),
            });
        }

        let token = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty() && value != "deleted");

        match token {
            Some(token) => {
                info!("Logged in");
                Ok(Session::new(token))
            }
            None => Err(NicoloaderError::AuthenticationFailed(format!(
                "login returned {} without a {} cookie",
                status, SESSION_COOKIE
            ))),
        }
    }
}
