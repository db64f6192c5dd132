use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AuthError, Error};
use crate::model::Credentials;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const REFERER: &str = "https://play.sooplive.co.kr/";
const ORIGIN: &str = "https://play.sooplive.co.kr";

const CHECK_TIMEOUT: Duration = Duration::from_secs(4);
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(3);

const LOGGED_IN: i64 = 1;

/// Platform API locations.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub vod: String,
    pub login: String,
    pub logout: String,
    pub check: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            vod: "https://api.m.sooplive.co.kr/station/video/a/view".to_string(),
            login: "https://login.sooplive.co.kr/app/LoginAction.php".to_string(),
            logout: "https://login.sooplive.co.kr/app/LogOut.php".to_string(),
            check: "https://afevent2.sooplive.co.kr/api/get_private_info.php".to_string(),
        }
    }
}

/// What the primary login `RESULT` code asks us to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginStep {
    Verify,
    SecondFactor,
}

pub(crate) fn classify_login_result(code: Option<i64>) -> Result<LoginStep, AuthError> {
    match code {
        Some(1) => Ok(LoginStep::Verify),
        Some(-1) => Err(AuthError::InvalidCredentials),
        Some(-3) => Err(AuthError::AccountDisabled),
        Some(-10) => Err(AuthError::Blocked),
        Some(-11) => Ok(LoginStep::SecondFactor),
        code => Err(AuthError::LoginFailed { code }),
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "RESULT")]
    result: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AuthCheckResponse {
    #[serde(rename = "CHANNEL")]
    channel: AuthChannel,
}

#[derive(Debug, Deserialize)]
struct AuthChannel {
    #[serde(rename = "IS_LOGIN")]
    is_login: i64,
}

/// One authenticated HTTP client for the whole run. Cookies set by login
/// responses live in the shared jar and are exported to ffmpeg as headers.
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    headers: HeaderMap,
    endpoints: Endpoints,
}

impl Session {
    pub fn new() -> Result<Self, Error> {
        Self::with_endpoints(Endpoints::default())
    }

    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::REFERER, HeaderValue::from_static(REFERER));
        headers.insert(header::ORIGIN, HeaderValue::from_static(ORIGIN));

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .default_headers(headers.clone())
            .cookie_provider(jar.clone())
            .build()
            .map_err(Error::http("client setup"))?;

        Ok(Self {
            client,
            jar,
            headers,
            endpoints,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Default request headers, minus the ones that describe a body.
    pub fn forwarded_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter(|(name, _)| !matches!(name.as_str(), "content-length" | "content-encoding"))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

    /// Every cookie in the jar visible to the platform hosts, as `name=value`.
    pub fn cookies(&self) -> Vec<String> {
        let mut cookies: Vec<String> = Vec::new();
        let endpoints = [
            &self.endpoints.login,
            &self.endpoints.vod,
            &self.endpoints.check,
            &self.endpoints.logout,
        ];
        for endpoint in endpoints {
            let Ok(url) = Url::parse(endpoint) else {
                continue;
            };
            let Some(value) = self.jar.cookies(&url) else {
                continue;
            };
            let Ok(value) = value.to_str() else {
                continue;
            };
            for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                if !cookies.iter().any(|c| c == pair) {
                    cookies.push(pair.to_string());
                }
            }
        }
        cookies
    }

    /// Lightweight logged-in probe. Never fails: any error means "not logged in".
    pub async fn check_auth(&self) -> bool {
        let response = match self
            .client
            .get(&self.endpoints.check)
            .timeout(CHECK_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Auth check failed: {}", e);
                return false;
            }
        };

        match response.json::<AuthCheckResponse>().await {
            Ok(body) => body.channel.is_login == LOGGED_IN,
            Err(e) => {
                log::debug!("Auth check returned an unexpected body: {}", e);
                false
            }
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<bool, AuthError> {
        if self.check_auth().await {
            log::info!("Session already logged in");
            return Ok(true);
        }

        log::info!("Logging in as {}", credentials.username);
        let form = [
            ("szWork", "login"),
            ("szType", "json"),
            ("szUid", credentials.username.as_str()),
            ("szPassword", credentials.password.as_str()),
            ("szScriptVar", "oLoginRet"),
            ("isSaveId", "false"),
            ("isSavePw", "false"),
            ("isSaveJoin", "false"),
            ("isLoginRetain", "N"),
        ];
        let response = self
            .client
            .post(&self.endpoints.login)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AuthError::Transport)?;

        let code = match response.json::<LoginResponse>().await {
            Ok(body) => body.result,
            Err(e) => {
                log::warn!("Login response could not be parsed: {}", e);
                None
            }
        };
        log::debug!("Login RESULT = {:?}", code);

        match classify_login_result(code)? {
            LoginStep::Verify => Ok(self.check_auth().await),
            LoginStep::SecondFactor => match credentials.secondary_password.as_deref() {
                Some(secondary) => self.secondary_login(&credentials.username, secondary).await,
                // The platform decides whether an empty second password is acceptable.
                None => self.secondary_login(&credentials.username, "").await,
            },
        }
    }

    pub async fn secondary_login(
        &self,
        username: &str,
        secondary_password: &str,
    ) -> Result<bool, AuthError> {
        log::info!("Submitting second factor for {}", username);
        let form = [
            ("szWork", "second_login"),
            ("szType", "json"),
            ("szUid", username),
            ("szPassword", secondary_password),
            ("szScriptVar", "oLoginRet"),
            ("isSaveId", "false"),
            ("isLoginRetain", "N"),
        ];
        let response = self
            .client
            .post(&self.endpoints.login)
            .form(&form)
            .send()
            .await
            .map_err(AuthError::Transport)?;

        if response.status() != StatusCode::OK {
            log::warn!("Second factor rejected with HTTP {}", response.status());
            return Err(AuthError::SecondFactorFailed);
        }
        match response.json::<LoginResponse>().await {
            Ok(LoginResponse { result: Some(1) }) => Ok(true),
            Ok(body) => {
                log::warn!("Second factor RESULT = {:?}", body.result);
                Err(AuthError::SecondFactorFailed)
            }
            Err(e) => {
                log::warn!("Second factor response could not be parsed: {}", e);
                Err(AuthError::SecondFactorFailed)
            }
        }
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.client
            .get(&self.endpoints.logout)
            .timeout(LOGOUT_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AuthError::Logout)?;
        log::info!("Logged out");
        Ok(())
    }
}
