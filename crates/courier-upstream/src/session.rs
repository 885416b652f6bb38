//! Credentialed upstream session with captcha solving and transparent
//! re-authentication.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;

use crate::UpstreamError;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SCAN_ROW_CAP: usize = 20;
const DEFAULT_FRESHNESS_WINDOW_SECS: i64 = 1_800;
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static CAPTCHA_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<label[^>]*for="capt"[^>]*>(.*?)</label>"#).expect("captcha label pattern")
});
static ARITHMETIC_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*\+\s*(\d+)").expect("arithmetic pattern"));
static FORM_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("form input pattern"));
static INPUT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)name\s*=\s*["']([^"']+)["']"#).expect("name attr pattern"));
static INPUT_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)value\s*=\s*["']([^"']*)["']"#).expect("value attr pattern")
});
static PAGE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern"));

/// Connection and scan parameters for one upstream provider.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Site root, e.g. `http://198.51.100.7`.
    pub base_url: String,
    /// Login form path, e.g. `/ints/login`.
    pub login_path: String,
    /// SMS records path (HTML page and data endpoint share it).
    pub data_path: String,
    pub username: String,
    pub password: String,
    pub http_timeout: Duration,
    /// Maximum table rows consumed per scan cycle.
    pub scan_row_cap: usize,
    /// Records older than this are dropped as stale.
    pub freshness_window_secs: i64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            login_path: "/ints/login".to_string(),
            data_path: "/ints/client/SMSCDRStats".to_string(),
            username: String::new(),
            password: String::new(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            scan_row_cap: DEFAULT_SCAN_ROW_CAP,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
        }
    }
}

impl UpstreamConfig {
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }

    pub fn data_url(&self) -> String {
        join_url(&self.base_url, &self.data_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// One logged-in browser-like session against the provider.
///
/// Cookies live inside the reqwest client; `teardown` drops them by
/// rebuilding the client, which is what a supervisor restart does.
pub struct UpstreamSession {
    config: UpstreamConfig,
    client: Client,
    logged_in: bool,
}

impl UpstreamSession {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = build_client(config.http_timeout)?;
        Ok(Self {
            config,
            client,
            logged_in: false,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Performs the full credentialed handshake.
    ///
    /// Success is a disjunction of signals so a cosmetic page change
    /// cannot break login detection: either the final URL left the login
    /// path, or the body carries dashboard/logout markers.
    pub async fn login(&mut self) -> Result<(), UpstreamError> {
        let login_url = self.config.login_url();
        let response = self
            .client
            .get(&login_url)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        let page = response.text().await.map_err(UpstreamError::from_reqwest)?;

        let mut form: Vec<(String, String)> = collect_form_fields(&page)
            .into_iter()
            .filter(|(name, _)| name != "username" && name != "password" && name != "capt")
            .collect();
        form.push(("username".to_string(), self.config.username.clone()));
        form.push(("password".to_string(), self.config.password.clone()));
        match solve_captcha(&page) {
            Some(answer) => form.push(("capt".to_string(), answer.to_string())),
            None => {
                tracing::warn!("no arithmetic challenge found on login page, submitting without it")
            }
        }

        let response = self
            .client
            .post(&login_url)
            .form(&form)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(UpstreamError::from_reqwest)?;

        if login_succeeded(&final_url, &self.config.login_path, &body) {
            tracing::info!(final_url, "upstream login succeeded");
            self.logged_in = true;
            return Ok(());
        }
        self.logged_in = false;
        Err(classify_login_failure(&body))
    }

    /// Fetches an authenticated page, re-authenticating once on a login
    /// bounce before surfacing failure.
    pub async fn fetch_authenticated(
        &mut self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, UpstreamError> {
        if !self.logged_in {
            self.login().await?;
        }
        for attempt in 0..2 {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(UpstreamError::from_reqwest)?;
            let final_url = response.url().to_string();
            let body = response.text().await.map_err(UpstreamError::from_reqwest)?;
            if !is_login_page(&final_url, &self.config.login_path, &body) {
                return Ok(body);
            }
            if attempt == 0 {
                tracing::warn!(url, "session expired mid-scan, re-authenticating");
                self.logged_in = false;
                self.login().await?;
            }
        }
        Err(UpstreamError::Network(
            "still on login page after re-authentication".to_string(),
        ))
    }

    /// Drops session state (cookies included) deterministically.
    pub fn teardown(&mut self) -> Result<(), UpstreamError> {
        self.logged_in = false;
        self.client = build_client(self.config.http_timeout)?;
        Ok(())
    }
}

fn build_client(timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(UpstreamError::from_reqwest)
}

/// Solves the login page's `a + b = ?` challenge.
///
/// The labeled element is tried first; failing that, the whole page is
/// searched and the first arithmetic expression wins.
pub fn solve_captcha(page: &str) -> Option<u64> {
    if let Some(label) = CAPTCHA_LABEL.captures(page).and_then(|c| c.get(1)) {
        if let Some(answer) = first_arithmetic_sum(label.as_str()) {
            return Some(answer);
        }
    }
    first_arithmetic_sum(page)
}

fn first_arithmetic_sum(text: &str) -> Option<u64> {
    let captures = ARITHMETIC_EXPRESSION.captures(text)?;
    let a: u64 = captures.get(1)?.as_str().parse().ok()?;
    let b: u64 = captures.get(2)?.as_str().parse().ok()?;
    Some(a + b)
}

/// Collects `<input>` name/value defaults so hidden tokens survive the
/// form round-trip.
pub fn collect_form_fields(page: &str) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for input in FORM_INPUT.find_iter(page) {
        let tag = input.as_str();
        let Some(name) = INPUT_NAME.captures(tag).and_then(|c| c.get(1)) else {
            continue;
        };
        let value = INPUT_VALUE
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        fields.push((name.as_str().to_string(), value));
    }
    fields
}

fn login_succeeded(final_url: &str, login_path: &str, body: &str) -> bool {
    let url_lower = final_url.to_lowercase();
    let body_lower = body.to_lowercase();
    let off_login_path =
        !url_lower.contains(&login_path.to_lowercase()) && url_lower.contains("client");
    off_login_path
        || body_lower.contains("logout")
        || body_lower.contains("dashboard")
        || body_lower.contains("smscdrstats")
        || body_lower.contains("welcome")
}

fn classify_login_failure(body: &str) -> UpstreamError {
    let body_lower = body.to_lowercase();
    if body_lower.contains("username/password invalid")
        || body_lower.contains("invalid credentials")
    {
        UpstreamError::InvalidCredentials
    } else if body_lower.contains("captcha") {
        UpstreamError::CaptchaFailed("upstream reported captcha verification failure".to_string())
    } else {
        UpstreamError::Network("login response carried no success indicator".to_string())
    }
}

/// Detects a login bounce: a login-looking URL or a page title that
/// contains "login".
pub fn is_login_page(final_url: &str, login_path: &str, body: &str) -> bool {
    if final_url.to_lowercase().contains(&login_path.to_lowercase()) {
        return true;
    }
    PAGE_TITLE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|title| title.as_str().to_lowercase().contains("login"))
        .unwrap_or(false)
}
