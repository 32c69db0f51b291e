use std::sync::LazyLock;

use regex::Regex;

use crate::{
    config::HttpConfig,
    error::{Error, Result},
};

pub static CHANNEL_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?twitch\.tv/([^/?#]+)").expect("valid regex")
});

pub static CHANNEL_LOGIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{1,25}$").expect("valid regex"));

/// Extracts a channel login out from a user-inputted channel name or URL
///
/// # Errors
/// Errors when the input isn't a plausible Twitch login
pub fn extract_channel(input: &str) -> Result<String> {
    let input = input.trim();
    let candidate = CHANNEL_URL_REGEX
        .captures(input)
        .and_then(|c| c.get(1))
        .map_or(input, |m| m.as_str())
        .to_lowercase();

    if !CHANNEL_LOGIN_REGEX.is_match(&candidate) {
        return Err(Error::InvalidChannel(input.to_string()));
    }

    Ok(candidate)
}

/// Builds the HTTP client shared by every resolution
///
/// # Errors
/// [`Error::Config`] when the TLS backend can't be initialized or the user agent is not a valid header
pub fn init_http_client(user_agent: &str, http: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(http.request_timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(http.pool_idle_timeout)
        .build()
        .map_err(|e| Error::Config(format!("Unable to build HTTP client: {e}")))
}
