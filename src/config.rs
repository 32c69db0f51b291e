use std::time::Duration;

// https://github.com/SuperSonicHub1/twitch-graphql-api#getting-your-client-id
pub const TWITCH_PUBLIC_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";
pub const TWITCH_GQL_URL: &str = "https://gql.twitch.tv/gql";
pub const TWITCH_USHER_URL_TEMPLATE: &str =
    "https://usher.ttvnw.net/api/channel/hls/{channel}.m3u8";

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:86.0) Gecko/20100101 Firefox/86.0";

/// Placeholder substituted with the channel login in URL templates
pub const CHANNEL_PLACEHOLDER: &str = "{channel}";

/// Everything the pipeline needs, handed over once at [`Resolver`](crate::Resolver) construction
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub gql_url: String,
    pub client_id: String,
    pub user_agent: String,
    pub usher_url_template: String,
    pub relay: RelayConfig,
    /// One wait per attempt; the length bounds the attempt count
    pub backoff_schedule: Vec<Duration>,
    pub http: HttpConfig,
}

/// Alternate playlist host
///
/// The relay wants its own query string percent-escaped and an opt-in header.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url_template: String,
    pub header_name: String,
    pub header_value: String,
}

/// Transport and connection pool settings of the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            gql_url: TWITCH_GQL_URL.to_string(),
            client_id: TWITCH_PUBLIC_CLIENT_ID.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            usher_url_template: TWITCH_USHER_URL_TEMPLATE.to_string(),
            relay: RelayConfig::default(),
            backoff_schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
            ],
            http: HttpConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url_template: "https://api.ttv.lol/playlist/{channel}.m3u8".to_string(),
            header_name: "X-Donate-To".to_string(),
            header_value: "https://ttv.lol/donate".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(3),
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ResolverConfig {
    /// Parses a comma separated list of milliseconds, e.g. `1000,2000,3000`
    ///
    /// # Errors
    /// Errors when any entry is not an integer
    pub fn parse_backoff_schedule(input: &str) -> Result<Vec<Duration>, std::num::ParseIntError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().map(Duration::from_millis))
            .collect()
    }
}
