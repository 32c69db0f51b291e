use std::sync::Arc;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    config::ResolverConfig,
    error::Result,
    retry::RetryExecutor,
    select::Quality,
    session::Session,
    twitch::{
        cdn::{PlaylistHost, build_playlist_request},
        utils::{extract_channel, init_http_client},
    },
};

pub mod api;
pub mod cdn;
pub mod structs;
pub mod utils;

/// Resolves live channels into playable HLS variants
///
/// Cheap to clone and safe to share between concurrent resolutions; the only
/// shared state is the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<ResolverConfig>,
    client: reqwest::Client,
    executor: RetryExecutor,
}

impl Resolver {
    /// # Errors
    /// [`Error::Config`](crate::Error::Config) when the HTTP client can't be built
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let client = init_http_client(&config.user_agent, &config.http)?;
        let executor = RetryExecutor::new(config.backoff_schedule.clone());

        Ok(Self {
            config: Arc::new(config),
            client,
            executor,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `channel` (login or channel URL) into a session holding its variants
    ///
    /// Only a session with a non-empty variant list is ever returned.
    ///
    /// # Errors
    /// [`Error::InvalidChannel`](crate::Error::InvalidChannel) before any network call,
    /// otherwise see [`Resolver::resolve_into`]
    pub async fn resolve(
        &self,
        ct: &CancellationToken,
        channel: &str,
        quality: Quality,
        host: PlaylistHost,
    ) -> Result<Session> {
        let mut session = Session::new(extract_channel(channel)?, quality);
        self.resolve_into(ct, &mut session, host).await?;
        Ok(session)
    }

    /// Runs the token exchange and playlist fetch against an existing session
    ///
    /// On failure the session keeps whatever it reached, and every failure is
    /// also appended to `session.errors`.
    ///
    /// # Errors
    /// Any pipeline failure: `Auth`, `Transport`, `StreamOffline`, `Upstream`,
    /// `Parse`, `NoVariants`, `Config` or `Cancelled`
    #[instrument(skip(self, ct, session), fields(channel = %session.channel))]
    pub async fn resolve_into(
        &self,
        ct: &CancellationToken,
        session: &mut Session,
        host: PlaylistHost,
    ) -> Result<()> {
        let token = match self.get_access_token(ct, session).await {
            Ok(token) => token,
            Err(e) => return Err(session.record(e)),
        };
        session.token = Some(token.clone());

        let request = match build_playlist_request(&self.config, &session.channel, &token, host) {
            Ok(request) => request,
            Err(e) => return Err(session.record(e)),
        };

        let fetched = self.fetch_variants(ct, &session.channel, &request).await;
        let variants = match fetched {
            Ok(variants) => variants,
            Err(e) => return Err(session.record(e)),
        };
        info!("Resolved {} variants", variants.len());
        session.variants = Some(variants);

        Ok(())
    }

    /// Signed master playlist URL for `channel`, without fetching it
    ///
    /// # Errors
    /// Same as the token exchange and URL building steps of [`Resolver::resolve_into`]
    pub async fn master_playlist_url(
        &self,
        ct: &CancellationToken,
        channel: &str,
        host: PlaylistHost,
    ) -> Result<Url> {
        let mut session = Session::new(extract_channel(channel)?, Quality::default());
        let token = self.get_access_token(ct, &mut session).await?;
        let request = build_playlist_request(&self.config, &session.channel, &token, host)?;
        Ok(request.url)
    }
}
