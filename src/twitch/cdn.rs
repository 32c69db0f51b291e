use m3u8_rs::{MasterPlaylist, Playlist, VariantStream};
use reqwest::{
    StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    config::{CHANNEL_PLACEHOLDER, ResolverConfig},
    error::{Error, Result},
    retry::cancellable,
    twitch::{
        Resolver,
        structs::{AccessToken, Variant},
    },
};

/// Which host serves the master playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistHost {
    #[default]
    Primary,
    /// Proxy that wants its query string escaped and an opt-in header
    Relay,
}

/// Fully signed master playlist request, ready to be sent
#[derive(Debug, Clone)]
pub struct PlaylistRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

/// Builds the signed master playlist URL. No I/O.
///
/// The query is emitted in key order so the same inputs always yield the same bytes.
///
/// # Errors
/// [`Error::Config`] when a template lacks `{channel}`, doesn't parse as a URL, or the
/// relay header is unusable
pub fn build_playlist_request(
    config: &ResolverConfig,
    channel: &str,
    token: &AccessToken,
    host: PlaylistHost,
) -> Result<PlaylistRequest> {
    let template = match host {
        PlaylistHost::Primary => &config.usher_url_template,
        PlaylistHost::Relay => &config.relay.url_template,
    };
    if !template.contains(CHANNEL_PLACEHOLDER) {
        return Err(Error::Config(format!(
            "playlist url template `{template}` is missing {CHANNEL_PLACEHOLDER}"
        )));
    }

    let mut url = Url::parse(&template.replace(CHANNEL_PLACEHOLDER, channel))
        .map_err(|e| Error::Config(format!("Parsing playlist url template: {e}")))?;
    url.query_pairs_mut()
        .clear()
        .extend_pairs(playlist_query(token));

    let mut headers = HeaderMap::new();
    if host == PlaylistHost::Relay {
        // The relay forwards its own path verbatim, so the query has to travel inside it
        let escaped = url.as_str().replacen('?', "%3F", 1);
        url = Url::parse(&escaped)
            .map_err(|e| Error::Config(format!("Escaping relay playlist url: {e}")))?;

        let name = HeaderName::from_bytes(config.relay.header_name.as_bytes())
            .map_err(|e| Error::Config(format!("Relay header name: {e}")))?;
        let value = HeaderValue::from_str(&config.relay.header_value)
            .map_err(|e| Error::Config(format!("Relay header value: {e}")))?;
        headers.insert(name, value);
    }

    Ok(PlaylistRequest { url, headers })
}

/// Query parameters the usher endpoint expects, sorted by key
fn playlist_query(token: &AccessToken) -> [(&'static str, &str); 10] {
    [
        ("allow_source", "true"),
        ("cdm", "wv"),
        ("fast_bread", "true"),
        ("p", "1234567890"),
        ("player_backend", "mediaplayer"),
        ("player_type", "embed"),
        ("player_version", "1.2.0"),
        ("sig", &token.signature),
        ("supported_codecs", "vp09,avc1"),
        ("token", &token.value),
    ]
}

/// Decodes a multivariant playlist into variants, keeping upstream order
///
/// # Errors
/// [`Error::Parse`] on malformed input, a media playlist or a variant without a rendition name.
/// [`Error::NoVariants`] when the playlist lists nothing.
pub fn parse_variants(body: &[u8]) -> Result<Vec<Variant>> {
    let playlist = match m3u8_rs::parse_playlist_res(body) {
        Ok(Playlist::MasterPlaylist(pl)) => pl,
        Ok(Playlist::MediaPlaylist(_)) => {
            return Err(Error::Parse(
                "expected a multivariant playlist, got a media playlist".to_string(),
            ));
        }
        Err(e) => return Err(Error::Parse(e.to_string())),
    };

    let variants = playlist
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .map(|v| -> Result<Variant> {
            let name = rendition_name(&playlist, v).ok_or_else(|| {
                Error::Parse(format!("variant `{}` has no associated rendition", v.uri))
            })?;
            Ok(Variant {
                name,
                resolution: v.resolution.map(|r| r.to_string()).unwrap_or_default(),
                frame_rate: v.frame_rate.unwrap_or_default(),
                url: v.uri.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if variants.is_empty() {
        return Err(Error::NoVariants);
    }
    Ok(variants)
}

/// First `EXT-X-MEDIA` name of the variant's group, or the group id itself
fn rendition_name(playlist: &MasterPlaylist, variant: &VariantStream) -> Option<String> {
    let group = variant.video.as_deref().or(variant.audio.as_deref())?;
    let name = playlist
        .alternatives
        .iter()
        .find(|a| a.group_id == group)
        .map_or(group, |a| a.name.as_str());
    Some(name.to_string())
}

impl Resolver {
    /// Fetches the stream's master .m3u8 file and turns it into variants
    ///
    /// # Errors
    /// - [`Error::StreamOffline`] on 404, which is never retried
    /// - [`Error::Upstream`] on any other non-200 status
    /// - [`Error::Parse`] / [`Error::NoVariants`] for an unusable body
    /// - [`Error::Transport`] / [`Error::Cancelled`] while sending or reading the body
    #[instrument(skip(self, ct, request))]
    pub async fn fetch_variants(
        &self,
        ct: &CancellationToken,
        channel: &str,
        request: &PlaylistRequest,
    ) -> Result<Vec<Variant>> {
        debug!(host = request.url.host_str(), "Fetching master playlist");
        let res = self
            .executor
            .execute(ct, || {
                self.client
                    .get(request.url.clone())
                    .headers(request.headers.clone())
            })
            .await?;

        match res.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(Error::StreamOffline {
                    channel: channel.to_string(),
                });
            }
            status => {
                let body = match cancellable(ct, res.text()).await? {
                    Ok(body) => body,
                    Err(e) => format!("<unreadable body: {e}>"),
                };
                return Err(Error::Upstream { status, body });
            }
        }

        let body = cancellable(ct, res.bytes()).await??;
        let variants = parse_variants(&body)?;
        info!(
            "Available qualities: {}",
            variants
                .iter()
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(variants)
    }
}
