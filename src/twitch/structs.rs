use serde::{Deserialize, Serialize};

/// Rendition name Twitch gives the audio-only variant
pub const AUDIO_ONLY: &str = "audio_only";

/// Signed token pair authorizing a single playlist fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub signature: String,
    pub value: String,
}

/// One quality rendition of the live stream, in upstream order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    /// `WIDTHxHEIGHT`, empty for audio only
    pub resolution: String,
    /// Zero for audio only
    pub frame_rate: f64,
    pub url: String,
}

impl Variant {
    #[must_use]
    pub fn is_audio_only(&self) -> bool {
        self.name == AUDIO_ONLY
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLQuery<'a> {
    pub operation_name: &'static str,
    pub query: &'static str,
    pub variables: PlaybackAccessTokenVariables<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackAccessTokenVariables<'a> {
    pub login: &'a str,
    pub is_live: bool,
    pub player_type: &'static str,
    #[serde(rename = "vodID")]
    pub vod_id: &'static str,
    pub is_vod: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackAccessTokenResponse {
    pub data: PlaybackAccessTokenData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackAccessTokenData {
    /// `null` when the channel does not exist
    pub stream_playback_access_token: Option<AccessToken>,
}
