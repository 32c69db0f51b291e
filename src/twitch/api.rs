use reqwest::{StatusCode, header::CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    Session,
    error::{Error, Result},
    retry::cancellable,
    twitch::{
        Resolver,
        structs::{
            AccessToken, GraphQLQuery, PlaybackAccessTokenResponse, PlaybackAccessTokenVariables,
        },
    },
};

const PLAYBACK_ACCESS_TOKEN_OPERATION: &str = "PlaybackAccessToken_Template";
const PLAYBACK_ACCESS_TOKEN_QUERY: &str = r#"query PlaybackAccessToken_Template($login: String!, $isLive: Boolean!, $vodID: ID!, $isVod: Boolean!, $playerType: String!) {  streamPlaybackAccessToken(channelName: $login, params: {platform: "web", playerBackend: "mediaplayer", playerType: $playerType}) @include(if: $isLive) {    value    signature    __typename  }  videoPlaybackAccessToken(id: $vodID, params: {platform: "web", playerBackend: "mediaplayer", playerType: $playerType}) @include(if: $isVod) {    value    signature    __typename  }}"#;

/// Builds the live stream access token query for `login`
#[must_use]
pub const fn playback_access_token_query(login: &str) -> GraphQLQuery<'_> {
    GraphQLQuery {
        operation_name: PLAYBACK_ACCESS_TOKEN_OPERATION,
        query: PLAYBACK_ACCESS_TOKEN_QUERY,
        variables: PlaybackAccessTokenVariables {
            login,
            is_live: true,
            player_type: "site",
            vod_id: "",
            is_vod: false,
        },
    }
}

impl Resolver {
    /// Fetches the access token used to sign the channel's master playlist URL
    ///
    /// Transport failures land on `session.errors` before being reported as [`Error::Auth`].
    ///
    /// # Errors
    /// [`Error::Auth`] for a non-200 response, an undecodable body, a missing
    /// token or an exhausted retry schedule. [`Error::Cancelled`] when `ct` fires.
    #[instrument(skip(self, ct, session), fields(channel = %session.channel))]
    pub async fn get_access_token(
        &self,
        ct: &CancellationToken,
        session: &mut Session,
    ) -> Result<AccessToken> {
        let body = serde_json::to_vec(&playback_access_token_query(&session.channel))
            .map_err(|e| Error::Auth {
                status: None,
                detail: format!("Encoding access token query: {e}"),
            })?;

        let res = match self
            .executor
            .execute(ct, || {
                self.client
                    .post(&self.config.gql_url)
                    .header("Client-ID", &self.config.client_id)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone())
            })
            .await
        {
            Ok(res) => res,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                let detail = e.to_string();
                session.errors.push(e);
                return Err(Error::Auth {
                    status: None,
                    detail,
                });
            }
        };

        let status = res.status();
        let text = cancellable(ct, res.text()).await?.map_err(|e| Error::Auth {
            status: Some(status),
            detail: format!("Reading access token response: {e}"),
        })?;

        if status != StatusCode::OK {
            return Err(Error::Auth {
                status: Some(status),
                detail: text,
            });
        }

        let parsed = serde_json::from_str::<PlaybackAccessTokenResponse>(&text).map_err(|e| {
            Error::Auth {
                status: Some(status),
                detail: format!("Decoding access token response: {e}: {text}"),
            }
        })?;

        let Some(token) = parsed.data.stream_playback_access_token else {
            return Err(Error::Auth {
                status: Some(status),
                detail: "`streamPlaybackAccessToken` does not exist. The channel might not exist!"
                    .to_string(),
            });
        };
        debug!("Got stream playback access token");

        Ok(token)
    }
}
