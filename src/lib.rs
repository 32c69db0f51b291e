#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Resolves a playable HLS URL for a live Twitch.tv channel
//!
//! ```no_run
//! # async fn run() -> live_squirrel::Result<()> {
//! use live_squirrel::{PlaylistHost, Quality, Resolver, ResolverConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! let session = resolver
//!     .resolve(&CancellationToken::new(), "asmongold", Quality::Best, PlaylistHost::Primary)
//!     .await?;
//! println!("{}", session.select()?.as_url());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod retry;
pub mod select;
pub mod session;
pub mod twitch;
pub mod util;

pub use config::{HttpConfig, RelayConfig, ResolverConfig};
pub use error::{Error, Result};
pub use output::SelectionResult;
pub use retry::RetryExecutor;
pub use select::{Quality, select_variant};
pub use session::Session;
pub use twitch::{
    Resolver,
    cdn::{PlaylistHost, PlaylistRequest, build_playlist_request, parse_variants},
    structs::{AUDIO_ONLY, AccessToken, Variant},
    utils::extract_channel,
};
