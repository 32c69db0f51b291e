#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use live_squirrel::{
    HttpConfig, PlaylistHost, Quality, RelayConfig, Resolver, ResolverConfig, Session,
    extract_channel,
    config::{BROWSER_USER_AGENT, TWITCH_GQL_URL, TWITCH_PUBLIC_CLIENT_ID, TWITCH_USHER_URL_TEMPLATE},
    util::{init_tracing, spawn_ct_watcher},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Gets the m3u8 HTTP Live Streaming (HLS) direct URL of a live stream on twitch.tv
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Twitch channel name / URL
    channel: String,

    /// `best`, `worst`, `audio` or an exact resolution like `1280x720`
    #[arg(short, long, default_value = "best", env = "LIVE_SQUIRREL_QUALITY")]
    quality: String,

    /// How to print the selected variant
    #[arg(short, long, value_enum, default_value_t = Format::Url)]
    format: Format,

    /// Print the signed master playlist URL instead
    #[arg(short, long, conflicts_with = "list")]
    master: bool,

    /// Print every available variant instead of selecting one
    #[arg(short, long)]
    list: bool,

    /// Fetch the playlist through the relay host
    #[arg(long, env = "LIVE_SQUIRREL_RELAY")]
    relay: bool,

    /// Comma separated backoff schedule in milliseconds
    #[arg(long, default_value = "1000,2000,3000", env = "LIVE_SQUIRREL_BACKOFF_MS")]
    backoff_ms: String,

    /// Per request timeout in seconds
    #[arg(long, default_value_t = 3, env = "LIVE_SQUIRREL_TIMEOUT")]
    timeout: u64,

    #[arg(long, default_value = TWITCH_PUBLIC_CLIENT_ID, env = "TWITCH_CLIENT_ID", hide = true)]
    client_id: String,

    #[arg(long, default_value = BROWSER_USER_AGENT, env = "LIVE_SQUIRREL_USER_AGENT", hide = true)]
    user_agent: String,

    #[arg(long, default_value = TWITCH_GQL_URL, env = "LIVE_SQUIRREL_GQL_URL", hide = true)]
    gql_url: String,

    #[arg(long, default_value = TWITCH_USHER_URL_TEMPLATE, env = "LIVE_SQUIRREL_USHER_URL", hide = true)]
    usher_url: String,

    #[arg(long, env = "LIVE_SQUIRREL_RELAY_URL", hide = true)]
    relay_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Url,
    Json,
    Text,
}

impl Args {
    fn config(&self) -> Result<ResolverConfig> {
        let backoff_schedule = ResolverConfig::parse_backoff_schedule(&self.backoff_ms)
            .context("Parsing backoff schedule")?;

        let mut relay = RelayConfig::default();
        if let Some(url) = &self.relay_url {
            relay.url_template.clone_from(url);
        }

        Ok(ResolverConfig {
            gql_url: self.gql_url.clone(),
            client_id: self.client_id.clone(),
            user_agent: self.user_agent.clone(),
            usher_url_template: self.usher_url.clone(),
            relay,
            backoff_schedule,
            http: HttpConfig {
                request_timeout: Duration::from_secs(self.timeout),
                ..HttpConfig::default()
            },
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(if args.verbose { "debug" } else { "warn" });

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let resolver = Resolver::new(args.config()?).context("Initializing resolver")?;
    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    let host = if args.relay {
        PlaylistHost::Relay
    } else {
        PlaylistHost::Primary
    };

    if args.master {
        let url = resolver
            .master_playlist_url(&ct, &args.channel, host)
            .await
            .context("Building master playlist URL")?;
        println!("{url}");
        return Ok(());
    }

    let quality = args.quality.parse::<Quality>()?;
    info!("Resolving {} at {quality} quality", args.channel);
    let mut session = Session::new(extract_channel(&args.channel)?, quality);
    if let Err(e) = resolver.resolve_into(&ct, &mut session, host).await {
        debug!("Session errors: {:?}", session.errors);
        return Err(e).context("Resolving live stream");
    }

    if args.list {
        for v in session.variants() {
            println!("{}\t{}\t{}\t{}", v.name, v.resolution, v.frame_rate, v.url);
        }
        return Ok(());
    }

    let result = session.select().context("Selecting variant")?;
    match args.format {
        Format::Url => println!("{}", result.as_url()),
        Format::Json => println!("{}", result.to_json()?),
        Format::Text => println!("{result}"),
    }

    Ok(())
}
