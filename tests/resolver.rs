use std::time::{Duration, Instant};

use live_squirrel::{
    Error, PlaylistHost, Quality, RelayConfig, Resolver, ResolverConfig, RetryExecutor,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, path_regex, query_param},
};

const MASTER_PLAYLIST: &str = "#EXTM3U
#EXT-X-TWITCH-INFO:NODE=\"video-edge-c2a8b4.arn03\",MANIFEST-NODE-TYPE=\"weaver_cluster\"
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"chunked\",NAME=\"1080p60 (source)\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=8534030,RESOLUTION=1920x1080,CODECS=\"avc1.64002A,mp4a.40.2\",VIDEO=\"chunked\",FRAME-RATE=60.000
https://video-weaver.example/v1/playlist/chunked.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"480p30\",NAME=\"480p\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=1427999,RESOLUTION=852x480,CODECS=\"avc1.4D401F,mp4a.40.2\",VIDEO=\"480p30\",FRAME-RATE=30.000
https://video-weaver.example/v1/playlist/480p30.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"audio_only\",NAME=\"audio_only\",AUTOSELECT=NO,DEFAULT=NO
#EXT-X-STREAM-INF:BANDWIDTH=160000,CODECS=\"mp4a.40.2\",VIDEO=\"audio_only\"
https://video-weaver.example/v1/playlist/audio_only.m3u8
";

fn config(server: &MockServer) -> ResolverConfig {
    ResolverConfig {
        gql_url: format!("{}/gql", server.uri()),
        usher_url_template: format!("{}/api/channel/hls/{{channel}}.m3u8", server.uri()),
        relay: RelayConfig {
            url_template: format!("{}/playlist/{{channel}}.m3u8", server.uri()),
            ..RelayConfig::default()
        },
        backoff_schedule: vec![Duration::from_millis(10); 3],
        ..ResolverConfig::default()
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/gql"))
        .and(header("Client-ID", "kimne78kx3ncx6brgo4mv6wki5h1ko"))
        .and(body_partial_json(json!({
            "operationName": "PlaybackAccessToken_Template",
            "variables": { "login": "foo", "isLive": true, "isVod": false, "playerType": "site" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "streamPlaybackAccessToken": {
                    "value": "{\"channel\":\"foo\"}",
                    "signature": "deadbeef",
                    "__typename": "PlaybackAccessToken"
                }
            }
        })))
        .mount(server)
        .await;
}

/// A local port nothing listens on
fn refused_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Answers every request with `status_line` headers and the first byte of a
/// 1000 byte body, then either stalls or hangs up
async fn truncated_body_server(status_line: &'static str, stall: bool) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!("{status_line}\r\nContent-Length: 1000\r\n\r\n{{");
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                if stall {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
            });
        }
    });

    format!("http://{addr}")
}

fn long_timeout(config: ResolverConfig) -> ResolverConfig {
    ResolverConfig {
        http: live_squirrel::HttpConfig {
            request_timeout: Duration::from_secs(30),
            ..live_squirrel::HttpConfig::default()
        },
        ..config
    }
}

fn cancel_after(ct: &CancellationToken, delay: Duration) {
    let ct = ct.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        ct.cancel();
    });
}

#[tokio::test]
async fn resolves_live_channel() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/channel/hls/foo.m3u8"))
        .and(query_param("sig", "deadbeef"))
        .and(query_param("token", "{\"channel\":\"foo\"}"))
        .and(query_param("supported_codecs", "vp09,avc1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let session = resolver
        .resolve(
            &CancellationToken::new(),
            "https://www.twitch.tv/Foo",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await
        .unwrap();

    assert_eq!(session.channel, "foo");
    assert_eq!(session.token.as_ref().unwrap().signature, "deadbeef");
    assert!(session.errors.is_empty());

    let names = session
        .variants()
        .iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["1080p60 (source)", "480p", "audio_only"]);

    let best = session.select().unwrap();
    assert_eq!(best.url, "https://video-weaver.example/v1/playlist/chunked.m3u8");
    assert_eq!(best.resolution, "1920x1080");
    assert!((best.frame_rate - 60.0).abs() < f64::EPSILON);

    let worst = session.select_with(&Quality::Worst).unwrap();
    assert_eq!(worst.url, "https://video-weaver.example/v1/playlist/480p30.m3u8");
    let audio = session.select_with(&Quality::Audio).unwrap();
    assert_eq!(audio.url, "https://video-weaver.example/v1/playlist/audio_only.m3u8");
}

#[tokio::test]
async fn offline_channel_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/channel/hls/foo.m3u8"))
        .respond_with(ResponseTemplate::new(404).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let res = resolver
        .resolve(
            &CancellationToken::new(),
            "foo",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await;

    assert!(matches!(res, Err(Error::StreamOffline { channel }) if channel == "foo"));
}

#[tokio::test]
async fn failed_session_keeps_error_chain() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/channel/hls/foo.m3u8"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let mut session = live_squirrel::Session::new("foo", Quality::Best);
    let res = resolver
        .resolve_into(&CancellationToken::new(), &mut session, PlaylistHost::Primary)
        .await;

    assert!(matches!(
        res,
        Err(Error::Upstream { status, ref body }) if status.as_u16() == 503 && body == "overloaded"
    ));
    assert!(session.token.is_some());
    assert!(session.variants.is_none());
    assert_eq!(session.errors.len(), 1);
    assert!(matches!(session.errors[0], Error::Upstream { .. }));
}

#[tokio::test]
async fn malformed_playlist_is_a_parse_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/channel/hls/foo.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let res = resolver
        .resolve(
            &CancellationToken::new(),
            "foo",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await;

    assert!(matches!(res, Err(Error::Parse(_))));
}

#[tokio::test]
async fn rejected_token_request_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gql"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid client id"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let mut session = live_squirrel::Session::new("foo", Quality::Best);
    let res = resolver
        .resolve_into(&CancellationToken::new(), &mut session, PlaylistHost::Primary)
        .await;

    assert!(matches!(
        res,
        Err(Error::Auth { status: Some(status), ref detail })
            if status.as_u16() == 400 && detail == "invalid client id"
    ));
    assert!(session.token.is_none());
    assert_eq!(session.errors.len(), 1);
}

#[tokio::test]
async fn missing_token_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "streamPlaybackAccessToken": null } })),
        )
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let res = resolver
        .resolve(
            &CancellationToken::new(),
            "foo",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await;

    assert!(matches!(res, Err(Error::Auth { .. })));
}

#[tokio::test]
async fn relay_gets_escaped_query_and_header() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/playlist/foo\.m3u8%3Fallow_source=true&cdm=wv&"))
        .and(header("X-Donate-To", "https://ttv.lol/donate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_PLAYLIST))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let session = resolver
        .resolve(
            &CancellationToken::new(),
            "foo",
            Quality::Resolution("852x480".to_string()),
            PlaylistHost::Relay,
        )
        .await
        .unwrap();

    assert_eq!(
        session.select().unwrap().url,
        "https://video-weaver.example/v1/playlist/480p30.m3u8"
    );
}

#[tokio::test]
async fn master_playlist_url_skips_fetch() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    let resolver = Resolver::new(config(&server)).unwrap();
    let url = resolver
        .master_playlist_url(&CancellationToken::new(), "foo", PlaylistHost::Primary)
        .await
        .unwrap();

    assert_eq!(url.path(), "/api/channel/hls/foo.m3u8");
    assert!(url.query_pairs().any(|(k, v)| k == "sig" && v == "deadbeef"));
    // Only the token request reached the server
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_channel_fails_before_network() {
    let server = MockServer::start().await;
    let resolver = Resolver::new(config(&server)).unwrap();

    let res = resolver
        .resolve(
            &CancellationToken::new(),
            "not a channel!",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await;

    assert!(matches!(res, Err(Error::InvalidChannel(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn refused_connection_exhausts_backoff_schedule() {
    let schedule = vec![
        Duration::from_millis(100),
        Duration::from_millis(150),
        Duration::from_millis(200),
    ];
    let executor = RetryExecutor::new(schedule.clone());
    let client = reqwest::Client::new();
    let url = format!("{}/api/channel/hls/foo.m3u8", refused_addr());

    let started = Instant::now();
    let res = executor
        .execute(&CancellationToken::new(), || client.get(&url))
        .await;

    assert!(matches!(res, Err(Error::Transport(ref e)) if e.is_connect()));
    assert!(started.elapsed() >= schedule.iter().sum::<Duration>());
}

#[tokio::test]
async fn refused_token_endpoint_records_transport_then_auth() {
    let config = ResolverConfig {
        gql_url: format!("{}/gql", refused_addr()),
        backoff_schedule: vec![Duration::from_millis(5); 2],
        ..ResolverConfig::default()
    };
    let resolver = Resolver::new(config).unwrap();
    let mut session = live_squirrel::Session::new("foo", Quality::Best);

    let res = resolver
        .resolve_into(&CancellationToken::new(), &mut session, PlaylistHost::Primary)
        .await;

    assert!(matches!(res, Err(Error::Auth { status: None, .. })));
    assert_eq!(session.errors.len(), 2);
    assert!(matches!(session.errors[0], Error::Transport(_)));
    assert!(matches!(session.errors[1], Error::Auth { .. }));
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gql"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let config = ResolverConfig {
        http: live_squirrel::HttpConfig {
            request_timeout: Duration::from_secs(60),
            ..live_squirrel::HttpConfig::default()
        },
        ..config(&server)
    };
    let resolver = Resolver::new(config).unwrap();
    let ct = CancellationToken::new();
    {
        let ct = ct.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ct.cancel();
        });
    }

    let started = Instant::now();
    let res = resolver
        .resolve(&ct, "foo", Quality::Best, PlaylistHost::Primary)
        .await;

    assert!(matches!(res, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_aborts_stalled_token_body() {
    let config = long_timeout(ResolverConfig {
        gql_url: format!("{}/gql", truncated_body_server("HTTP/1.1 200 OK", true).await),
        ..ResolverConfig::default()
    });
    let resolver = Resolver::new(config).unwrap();
    let ct = CancellationToken::new();
    cancel_after(&ct, Duration::from_millis(100));

    let mut session = live_squirrel::Session::new("foo", Quality::Best);
    let started = Instant::now();
    let res = resolver
        .resolve_into(&ct, &mut session, PlaylistHost::Primary)
        .await;

    assert!(matches!(res, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(session.errors.last(), Some(Error::Cancelled)));
}

#[tokio::test]
async fn cancellation_aborts_stalled_playlist_body() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let stalled = truncated_body_server("HTTP/1.1 200 OK", true).await;

    let config = long_timeout(ResolverConfig {
        usher_url_template: format!("{stalled}/api/channel/hls/{{channel}}.m3u8"),
        ..config(&server)
    });
    let resolver = Resolver::new(config).unwrap();
    let ct = CancellationToken::new();
    cancel_after(&ct, Duration::from_millis(100));

    let started = Instant::now();
    let res = resolver
        .resolve(&ct, "foo", Quality::Best, PlaylistHost::Primary)
        .await;

    assert!(matches!(res, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_aborts_stalled_error_body() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let stalled = truncated_body_server("HTTP/1.1 503 Service Unavailable", true).await;

    let config = long_timeout(ResolverConfig {
        usher_url_template: format!("{stalled}/api/channel/hls/{{channel}}.m3u8"),
        ..config(&server)
    });
    let resolver = Resolver::new(config).unwrap();
    let ct = CancellationToken::new();
    cancel_after(&ct, Duration::from_millis(100));

    let started = Instant::now();
    let res = resolver
        .resolve(&ct, "foo", Quality::Best, PlaylistHost::Primary)
        .await;

    assert!(matches!(res, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unreadable_error_body_is_reported() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let truncated = truncated_body_server("HTTP/1.1 502 Bad Gateway", false).await;

    let config = ResolverConfig {
        usher_url_template: format!("{truncated}/api/channel/hls/{{channel}}.m3u8"),
        ..config(&server)
    };
    let resolver = Resolver::new(config).unwrap();
    let res = resolver
        .resolve(
            &CancellationToken::new(),
            "foo",
            Quality::Best,
            PlaylistHost::Primary,
        )
        .await;

    assert!(matches!(
        res,
        Err(Error::Upstream { status, ref body })
            if status.as_u16() == 502 && body.starts_with("<unreadable body: ")
    ));
}
