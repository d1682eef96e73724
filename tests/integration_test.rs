use manifest_probe::circuit_breaker::{
    CircuitBreakerConfig, CircuitState, Context, NoopObserver, RetryConfig,
};
use manifest_probe::fetch::{HttpOptions, ManifestFetcher};
use manifest_probe::{ErrorKind, ManifestFormat, ProbeConfig, ProbeError, Prober, StreamType};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const HLS_BODY: &str = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\nlow.m3u8\n";
const MPD_BODY: &str = r#"<?xml version="1.0"?><MPD xmlns="urn:mpeg:dash:schema:mpd:2011"></MPD>"#;
const MPD_STREAMS: &str = r#"<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet mimeType="video/mp4" codecs="avc1.64001f" frameRate="25">
      <Representation id="v1" bandwidth="3000000" width="1280" height="720"/>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/mp4" lang="de" codecs="mp4a.40.2">
      <Representation id="a1" bandwidth="96000" audioSamplingRate="48000"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

/// Fast retries, no jitter, optional breaker
fn test_config(max_retries: u32, breaker: Option<CircuitBreakerConfig>) -> ProbeConfig {
    ProbeConfig {
        http: HttpOptions {
            timeout_secs: 5,
            ..Default::default()
        },
        retry: RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        },
        circuit_breaker: breaker,
    }
}

#[tokio::test]
async fn test_probe_detects_hls() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HLS_BODY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(2, None)).unwrap();
    let url = format!("{}/live/master.m3u8", mock_server.uri());
    let manifest = prober.probe(&Context::new(), &url).await.unwrap();

    assert_eq!(manifest.format, ManifestFormat::Hls);
    assert_eq!(manifest.size(), HLS_BODY.len());

    let streams = &manifest.output.streams;
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].stream_type, StreamType::Video);
    assert_eq!(streams[0].resolution.as_deref(), Some("1280x720"));
    assert_eq!(streams[0].bit_rate.as_deref(), Some("1280 kb/s"));
    assert_eq!(streams[1].stream_type, StreamType::Audio);
}

#[tokio::test]
async fn test_report_lists_mpd_streams() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vod/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD_STREAMS))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::with_observer(
        test_config(0, Some(CircuitBreakerConfig::default())),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let report = prober
        .report(&Context::new(), &format!("{}/vod/manifest.mpd", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(report.format, ManifestFormat::Dash);
    assert_eq!(report.circuit_state, Some(CircuitState::Closed));

    let ids: Vec<&str> = report.streams.iter().map(|s| s.stream_id.as_str()).collect();
    assert_eq!(ids, vec!["0:0", "0:1(de)"]);
    assert_eq!(report.streams[0].codec, "h264");
    assert_eq!(report.streams[0].frame_rate.as_deref(), Some("25"));
    assert_eq!(report.streams[1].codec, "aac");
    assert_eq!(report.streams[1].bit_rate.as_deref(), Some("96 kb/s"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["streams"][1]["language"], "de");
}

#[tokio::test]
async fn test_malformed_mpd_is_parsing_error_and_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<MPD><Period>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let breaker = CircuitBreakerConfig {
        failure_threshold: 1,
        ..Default::default()
    };
    let prober = Prober::new(test_config(3, Some(breaker))).unwrap();
    let err = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::Parsing));
    assert!(matches!(err, ProbeError::Parsing { ref format, .. } if format == "MPD"));

    // The fetch itself succeeded, so the host stays healthy
    let service = prober.breakers().unwrap();
    assert_eq!(service.state("127.0.0.1").await, CircuitState::Closed);
}

#[tokio::test]
async fn test_zero_timeout_falls_back_to_default() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HLS_BODY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(1, None);
    config.http.timeout_secs = 0;
    let prober = Prober::new(config).unwrap();

    let manifest = prober
        .probe(&Context::new(), &format!("{}/a.m3u8", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(manifest.format, ManifestFormat::Hls);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HLS_BODY))
        .mount(&mock_server)
        .await;

    let url = format!("{}/master.m3u8", mock_server.uri());
    let target = Url::parse(&url).unwrap();

    let fetcher = ManifestFetcher::new(&target, &HttpOptions::default())
        .unwrap()
        .with_max_body_bytes(16);
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(err.is_kind(ErrorKind::Parsing));
    assert!(err.to_string().contains("too large"));

    let fetcher = ManifestFetcher::new(&target, &HttpOptions::default())
        .unwrap()
        .with_max_body_bytes(HLS_BODY.len());
    assert_eq!(fetcher.fetch(&url).await.unwrap(), HLS_BODY);
}

#[tokio::test]
async fn test_probe_sends_camouflage_headers() {
    let mock_server = MockServer::start().await;
    let origin = mock_server.uri();
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .and(header("origin", origin.as_str()))
        .and(header("referer", format!("{}/", origin).as_str()))
        .and(header("user-agent", "MyApp/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD_BODY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(0, None);
    config.http.user_agent = Some("MyApp/1.0".to_string());
    let prober = Prober::new(config).unwrap();

    let report = prober
        .report(&Context::new(), &format!("{}/manifest.mpd", origin))
        .await
        .unwrap();
    assert_eq!(report.format, ManifestFormat::Dash);
    assert_eq!(report.circuit_state, None);
}

#[tokio::test]
async fn test_auth_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(5, None)).unwrap();
    let err = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Auth { status: 403, .. }));
}

#[tokio::test]
async fn test_server_error_retried_until_exhausted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(2, None)).unwrap();
    let err = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::Network));
    assert!(!err.is_circuit_open());
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD_BODY))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(3, None)).unwrap();
    let manifest = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(manifest.format, ManifestFormat::Dash);
}

#[tokio::test]
async fn test_empty_body_is_network_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(1, None)).unwrap();
    let err = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_kind(ErrorKind::Network));
}

#[tokio::test]
async fn test_slow_server_is_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(MPD_BODY)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config(0, None);
    config.http.timeout_secs = 1;
    let prober = Prober::new(config).unwrap();

    let err = prober
        .probe(&Context::new(), &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Timeout { timeout_secs: 1, .. }));
}

#[tokio::test]
async fn test_breaker_opens_per_host() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let breaker = CircuitBreakerConfig {
        failure_threshold: 2,
        reset_timeout_ms: 60_000,
        ..Default::default()
    };
    let prober = Prober::new(test_config(0, Some(breaker))).unwrap();
    let url = format!("{}/manifest.mpd", mock_server.uri());
    let ctx = Context::new();

    for _ in 0..2 {
        let err = prober.probe(&ctx, &url).await.unwrap_err();
        assert!(!err.is_circuit_open());
    }

    let err = prober.probe(&ctx, &url).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert!(err.is_kind(ErrorKind::Network));

    let service = prober.breakers().unwrap();
    assert_eq!(service.state("127.0.0.1").await, CircuitState::Open);
    assert_eq!(service.targets(), vec!["127.0.0.1".to_string()]);
}

#[tokio::test]
async fn test_cancelled_context_makes_no_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD_BODY))
        .expect(0)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(test_config(2, None)).unwrap();
    let ctx = Context::new();
    ctx.cancel();

    let err = prober
        .probe(&ctx, &format!("{}/manifest.mpd", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Context(_)));
}
