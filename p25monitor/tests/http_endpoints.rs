//! HTTP endpoint clients and the retrying monitor against a mock decoder service

use p25model::{ControlChannelId, FollowRequest, GroupCaptureRequest, GroupChannelId, RfAttributes};
use p25monitor::{
    ActivityCounter, ChannelRegistry, EndpointError, FollowEndpoint, HttpEndpoints,
    MonitorSettings, QualifyEndpoint, RetryingControlChannelMonitor, TrafficCaptureEndpoint,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rf() -> RfAttributes {
    RfAttributes::new(40.0, -75.0, 0, 851_012_500.0)
}

fn qualities_json(site_id: i32) -> serde_json::Value {
    json!({
        "wacn": 781824,
        "system_id": 418,
        "local_reg_area": 0,
        "rf_subsystem_id": 1,
        "site_id": site_id,
        "manufacturer_id": 0,
        "fss_connected": true,
        "system_services": 0,
        "frequency": 851012500.0,
        "data_unit_count": 40
    })
}

fn endpoints(server: &MockServer) -> HttpEndpoints {
    HttpEndpoints::new(server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_qualify_parses_qualities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qualify"))
        .and(body_partial_json(json!({"frequency": 851012500.0, "polarization": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(qualities_json(3)))
        .mount(&server)
        .await;

    let qualities = endpoints(&server).qualify(&rf()).await.unwrap();

    assert_eq!(qualities.control_channel_id(), ControlChannelId::new(781824, 418, 1, 3));
    assert_eq!(qualities.data_unit_count, 40);
}

#[tokio::test]
async fn test_qualify_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qualify"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/qualify"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let endpoints = endpoints(&server);

    assert!(matches!(endpoints.qualify(&rf()).await, Err(EndpointError::NoQualities)));
    match endpoints.qualify(&rf()).await {
        Err(EndpointError::Status { status, .. }) => assert_eq!(status.as_u16(), 503),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_follow_and_capture_post_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/control"))
        .and(body_partial_json(json!({"channel_id": {"site_id": 3}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/traffic/group"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = endpoints(&server);
    endpoints
        .follow(&FollowRequest::new(rf(), ControlChannelId::new(781824, 418, 1, 3)))
        .await
        .unwrap();

    let capture = GroupCaptureRequest::new(
        rf(),
        GroupChannelId::new(781824, 418, 1, 1001, 7, 852_000_000.0),
    );
    assert!(matches!(
        endpoints.capture_group(&capture).await,
        Err(EndpointError::Status { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_service() {
    let endpoints = HttpEndpoints::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    assert!(matches!(endpoints.qualify(&rf()).await, Err(EndpointError::Http(_))));
}

#[tokio::test]
async fn test_idle_control_channel_is_requalified_and_followed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/qualify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(qualities_json(3)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/control"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let endpoints = Arc::new(endpoints(&server));
    let monitor = RetryingControlChannelMonitor::new(
        MonitorSettings {
            min_control_data_unit_rate: 10.0,
            control_channel_retry_count: 1,
            control_channel_retry_delay: Duration::ZERO,
            ..MonitorSettings::default()
        },
        endpoints.clone(),
        endpoints,
    );

    let request = FollowRequest::new(rf(), ControlChannelId::new(781824, 418, 1, 3));
    let task = CancellationToken::new();
    assert!(monitor.register(request.clone().into(), Box::new(task.clone()), ActivityCounter::new()));

    let followed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let requests = server.received_requests().await.unwrap_or_default();
            if requests.iter().any(|r| r.url.path() == "/channels/control") {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert!(task.is_cancelled());
    let follows: Vec<FollowRequest> = followed
        .iter()
        .filter(|r| r.url.path() == "/channels/control")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(follows, vec![request]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(monitor.list().is_empty());
}
