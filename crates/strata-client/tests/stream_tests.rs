// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream-client subscription lifecycle against a mock platform.

use std::sync::Arc;
use strata_cache::{CacheSettings, InMemoryStore, LayeredCache};
use strata_client::{ClientSettings, RetryPolicy, StreamLayerClient, SubscribeRequest};
use strata_error::ErrorKind;
use strata_http::{Network, NetworkSettings, ReqwestNetwork, ReqwestNetworkConfig};
use strata_model::{
    ConsumerProperties, ConsumerPropertyValue, StreamOffset, StreamOffsets, SubscribeMode,
};
use strata_task::{CancellationContext, InlineScheduler};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HRN: &str = "hrn:here:data:::hereos-internal-test-v2";

fn settings(server: &MockServer) -> ClientSettings {
    let network: Arc<dyn Network> =
        Arc::new(ReqwestNetwork::new(ReqwestNetworkConfig::default()).unwrap());
    ClientSettings {
        api_lookup_url: format!("{}/lookup/v1", server.uri()),
        network,
        scheduler: Arc::new(InlineScheduler),
        cache: Arc::new(
            LayeredCache::with_store(CacheSettings::default(), Arc::new(InMemoryStore::new()))
                .unwrap(),
        ),
        token_provider: None,
        retry: RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        },
        network_settings: NetworkSettings::default(),
    }
}

async fn mount_stream_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/lookup/v1/resources/{HRN}/apis/stream/v2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "api": "stream",
            "version": "v2",
            "baseURL": format!("{}/stream/v2", server.uri()),
        }])))
        .mount(server)
        .await;
}

async fn mount_subscribe(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/stream/v2/catalogs/{HRN}/layers/stream-layer/subscribe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nodeBaseURL": format!("{}/node/stream/v2", server.uri()),
            "subscriptionId": "sub-1",
        })))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> StreamLayerClient {
    StreamLayerClient::new(HRN.parse().unwrap(), "stream-layer", &settings(server)).unwrap()
}

#[tokio::test]
async fn subscribe_is_idempotent() {
    let server = MockServer::start().await;
    mount_stream_lookup(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("/stream/v2/catalogs/{HRN}/layers/stream-layer/subscribe")))
        .and(query_param("mode", "serial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nodeBaseURL": format!("{}/node/stream/v2", server.uri()),
            "subscriptionId": "sub-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ctx = CancellationContext::new();
    let first = client
        .subscribe(SubscribeRequest::new(SubscribeMode::Serial), &ctx)
        .await
        .unwrap();
    assert_eq!(first, "sub-1");
    // A second subscribe returns the existing cursor without a request.
    let second = client
        .subscribe(SubscribeRequest::new(SubscribeMode::Serial), &ctx)
        .await
        .unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn consumer_properties_are_forwarded_verbatim() {
    let server = MockServer::start().await;
    mount_stream_lookup(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("/stream/v2/catalogs/{HRN}/layers/stream-layer/subscribe")))
        .and(body_string_contains("enable.auto.commit"))
        .and(body_string_contains("kafkaConsumerProperties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nodeBaseURL": format!("{}/node/stream/v2", server.uri()),
            "subscriptionId": "sub-props",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut properties = ConsumerProperties::default();
    properties.set("enable.auto.commit", ConsumerPropertyValue::Bool(true));
    let client = client(&server);
    let id = client
        .subscribe(
            SubscribeRequest::new(SubscribeMode::Serial).with_consumer_properties(properties),
            &CancellationContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(id, "sub-props");
}

#[tokio::test]
async fn poll_targets_the_node_base_url() {
    let server = MockServer::start().await;
    mount_stream_lookup(&server).await;
    mount_subscribe(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/node/stream/v2/catalogs/{HRN}/layers/stream-layer/partitions")))
        .and(query_param("subscriptionId", "sub-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": [{
                "metaData": {
                    "partition": "314010583",
                    "data": "U29tZURhdGE=",
                    "dataSize": 8
                },
                "offset": {"partition": 7, "offset": 38562}
            }]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let ctx = CancellationContext::new();
    client
        .subscribe(SubscribeRequest::new(SubscribeMode::Serial), &ctx)
        .await
        .unwrap();
    let messages = client.poll(&ctx).await.unwrap();
    assert_eq!(messages.messages.len(), 1);

    // Inline payload resolves without any blob call.
    let data = client
        .get_data(&messages.messages[0], &ctx)
        .await
        .unwrap();
    assert_eq!(data.as_ref(), b"SomeData");
}

#[tokio::test]
async fn commit_and_seek_put_offsets() {
    let server = MockServer::start().await;
    mount_stream_lookup(&server).await;
    mount_subscribe(&server).await;
    Mock::given(method("PUT"))
        .and(path(format!("/node/stream/v2/catalogs/{HRN}/layers/stream-layer/offsets")))
        .and(body_string_contains("38562"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/node/stream/v2/catalogs/{HRN}/layers/stream-layer/seek")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ctx = CancellationContext::new();
    client
        .subscribe(SubscribeRequest::new(SubscribeMode::Serial), &ctx)
        .await
        .unwrap();
    let offsets = StreamOffsets {
        offsets: vec![StreamOffset {
            partition: 7,
            offset: 38562,
        }],
    };
    client.commit_offsets(offsets.clone(), &ctx).await.unwrap();
    client.seek_to_offset(offsets, &ctx).await.unwrap();
}

#[tokio::test]
async fn poll_without_subscription_is_invalid() {
    let server = MockServer::start().await;
    let client = client(&server);
    let err = client.poll(&CancellationContext::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn poll_after_unsubscribe_is_invalid() {
    let server = MockServer::start().await;
    mount_stream_lookup(&server).await;
    mount_subscribe(&server).await;
    Mock::given(method("DELETE"))
        .and(path(format!("/node/stream/v2/catalogs/{HRN}/layers/stream-layer/subscribe")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let ctx = CancellationContext::new();
    client
        .subscribe(SubscribeRequest::new(SubscribeMode::Serial), &ctx)
        .await
        .unwrap();
    client.unsubscribe(&ctx).await.unwrap();
    let err = client.poll(&ctx).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn unsubscribe_without_subscription_is_invalid() {
    let server = MockServer::start().await;
    let client = client(&server);
    let err = client
        .unsubscribe(&CancellationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}
