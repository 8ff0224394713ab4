// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream-layer consumption: subscribe, poll, commit, seek.
//!
//! A subscription is a server-side cursor bound to one node; after
//! subscribe, every call for that subscription targets the node base URL
//! the service returned. Consumer properties are forwarded verbatim and
//! never interpreted client-side.

use crate::blob::{BlobRepository, BlobService};
use crate::lookup::ApiLookupClient;
use crate::options::FetchOption;
use crate::rest::{build_url, RestClient};
use crate::settings::ClientSettings;
use bytes::Bytes;
use std::sync::Mutex;
use strata_error::{ApiError, Response};
use strata_http::Method;
use strata_model::{
    ConsumerProperties, Hrn, Message, Messages, StreamOffsets, SubscribeMode, SubscribeResponse,
};
use strata_task::CancellationContext;
use tracing::{debug, info};

/// Subscription parameters.
#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    /// Serial or parallel consumption.
    pub mode: SubscribeMode,
    /// Resume an existing server-side cursor instead of creating one.
    pub subscription_id: Option<String>,
    /// Consumer group id for parallel mode.
    pub consumer_id: Option<String>,
    /// Properties forwarded verbatim in the subscribe body.
    pub consumer_properties: ConsumerProperties,
}

impl SubscribeRequest {
    /// Subscribe in the given mode.
    #[must_use]
    pub fn new(mode: SubscribeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Attach consumer properties.
    #[must_use]
    pub fn with_consumer_properties(mut self, properties: ConsumerProperties) -> Self {
        self.consumer_properties = properties;
        self
    }
}

#[derive(Debug, Clone)]
struct SubscriptionState {
    subscription_id: String,
    node_base_url: String,
    mode: SubscribeMode,
}

/// Read client for one stream layer.
pub struct StreamLayerClient {
    hrn: Hrn,
    layer: String,
    rest: RestClient,
    lookup: ApiLookupClient,
    blobs: BlobRepository,
    subscription: Mutex<Option<SubscriptionState>>,
}

impl StreamLayerClient {
    /// Create a client for `layer` in `hrn`.
    pub fn new(hrn: Hrn, layer: impl Into<String>, settings: &ClientSettings) -> Response<Self> {
        if hrn.is_null() {
            return Err(ApiError::invalid_argument("null catalog HRN"));
        }
        Ok(Self {
            rest: settings.rest_client(),
            lookup: settings.lookup_client(),
            blobs: BlobRepository::new(hrn.clone(), settings),
            hrn,
            layer: layer.into(),
            subscription: Mutex::new(None),
        })
    }

    fn current_subscription(&self) -> Response<SubscriptionState> {
        self.subscription
            .lock()
            .expect("subscription lock poisoned")
            .clone()
            .ok_or_else(|| ApiError::invalid_argument("not subscribed"))
    }

    /// Open (or resume) a subscription. Subscribing twice on the same
    /// client returns the existing subscription id.
    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
        context: &CancellationContext,
    ) -> Response<String> {
        if let Some(existing) = self
            .subscription
            .lock()
            .expect("subscription lock poisoned")
            .as_ref()
        {
            debug!(
                target: "strata.client.stream",
                subscription_id = %existing.subscription_id,
                "already subscribed"
            );
            return Ok(existing.subscription_id.clone());
        }

        let hrn = self.hrn.to_string();
        let endpoint = self
            .lookup
            .lookup_api(&self.hrn, "stream", "v2", context)
            .await?;
        let mut query: Vec<(&str, &str)> = vec![("mode", request.mode.as_str())];
        if let Some(id) = &request.subscription_id {
            query.push(("subscriptionId", id));
        }
        if let Some(consumer) = &request.consumer_id {
            query.push(("consumerId", consumer));
        }
        let url = build_url(
            &endpoint.base_url,
            &["catalogs", &hrn, "layers", &self.layer, "subscribe"],
            &query,
        )?;
        let body = if request.consumer_properties.properties.is_empty() {
            None
        } else {
            Some(Bytes::from(
                serde_json::to_vec(&request.consumer_properties).map_err(|err| {
                    ApiError::invalid_argument(format!("unserialisable consumer properties: {err}"))
                })?,
            ))
        };
        let response = self.rest.call(Method::Post, &url, body, context).await?;
        let subscription: SubscribeResponse = response.json()?;

        info!(
            target: "strata.client.stream",
            layer = %self.layer,
            subscription_id = %subscription.subscription_id,
            node = %subscription.node_base_url,
            "subscribed"
        );
        let id = subscription.subscription_id.clone();
        *self
            .subscription
            .lock()
            .expect("subscription lock poisoned") = Some(SubscriptionState {
            subscription_id: subscription.subscription_id,
            node_base_url: subscription.node_base_url,
            mode: request.mode,
        });
        Ok(id)
    }

    /// Poll the subscription for new messages.
    pub async fn poll(&self, context: &CancellationContext) -> Response<Messages> {
        let subscription = self.current_subscription()?;
        let hrn = self.hrn.to_string();
        let url = build_url(
            &subscription.node_base_url,
            &["catalogs", &hrn, "layers", &self.layer, "partitions"],
            &[
                ("mode", subscription.mode.as_str()),
                ("subscriptionId", &subscription.subscription_id),
            ],
        )?;
        self.rest.get_json(&url, context).await
    }

    /// Resolve a polled message to its payload: inline data, or a blob
    /// fetch through the data handle.
    pub async fn get_data(
        &self,
        message: &Message,
        context: &CancellationContext,
    ) -> Response<Bytes> {
        if let Some(inline) = message.meta_data.decode_data() {
            return Ok(inline);
        }
        let Some(handle) = &message.meta_data.data_handle else {
            return Err(ApiError::invalid_argument(
                "message carries neither inline data nor a data handle",
            ));
        };
        self.blobs
            .get_blob(
                &self.layer,
                handle,
                BlobService::Blob,
                FetchOption::OnlineIfNotFound,
                None,
                context,
            )
            .await
    }

    /// Commit consumed offsets.
    pub async fn commit_offsets(
        &self,
        offsets: StreamOffsets,
        context: &CancellationContext,
    ) -> Response<()> {
        self.put_offsets("offsets", offsets, context).await
    }

    /// Reposition the subscription to the given offsets.
    pub async fn seek_to_offset(
        &self,
        offsets: StreamOffsets,
        context: &CancellationContext,
    ) -> Response<()> {
        self.put_offsets("seek", offsets, context).await
    }

    async fn put_offsets(
        &self,
        verb: &str,
        offsets: StreamOffsets,
        context: &CancellationContext,
    ) -> Response<()> {
        let subscription = self.current_subscription()?;
        let hrn = self.hrn.to_string();
        let url = build_url(
            &subscription.node_base_url,
            &["catalogs", &hrn, "layers", &self.layer, verb],
            &[
                ("mode", subscription.mode.as_str()),
                ("subscriptionId", &subscription.subscription_id),
            ],
        )?;
        let body = serde_json::to_vec(&offsets)
            .map_err(|err| ApiError::invalid_argument(format!("unserialisable offsets: {err}")))?;
        self.rest
            .call(Method::Put, &url, Some(Bytes::from(body)), context)
            .await?;
        Ok(())
    }

    /// Close the subscription. Later polls fail with `InvalidArgument`.
    pub async fn unsubscribe(&self, context: &CancellationContext) -> Response<()> {
        let subscription = self.current_subscription()?;
        let hrn = self.hrn.to_string();
        let url = build_url(
            &subscription.node_base_url,
            &["catalogs", &hrn, "layers", &self.layer, "subscribe"],
            &[
                ("mode", subscription.mode.as_str()),
                ("subscriptionId", &subscription.subscription_id),
            ],
        )?;
        self.rest.call(Method::Delete, &url, None, context).await?;
        *self
            .subscription
            .lock()
            .expect("subscription lock poisoned") = None;
        info!(
            target: "strata.client.stream",
            layer = %self.layer,
            subscription_id = %subscription.subscription_id,
            "unsubscribed"
        );
        Ok(())
    }
}
