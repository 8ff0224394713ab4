// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation-aware request dispatch.

use crate::network::{send_and_collect, CollectedResponse, Network};
use crate::request::NetworkRequest;
use crate::types::NetworkError;
use std::sync::Arc;
use strata_task::{CancellationContext, CancellationToken};

/// Issue a request, registering its transport cancel with `context`.
///
/// The request id is registered as the context's current in-flight token
/// before the first callback can fire, so `cancel_operation` aborts the
/// transfer. A context already cancelled never touches the wire.
pub async fn send_cancellable(
    network: Arc<dyn Network>,
    request: NetworkRequest,
    context: &CancellationContext,
) -> Result<CollectedResponse, NetworkError> {
    if context.is_cancelled() {
        return Err(NetworkError::Cancelled);
    }
    let for_token = network.clone();
    let for_cancelled = network.clone();
    let result = send_and_collect(network.as_ref(), request, move |id| {
        context.execute_or_cancelled(
            move || CancellationToken::new(move || for_token.cancel(id)),
            move || for_cancelled.cancel(id),
        );
    })
    .await?;
    Ok(result)
}
