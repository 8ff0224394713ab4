// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token cache with minimum-validity gating and single-flight refresh.

use crate::signer::{authorization_header, Credentials};
use crate::token::{now_epoch_seconds, OauthToken};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_error::{ApiError, ErrorKind, Response};
use strata_http::{
    send_cancellable, Method, Network, NetworkRequest, NetworkSettings, ResponseStatus,
};
use strata_task::CancellationContext;
use tracing::{debug, warn};

/// Default minimum remaining validity before a cached token is refreshed.
pub const DEFAULT_MINIMUM_VALIDITY_SECONDS: i64 = 300;

/// Token provider configuration.
#[derive(Debug, Clone)]
pub struct TokenProviderSettings {
    /// Platform credentials used to sign the token request.
    pub credentials: Credentials,
    /// Token endpoint, e.g. `https://account.example.com/oauth2/token`.
    pub token_endpoint_url: String,
    /// A cached token is reused while it stays valid for longer than this
    /// window. The special value 0 forces a refresh on every call.
    pub minimum_validity_seconds: i64,
    /// Transfer timeout of the token request.
    pub transfer_timeout: Duration,
}

impl TokenProviderSettings {
    /// Settings with the default validity window and timeout.
    pub fn new(credentials: Credentials, token_endpoint_url: impl Into<String>) -> Self {
        Self {
            credentials,
            token_endpoint_url: token_endpoint_url.into(),
            minimum_validity_seconds: DEFAULT_MINIMUM_VALIDITY_SECONDS,
            transfer_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
    expires_in: i64,
}

type SharedRefresh = Shared<BoxFuture<'static, Response<OauthToken>>>;

#[derive(Default)]
struct ProviderState {
    current_token: Option<OauthToken>,
    last_error: Option<ApiError>,
    last_http_status: Option<u16>,
    in_flight: Option<SharedRefresh>,
}

/// Acquires, caches, and refreshes bearer tokens.
///
/// The refresh is single-flight per provider: concurrent callers inside a
/// refresh window attach to the same in-flight request and observe the same
/// result.
pub struct TokenProvider {
    network: Arc<dyn Network>,
    settings: TokenProviderSettings,
    state: Arc<Mutex<ProviderState>>,
}

impl TokenProvider {
    /// Create a provider over the given transport.
    pub fn new(network: Arc<dyn Network>, settings: TokenProviderSettings) -> Self {
        Self {
            network,
            settings,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    /// Get a valid token, refreshing when the cached one is inside the
    /// minimum-validity window.
    pub async fn token(&self, context: &CancellationContext) -> Response<OauthToken> {
        if context.is_cancelled() {
            return Err(ApiError::cancelled());
        }

        let refresh = {
            let mut state = self.state.lock().expect("token provider lock poisoned");
            if self.settings.minimum_validity_seconds > 0 {
                if let Some(token) = &state.current_token {
                    if token.expires_in() > self.settings.minimum_validity_seconds {
                        return Ok(token.clone());
                    }
                }
            }
            if let Some(in_flight) = &state.in_flight {
                debug!(target: "strata.auth", "joining in-flight token refresh");
                in_flight.clone()
            } else {
                let refresh = self.make_refresh(context.clone());
                state.in_flight = Some(refresh.clone());
                refresh
            }
        };

        let result = refresh.await;
        if context.is_cancelled() {
            return Err(ApiError::cancelled());
        }
        result
    }

    /// Legacy blocking-style entry without a cancellation scope.
    #[deprecated(note = "use `token` with a cancellation context")]
    pub async fn token_blocking(&self) -> Response<OauthToken> {
        self.token(&CancellationContext::new()).await
    }

    /// Drop the cached token, forcing the next call to refresh.
    ///
    /// Called by the client when a downstream API answers 401 with a token
    /// that was presumed valid.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().expect("token provider lock poisoned");
        state.current_token = None;
    }

    /// Error of the last refresh attempt, if it failed.
    #[must_use]
    pub fn error_response(&self) -> Option<ApiError> {
        self.state
            .lock()
            .expect("token provider lock poisoned")
            .last_error
            .clone()
    }

    /// HTTP status of the last refresh attempt.
    #[must_use]
    pub fn http_status_code(&self) -> Option<u16> {
        self.state
            .lock()
            .expect("token provider lock poisoned")
            .last_http_status
    }

    fn make_refresh(&self, context: CancellationContext) -> SharedRefresh {
        let network = self.network.clone();
        let settings = self.settings.clone();
        let state = self.state.clone();
        async move {
            let (result, status) = refresh_once(network, &settings, &context).await;
            let mut st = state.lock().expect("token provider lock poisoned");
            st.last_http_status = status;
            match &result {
                Ok(token) => {
                    debug!(
                        target: "strata.auth",
                        expires_in = token.expires_in(),
                        "token refreshed"
                    );
                    st.current_token = Some(token.clone());
                    st.last_error = None;
                }
                Err(err) => {
                    warn!(target: "strata.auth", %err, "token refresh failed");
                    st.last_error = Some(err.clone());
                    // The endpoint rejected the credentials outright; the
                    // cached token is no longer trustworthy. Transport
                    // failures keep it.
                    if matches!(err.kind, ErrorKind::Unauthorized | ErrorKind::Forbidden) {
                        st.current_token = None;
                    }
                }
            }
            st.in_flight = None;
            result
        }
        .boxed()
        .shared()
    }
}

async fn refresh_once(
    network: Arc<dyn Network>,
    settings: &TokenProviderSettings,
    context: &CancellationContext,
) -> (Response<OauthToken>, Option<u16>) {
    let timestamp = now_epoch_seconds();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let header = authorization_header(
        &settings.credentials,
        &settings.token_endpoint_url,
        timestamp,
        &nonce,
    );
    let request = NetworkRequest::new(&settings.token_endpoint_url)
        .with_method(Method::Post)
        .with_header("Authorization", header)
        .with_header("Content-Type", "application/json")
        .with_body(&br#"{"grantType":"client_credentials"}"#[..])
        .with_settings(NetworkSettings {
            transfer_timeout: settings.transfer_timeout,
            ..NetworkSettings::default()
        });

    let collected = match send_cancellable(network, request, context).await {
        Ok(collected) => collected,
        Err(err) => return (Err(err.into()), None),
    };

    match collected.response.status {
        ResponseStatus::Http(status) if (200..300).contains(&status) => {
            match serde_json::from_slice::<SignInResponse>(&collected.body) {
                Ok(parsed) => (
                    Ok(OauthToken {
                        access_token: parsed.access_token,
                        expiry_epoch_seconds: now_epoch_seconds() + parsed.expires_in,
                    }),
                    Some(status),
                ),
                Err(err) => (
                    Err(ApiError::service_unavailable(format!(
                        "unparseable token response: {err}"
                    ))),
                    Some(status),
                ),
            }
        }
        ResponseStatus::Http(status) => {
            let detail = String::from_utf8_lossy(&collected.body).into_owned();
            (Err(ApiError::from_status(status, detail)), Some(status))
        }
        ResponseStatus::Failed(code) => (Err(code.into()), None),
    }
}
