// SPDX-License-Identifier: MIT OR Apache-2.0
//! OAuth2 token acquisition for the strata client runtime.
//!
//! A [`TokenProvider`] exchanges signed credentials for bearer tokens at the
//! platform token endpoint, caches them under a minimum-validity policy, and
//! coalesces concurrent refreshes into a single outbound request.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod provider;
mod signer;
mod token;

pub use crypto::{hmac_sha256, sha256};
pub use provider::{TokenProvider, TokenProviderSettings, DEFAULT_MINIMUM_VALIDITY_SECONDS};
pub use signer::Credentials;
pub use token::OauthToken;
