// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bearer token value object.

use serde::{Deserialize, Serialize};

/// An OAuth2 access token with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OauthToken {
    /// The bearer token attached as `Authorization: Bearer <token>`.
    pub access_token: String,
    /// Expiry instant, epoch seconds.
    pub expiry_epoch_seconds: i64,
}

impl OauthToken {
    /// Seconds until expiry; negative once expired.
    #[must_use]
    pub fn expires_in(&self) -> i64 {
        self.expiry_epoch_seconds - now_epoch_seconds()
    }
}

pub(crate) fn now_epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_counts_down_from_expiry() {
        let token = OauthToken {
            access_token: "tok".into(),
            expiry_epoch_seconds: now_epoch_seconds() + 600,
        };
        let remaining = token.expires_in();
        assert!((595..=600).contains(&remaining));
    }

    #[test]
    fn expired_token_is_negative() {
        let token = OauthToken {
            access_token: "tok".into(),
            expiry_epoch_seconds: now_epoch_seconds() - 10,
        };
        assert!(token.expires_in() < 0);
    }
}
