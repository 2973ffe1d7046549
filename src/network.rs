//! Network constants and environment-driven configuration.

use std::time::Duration;

use crate::error::SwapError;

/// Default quote-stream WebSocket URL (US region).
pub const DEFAULT_WS_URL: &str = "wss://us1.api.titan.exchange/api/v1/ws";

/// Default chain RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// WebSocket subprotocol negotiated at upgrade.
pub const WS_SUBPROTOCOL: &str = "v1.api.titan.ag";

/// Environment variable names recognized by [`Config::from_env`].
pub const ENV_WS_URL: &str = "WIRE_ENDPOINT";
pub const ENV_AUTH_TOKEN: &str = "WIRE_AUTH_TOKEN";
pub const ENV_RPC_URL: &str = "CHAIN_RPC_URL";

/// Runtime configuration for one swap session.
#[derive(Clone)]
pub struct Config {
    /// Quote-stream WebSocket URL.
    pub ws_url: String,
    /// Bearer credential for the WebSocket upgrade.
    pub auth_token: String,
    /// Chain RPC endpoint.
    pub rpc_url: String,
    /// Deadline for the first non-empty quote batch.
    pub first_batch_timeout: Duration,
    /// Deadline applied to each chain RPC call.
    pub rpc_timeout: Duration,
    /// Total confirmation-polling budget.
    pub confirm_timeout: Duration,
    /// Interval between confirmation polls.
    pub confirm_poll_interval: Duration,
}

impl std::fmt::Debug for Config {
    // The bearer token stays out of logs and error output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("ws_url", &self.ws_url)
            .field("auth_token", &"<redacted>")
            .field("rpc_url", &self.rpc_url)
            .field("first_batch_timeout", &self.first_batch_timeout)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("confirm_timeout", &self.confirm_timeout)
            .field("confirm_poll_interval", &self.confirm_poll_interval)
            .finish()
    }
}

impl Config {
    /// Build a config from the environment.
    ///
    /// `WIRE_AUTH_TOKEN` is required; everything else has a default.
    pub fn from_env() -> Result<Self, SwapError> {
        let auth_token = std::env::var(ENV_AUTH_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(SwapError::ConfigMissing(ENV_AUTH_TOKEN))?;

        let mut cfg = Self::with_token(auth_token);
        if let Ok(url) = std::env::var(ENV_WS_URL) {
            cfg.ws_url = url;
        }
        if let Ok(url) = std::env::var(ENV_RPC_URL) {
            cfg.rpc_url = url;
        }
        Ok(cfg)
    }

    /// Config with explicit token and default endpoints/deadlines.
    pub fn with_token(auth_token: String) -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            auth_token,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            first_batch_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(15),
            confirm_timeout: Duration::from_secs(60),
            confirm_poll_interval: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::with_token("t".to_string());
        assert_eq!(cfg.ws_url, DEFAULT_WS_URL);
        assert_eq!(cfg.first_batch_timeout, Duration::from_secs(10));
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(15));
        assert_eq!(cfg.confirm_timeout, Duration::from_secs(60));
        assert_eq!(cfg.confirm_poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_debug_redacts_token() {
        let cfg = Config::with_token("super-secret-bearer".to_string());
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("super-secret-bearer"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_missing_token_refused() {
        std::env::remove_var(ENV_AUTH_TOKEN);
        match Config::from_env() {
            Err(SwapError::ConfigMissing(var)) => assert_eq!(var, ENV_AUTH_TOKEN),
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }
}
