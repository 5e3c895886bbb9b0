//! Veiled Arena Server
//!
//! Service entry point: loads configuration from the environment, builds
//! the engine, and serves the WebSocket endpoint.
//!
//! Environment:
//! - `BIND_ADDR`       - listen address (default `0.0.0.0:8080`)
//! - `OPERATOR_ADDR`   - hex operator address (dev fallback derived)
//! - `EVAL_KEY`        - hex evaluation key (dev fallback derived)
//! - `DEV_FAUCET`      - whole tokens credited per player on first auth
//! - `AUTH_SECRET` / `AUTH_PUBLIC_KEY_PEM` / `AUTH_ISSUER` /
//!   `AUTH_AUDIENCE` / `AUTH_SKIP_EXPIRY` - token validation

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use veiled_arena::core::amount::Amount;
use veiled_arena::core::id::Addr;
use veiled_arena::crypto::seal::EvaluationKey;
use veiled_arena::engine::{Engine, EngineConfig};
use veiled_arena::network::auth::{derive_address, AuthConfig};
use veiled_arena::network::server::{ArenaServer, ServerConfig};
use veiled_arena::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Veiled Arena Server v{}", VERSION);

    let operator = match std::env::var("OPERATOR_ADDR") {
        Ok(hex) => Addr::from_hex(&hex).context("OPERATOR_ADDR is not a 20-byte hex address")?,
        Err(_) => {
            let derived = derive_address("dev-operator");
            warn!("OPERATOR_ADDR not set, using dev operator {}", derived.short());
            derived
        }
    };

    let key = match std::env::var("EVAL_KEY") {
        Ok(hex) => EvaluationKey::from_hex(&hex).context("EVAL_KEY is not a 32-byte hex key")?,
        Err(_) => {
            warn!("EVAL_KEY not set, deriving a development key");
            EvaluationKey::derive("dev-evaluation-key")
        }
    };

    let mut server_config = ServerConfig {
        version: VERSION.to_string(),
        ..Default::default()
    };
    if let Ok(addr) = std::env::var("BIND_ADDR") {
        server_config.bind_addr = addr.parse().context("BIND_ADDR is not a socket address")?;
    }
    if let Ok(tokens) = std::env::var("DEV_FAUCET") {
        let tokens: u64 = tokens.parse().context("DEV_FAUCET is not a token count")?;
        warn!("Dev faucet enabled: {} tokens per player", tokens);
        server_config.dev_faucet = Some(Amount::from_tokens(tokens));
    }

    let auth = AuthConfig::from_env();
    if !auth.is_configured() {
        warn!("No AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set - all auth attempts will fail");
    }

    info!("Operator: {}", operator.short());
    info!("Listening on {}", server_config.bind_addr);

    let engine = Engine::new(EngineConfig { operator }, key);
    let server = ArenaServer::new(server_config, auth, engine);
    server.run().await.context("server terminated")?;

    Ok(())
}
