//! Colony demo node - two services talking over the internal RPC layer.
//!
//! Boots an in-process channel layer, connects a caller service and a
//! responder service, and drives request/push round trips end to end. Useful
//! as a smoke test and as a worked example of wiring the library.

use anyhow::Result;
use clap::Parser;
use colony_rpc::{InternalConnection, LocalChannelLayer, MethodRegistryBuilder, RpcError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "colony-node")]
#[command(about = "Demo node for the colony internal RPC layer")]
struct Args {
    /// Name of the calling service
    #[arg(long, default_value = "gateway")]
    service: String,

    /// Name of the responder service
    #[arg(long, default_value = "login")]
    peer: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Starting colony demo node");

    let layer = Arc::new(LocalChannelLayer::new());

    // The responder contributes methods on top of the diagnostic builtins.
    let registry = MethodRegistryBuilder::new()
        .register("echo", |_ctx, params| async move { Ok(params) })
        .register("get_user", |ctx, params| async move {
            let Some(user_id) = params["user_id"].as_str() else {
                return Err(RpcError::invalid_params("missing `user_id`"));
            };
            Ok(json!({
                "id": user_id,
                "active": true,
                "issued_by": ctx.service(),
            }))
        })
        .register("audit", |ctx, params| async move {
            // Push target: nothing to return, the log line is the effect.
            info!(service = %ctx.service(), entry = %params, "audit event recorded");
            Ok(Value::Null)
        })
        .build();

    let responder = InternalConnection::connect(&args.peer, registry, layer.clone()).await?;
    let caller = InternalConnection::connect(
        &args.service,
        MethodRegistryBuilder::new().build(),
        layer.clone(),
    )
    .await?;

    let pong = caller.request(&args.peer, "ping", json!({})).await?;
    info!(reply = %pong, "ping");

    let user = caller
        .request(&args.peer, "get_user", json!({"user_id": "u-1"}))
        .await?;
    info!(reply = %user, "get_user");

    let methods = caller.request(&args.peer, "help", json!({})).await?;
    info!(reply = %methods, "help");

    caller
        .push(&args.peer, "audit", json!({"actor": args.service, "action": "demo"}))
        .await?;

    // Give the push a beat to land before tearing down.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    caller.disconnect().await?;
    responder.disconnect().await?;
    info!("Demo complete, exiting");

    Ok(())
}
