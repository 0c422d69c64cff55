use crate::args::ServeArgs;
use crate::commands::Out;
use crate::error::{typed, ErrorType, IntoResult};
use crate::webhook::{serve, StripeClient, SupabaseStore, WebhookHandler};
use crate::Result;
use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Serves the billing webhook on `args.listen` until Ctrl-C.
pub async fn webhook_serve(args: ServeArgs) -> Result<Out<()>> {
    run(args, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C, the server will run until killed: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

async fn run(args: ServeArgs, shutdown: impl Future<Output = ()>) -> Result<Out<()>> {
    for (name, value) in [
        ("STRIPE_SECRET_KEY", &args.stripe_secret_key),
        ("STRIPE_WEBHOOK_SECRET", &args.stripe_webhook_secret),
        ("SUPABASE_URL", &args.supabase_url),
        ("SUPABASE_SERVICE_ROLE_KEY", &args.supabase_service_role_key),
    ] {
        if value.trim().is_empty() {
            return Err(typed(ErrorType::Config, format!("{name} must not be empty")));
        }
    }

    let billing = StripeClient::new(args.stripe_secret_key.as_str()).pub_result(ErrorType::Config)?;
    let accounts = SupabaseStore::new(&args.supabase_url, args.supabase_service_role_key.as_str())
        .pub_result(ErrorType::Config)?;
    let handler = WebhookHandler::new(
        args.stripe_webhook_secret.as_str(),
        Arc::new(billing),
        Arc::new(accounts),
    );

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Unable to listen on {}", args.listen))?;
    info!("Forwarding billing events to {}", args.supabase_url);
    serve(listener, Arc::new(handler), shutdown).await?;
    Ok(format!("Stopped the webhook on {}", args.listen).into())
}
