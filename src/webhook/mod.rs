//! The billing webhook: an HTTP endpoint that receives signed billing events and mirrors
//! customers and subscriptions into the hosted account database.

mod accounts;
mod billing;
mod event;
mod handler;
mod signature;

pub use accounts::{AccountStore, CustomerRow, SupabaseStore, CUSTOMERS_TABLE, SUBSCRIPTIONS_TABLE};
pub use billing::{Billing, StripeClient, STRIPE_API_BASE, STRIPE_API_VERSION};
pub use event::{
    CheckoutSession, Event, EventKind, Expandable, ObjectRef, Subscription, SubscriptionItem,
    SubscriptionItems, SubscriptionRow, USER_ID_METADATA,
};
pub use handler::{Reply, WebhookHandler};
pub use signature::{sign, verify, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};

use crate::Result;
use anyhow::Context;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

/// Largest request body read, billing events are a few kilobytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections on `listener` until `shutdown` resolves, answering every request with
/// `handler`. Each connection is served on its own task. A failed accept is logged and the loop
/// carries on.
pub async fn serve(
    listener: TcpListener,
    handler: Arc<WebhookHandler>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Unable to read the listening address")?;
    info!("Webhook listening on http://{addr}");
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = &mut shutdown => {
                info!("Webhook server shutting down");
                return Ok(());
            }
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept a connection: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        debug!("Connection from {peer}");
        let handler = handler.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(respond(&handler, req).await) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                warn!("Connection from {peer} ended with an error: {e}");
            }
        });
    }
}

async fn respond(handler: &WebhookHandler, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(out) => return reply(out),
    };
    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let out = handler.handle(&parts.method, signature, &body).await;
    debug!("{} {} -> {}", parts.method, parts.uri.path(), out.status);
    reply(out)
}

/// Collects at most `MAX_BODY_BYTES` of `body`, or the reply refusing it.
async fn read_body<B>(body: B) -> std::result::Result<Bytes, Reply>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!("Refusing a request body over {MAX_BODY_BYTES} bytes");
            Err(Reply {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                content_type: "text/plain; charset=utf-8",
                body: format!("Webhook Error: {e}"),
            })
        }
        Err(e) => {
            warn!("Unable to read the request body: {e}");
            Err(Reply {
                status: StatusCode::BAD_REQUEST,
                content_type: "text/plain; charset=utf-8",
                body: format!("Webhook Error: {e}"),
            })
        }
    }
}

fn reply(out: Reply) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(out.body)));
    *response.status_mut() = out.status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(out.content_type));
    response
}

/// Parses `base` as a URL that further paths can be joined onto.
pub(crate) fn directory_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid URL '{base}'"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{MemoryAccounts, MemoryBilling};
    use chrono::Utc;
    use tokio::sync::oneshot;

    #[test]
    fn test_directory_url() {
        assert_eq!(
            directory_url("https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(
            directory_url("http://localhost:1/v1").unwrap().as_str(),
            "http://localhost:1/v1/"
        );
        assert!(directory_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_serve_over_http() {
        let accounts = Arc::new(MemoryAccounts::default());
        let handler = Arc::new(WebhookHandler::new(
            "whsec_test",
            Arc::new(MemoryBilling::default()),
            accounts.clone(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, handler, async {
            let _ = stopped.await;
        }));

        let url = format!("http://{addr}/api/stripe-webhook");
        let client = reqwest::Client::new();

        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 405);
        assert_eq!(response.text().await.unwrap(), "Method not allowed");

        let body = serde_json::json!({
            "type": "checkout.session.completed",
            "data": {"object": {"customer": "cus_1", "mode": "payment",
                                "metadata": {"supabase_user_id": "u1"}}}
        })
        .to_string();
        let header = sign(body.as_bytes(), "whsec_test", Utc::now().timestamp()).unwrap();
        let response = client
            .post(&url)
            .header(SIGNATURE_HEADER, header)
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(response.text().await.unwrap(), r#"{"received":true}"#);
        assert_eq!(accounts.customer_of("u1").as_deref(), Some("cus_1"));

        let response = client.post(&url).body(body).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 400);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let fits = Full::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES]));
        assert_eq!(read_body(fits).await.unwrap().len(), MAX_BODY_BYTES);

        let too_big = Full::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES + 1]));
        let refused = read_body(too_big).await.unwrap_err();
        assert_eq!(refused.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(refused.body.starts_with("Webhook Error:"));
    }
}
