//! Processing of one webhook delivery, independent of the HTTP server.

use crate::error::{typed, ErrorType, IntoResult};
use crate::webhook::accounts::AccountStore;
use crate::webhook::billing::Billing;
use crate::webhook::event::{CheckoutSession, Event, EventKind, Subscription, SubscriptionRow};
use crate::webhook::signature;
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use hyper::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to send back for a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    fn received() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: r#"{"received":true}"#.to_string(),
        }
    }
}

pub struct WebhookHandler {
    secret: String,
    tolerance_secs: i64,
    billing: Arc<dyn Billing>,
    accounts: Arc<dyn AccountStore>,
}

impl WebhookHandler {
    pub fn new(
        secret: impl Into<String>,
        billing: Arc<dyn Billing>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
            billing,
            accounts,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Handles a delivery: only `POST` is accepted, the signature is checked against the raw
    /// `body` before anything is parsed, and no write happens unless it passes.
    pub async fn handle(&self, method: &Method, signature: Option<&str>, body: &[u8]) -> Reply {
        if *method != Method::POST {
            return Reply::text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        }

        let event = match self.verify(signature, body) {
            Ok(event) => event,
            Err(e) => {
                warn!("Webhook signature verification failed: {e:#}");
                return Reply::text(StatusCode::BAD_REQUEST, format!("Webhook Error: {e}"));
            }
        };

        debug!("Received {} ({})", event.kind, event.id);
        match self.process(&event).await {
            Ok(()) => Reply::received(),
            Err(e) => {
                error!("Webhook handler error for {} ({}): {e:#}", event.kind, event.id);
                Reply::text(StatusCode::INTERNAL_SERVER_ERROR, "Webhook handler failed")
            }
        }
    }

    fn verify(&self, signature: Option<&str>, body: &[u8]) -> Result<Event> {
        signature::verify(
            body,
            signature,
            &self.secret,
            Utc::now().timestamp(),
            self.tolerance_secs,
        )?;
        serde_json::from_slice(body)
            .context("Unable to parse the event")
            .pub_result(ErrorType::Signature)
    }

    /// Applies a verified event. Downstream calls run one after the other and the first failure
    /// stops processing; earlier writes are kept.
    pub async fn process(&self, event: &Event) -> Result<()> {
        match event.event_kind() {
            EventKind::CheckoutCompleted => {
                let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
                    .context("Unable to read the checkout session")?;
                self.checkout_completed(&session).await
            }
            EventKind::SubscriptionChanged => {
                let sub: Subscription = serde_json::from_value(event.data.object.clone())
                    .context("Unable to read the subscription")?;
                self.subscription_changed(&sub).await
            }
            EventKind::Invoice | EventKind::Other => {
                debug!("Nothing to do for {}", event.kind);
                Ok(())
            }
        }
    }

    async fn checkout_completed(&self, session: &CheckoutSession) -> Result<()> {
        let user_id = session.user_id();
        let customer_id = session.customer_id();

        match (user_id, customer_id) {
            (Some(user), Some(customer)) => {
                self.accounts.upsert_customer(user, customer).await?;
                info!("Linked customer {customer} to user {user}");
            }
            _ => warn!("Checkout completed without a user id and customer, nothing to link"),
        }

        if !session.is_subscription() {
            return Ok(());
        }
        let Some(sub_id) = session.subscription_id() else {
            return Ok(());
        };
        let sub = self.billing.subscription(sub_id).await?;

        let user = match (user_id, customer_id) {
            (Some(user), _) => Some(user.to_string()),
            (None, Some(customer)) => self.accounts.user_for_customer(customer).await?,
            (None, None) => None,
        };
        match user {
            Some(user) => self.save_subscription(&user, &sub).await,
            None => {
                warn!("No user found for subscription {sub_id}");
                Ok(())
            }
        }
    }

    async fn subscription_changed(&self, sub: &Subscription) -> Result<()> {
        let Some(customer) = sub.customer_id() else {
            warn!("Subscription {} has no customer", sub.id);
            return Ok(());
        };
        let Some(user) = self.accounts.user_for_customer(customer).await? else {
            debug!("Customer {customer} is not linked to a user");
            return Ok(());
        };
        if sub.id.is_empty() {
            return Err(typed(ErrorType::Upstream, "The subscription event has no id"));
        }
        let full = self.billing.subscription(&sub.id).await?;
        self.save_subscription(&user, &full).await
    }

    async fn save_subscription(&self, user_id: &str, sub: &Subscription) -> Result<()> {
        let row = SubscriptionRow::new(user_id, sub, Utc::now());
        self.accounts.upsert_subscription(&row).await?;
        info!(
            "Saved subscription {} ({}) for user {user_id}",
            row.subscription_id, row.status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{MemoryAccounts, MemoryBilling};
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    struct Fixture {
        billing: Arc<MemoryBilling>,
        accounts: Arc<MemoryAccounts>,
        handler: WebhookHandler,
    }

    fn fixture() -> Fixture {
        let billing = Arc::new(MemoryBilling::default());
        billing.insert(Subscription {
            id: "sub_1".into(),
            status: "active".into(),
            customer: Some(crate::webhook::Expandable::Id("cus_1".into())),
            cancel_at_period_end: false,
            current_period_end: Some(1_735_689_600),
            items: serde_json::from_value(json!({"data": [{"price": {"id": "price_1"}}]}))
                .unwrap(),
        });
        let accounts = Arc::new(MemoryAccounts::default());
        let handler = WebhookHandler::new(SECRET, billing.clone(), accounts.clone());
        Fixture {
            billing,
            accounts,
            handler,
        }
    }

    fn signed(event: &serde_json::Value) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(event).unwrap();
        let header = signature::sign(&body, SECRET, Utc::now().timestamp()).unwrap();
        (body, header)
    }

    async fn deliver(f: &Fixture, event: serde_json::Value) -> Reply {
        let (body, header) = signed(&event);
        f.handler.handle(&Method::POST, Some(&header), &body).await
    }

    fn checkout() -> serde_json::Value {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "customer": "cus_1",
                "subscription": "sub_1",
                "mode": "subscription",
                "metadata": {"supabase_user_id": "u1"}
            }}
        })
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let f = fixture();
        let reply = f.handler.handle(&Method::GET, None, b"").await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(reply.body, "Method not allowed");
    }

    #[tokio::test]
    async fn test_checkout_completed() {
        let f = fixture();
        let reply = deliver(&f, checkout()).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, r#"{"received":true}"#);

        assert_eq!(f.accounts.customer_of("u1").as_deref(), Some("cus_1"));
        let row = f.accounts.subscription("sub_1").unwrap();
        assert_eq!(row.user_id, "u1");
        assert_eq!(row.status, "active");
        assert_eq!(row.price_id.as_deref(), Some("price_1"));
        assert_eq!(
            row.current_period_end.as_deref(),
            Some("2025-01-01T00:00:00.000Z")
        );
        assert_eq!(f.billing.fetched(), vec!["sub_1".to_string()]);
    }

    #[tokio::test]
    async fn test_checkout_without_metadata_uses_customer_mapping() {
        let f = fixture();
        f.accounts.upsert_customer("u9", "cus_1").await.unwrap();
        let mut event = checkout();
        event["data"]["object"]["metadata"] = json!({});
        event["data"]["object"]["customer"] = json!({"id": "cus_1"});
        let reply = deliver(&f, event).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(f.accounts.subscription("sub_1").unwrap().user_id, "u9");
    }

    #[tokio::test]
    async fn test_checkout_payment_mode_links_customer_only() {
        let f = fixture();
        let mut event = checkout();
        event["data"]["object"]["mode"] = json!("payment");
        assert_eq!(deliver(&f, event).await.status, StatusCode::OK);
        assert_eq!(f.accounts.customer_of("u1").as_deref(), Some("cus_1"));
        assert!(f.accounts.subscription("sub_1").is_none());
        assert!(f.billing.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_updated() {
        let f = fixture();
        f.accounts.upsert_customer("u1", "cus_1").await.unwrap();
        let event = json!({
            "id": "evt_2",
            "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_1", "customer": "cus_1", "status": "past_due"}}
        });
        assert_eq!(deliver(&f, event).await.status, StatusCode::OK);
        // The stored row comes from the fetched subscription, not the event payload.
        assert_eq!(f.accounts.subscription("sub_1").unwrap().status, "active");
    }

    #[tokio::test]
    async fn test_subscription_for_unknown_customer_is_ignored() {
        let f = fixture();
        let event = json!({
            "type": "customer.subscription.deleted",
            "data": {"object": {"id": "sub_1", "customer": "cus_404"}}
        });
        assert_eq!(deliver(&f, event).await.status, StatusCode::OK);
        assert!(f.accounts.subscription("sub_1").is_none());
        assert!(f.billing.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_and_unknown_events_are_acknowledged() {
        let f = fixture();
        for kind in ["invoice.payment_failed", "invoice.payment_succeeded", "charge.refunded"] {
            let event = json!({"type": kind, "data": {"object": {"id": "in_1"}}});
            assert_eq!(deliver(&f, event).await.status, StatusCode::OK);
        }
        assert!(f.accounts.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_writes_nothing() {
        let f = fixture();
        let (body, _) = signed(&checkout());
        let forged = signature::sign(&body, "whsec_wrong", Utc::now().timestamp()).unwrap();
        let reply = f.handler.handle(&Method::POST, Some(&forged), &body).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body.starts_with("Webhook Error: "), "{}", reply.body);
        assert!(f.accounts.is_empty());
        assert!(f.billing.fetched().is_empty());

        let reply = f.handler.handle(&Method::POST, None, &body).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_downstream_failure_is_500_and_keeps_earlier_writes() {
        let f = fixture();
        f.accounts.fail_subscription_writes();
        let reply = deliver(&f, checkout()).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body, "Webhook handler failed");
        assert_eq!(f.accounts.customer_of("u1").as_deref(), Some("cus_1"));
        assert!(f.accounts.subscription("sub_1").is_none());
    }

    #[tokio::test]
    async fn test_missing_subscription_is_500() {
        let f = fixture();
        let mut event = checkout();
        event["data"]["object"]["subscription"] = json!("sub_missing");
        let reply = deliver(&f, event).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
