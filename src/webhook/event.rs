//! The subset of billing event payloads the webhook reads, and the rows it writes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key that links a checkout to an application user.
pub const USER_ID_METADATA: &str = "supabase_user_id";

/// An event envelope. `data.object` is kept as raw JSON and read according to `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The event types the handler reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CheckoutCompleted,
    SubscriptionChanged,
    Invoice,
    Other,
}

impl Event {
    pub fn event_kind(&self) -> EventKind {
        match self.kind.as_str() {
            "checkout.session.completed" => EventKind::CheckoutCompleted,
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => EventKind::SubscriptionChanged,
            "invoice.payment_succeeded" | "invoice.payment_failed" => EventKind::Invoice,
            _ => EventKind::Other,
        }
    }
}

/// A reference to another object, either its bare id or the expanded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object(ObjectRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(o) => &o.id,
        }
    }
}

fn non_empty(value: &Option<Expandable>) -> Option<&str> {
    value.as_ref().map(Expandable::id).filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSession {
    pub fn customer_id(&self) -> Option<&str> {
        non_empty(&self.customer)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        non_empty(&self.subscription)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(USER_ID_METADATA)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn is_subscription(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Unix seconds.
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Option<Expandable>,
}

impl Subscription {
    pub fn customer_id(&self) -> Option<&str> {
        non_empty(&self.customer)
    }

    /// The price of the first subscription item.
    pub fn price_id(&self) -> Option<&str> {
        non_empty(&self.items.as_ref()?.data.first()?.price)
    }
}

/// A row of the hosted `subscriptions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRow {
    pub user_id: String,
    pub subscription_id: String,
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub updated_at: String,
}

impl SubscriptionRow {
    pub fn new(user_id: impl Into<String>, sub: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            subscription_id: sub.id.clone(),
            status: sub.status.clone(),
            price_id: sub.price_id().map(str::to_string),
            current_period_end: sub
                .current_period_end
                .filter(|secs| *secs != 0)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(iso),
            cancel_at_period_end: sub.cancel_at_period_end,
            updated_at: iso(now),
        }
    }
}

/// `2025-01-31T00:00:00.000Z`
fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
