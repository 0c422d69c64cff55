//! The billing provider seam. `StripeClient` reads subscriptions from the Stripe REST API.

use crate::error::{ErrorType, IntoResult};
use crate::webhook::event::Subscription;
use crate::Result;
use anyhow::{bail, Context};
use tracing::trace;
use url::Url;

/// Default root of the billing REST API.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1/";

/// API version pinned on every request.
pub const STRIPE_API_VERSION: &str = "2024-06-20";

/// Reads subscription state from the billing provider.
#[async_trait::async_trait]
pub trait Billing: Send + Sync {
    /// Fetches the subscription `id` with its item prices expanded.
    async fn subscription(&self, id: &str) -> Result<Subscription>;
}

pub struct StripeClient {
    http: reqwest::Client,
    base: Url,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    /// A client against another API root, e.g. a local mock.
    pub fn with_base_url(secret_key: impl Into<String>, base: &str) -> Result<Self> {
        let base = super::directory_url(base)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("budget-planner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            http,
            base,
            secret_key: secret_key.into(),
        })
    }

    fn subscription_url(&self, id: &str) -> Result<Url> {
        let mut url = self
            .base
            .join("subscriptions/")
            .and_then(|u| u.join(id))
            .with_context(|| format!("Invalid subscription id '{id}'"))?;
        url.query_pairs_mut()
            .append_pair("expand[]", "items.data.price");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Billing for StripeClient {
    async fn subscription(&self, id: &str) -> Result<Subscription> {
        let url = self.subscription_url(id)?;
        trace!("GET {url}");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .with_context(|| format!("Unable to reach the billing API for subscription {id}"))
            .pub_result(ErrorType::Upstream)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("{body}"))
                .with_context(|| format!("Retrieving subscription {id} failed with {status}"))
                .pub_result(ErrorType::Upstream);
        }
        let sub: Subscription = response
            .json()
            .await
            .with_context(|| format!("Unable to parse subscription {id}"))
            .pub_result(ErrorType::Upstream)?;
        if sub.id.is_empty() {
            bail!("The billing API returned subscription {id} without an id");
        }
        Ok(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_url() {
        let client = StripeClient::new("sk_test").unwrap();
        assert_eq!(
            client.subscription_url("sub_1").unwrap().as_str(),
            "https://api.stripe.com/v1/subscriptions/sub_1?expand%5B%5D=items.data.price"
        );

        let client = StripeClient::with_base_url("sk_test", "http://127.0.0.1:12111/v1").unwrap();
        assert_eq!(
            client.subscription_url("sub_2").unwrap().path(),
            "/v1/subscriptions/sub_2"
        );
    }
}
