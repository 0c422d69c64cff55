//! The hosted account database seam. `SupabaseStore` talks to the database's REST endpoint with
//! the service role key.

use crate::error::{ErrorType, IntoResult};
use crate::webhook::event::SubscriptionRow;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

pub const CUSTOMERS_TABLE: &str = "stripe_customers";
pub const SUBSCRIPTIONS_TABLE: &str = "subscriptions";

/// Maps billing customers to users and keeps the subscription table current.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Upserts `stripe_customers(user_id, customer_id)`, keyed on `user_id`.
    async fn upsert_customer(&self, user_id: &str, customer_id: &str) -> Result<()>;

    /// The user mapped to `customer_id`, if any.
    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<String>>;

    /// Upserts a `subscriptions` row, keyed on `subscription_id`.
    async fn upsert_subscription(&self, row: &SubscriptionRow) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRow {
    pub user_id: String,
    pub customer_id: String,
}

pub struct SupabaseStore {
    http: reqwest::Client,
    rest: Url,
    service_key: String,
}

impl SupabaseStore {
    /// `project_url` is the project root, the REST endpoint is `{project_url}/rest/v1/`.
    pub fn new(project_url: &str, service_key: impl Into<String>) -> Result<Self> {
        let rest = super::directory_url(project_url)?
            .join("rest/v1/")
            .context("Unable to build the REST endpoint")?;
        let http = reqwest::Client::builder()
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            http,
            rest,
            service_key: service_key.into(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.rest
            .join(table)
            .with_context(|| format!("Invalid table name '{table}'"))
    }

    fn upsert_url(&self, table: &str, on_conflict: &str) -> Result<Url> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn upsert<T: Serialize + Sync>(&self, table: &str, on_conflict: &str, row: &T) -> Result<()> {
        let url = self.upsert_url(table, on_conflict)?;
        trace!("POST {url}");
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await
            .with_context(|| format!("Unable to reach the database to upsert {table}"))
            .pub_result(ErrorType::Upstream)?;
        check(response, || format!("Upsert {table} failed")).await?;
        Ok(())
    }
}

/// Turns a non-success response into an `Upstream` error carrying the response body.
async fn check(
    response: reqwest::Response,
    what: impl FnOnce() -> String,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!("{status}: {body}"))
        .context(what())
        .pub_result(ErrorType::Upstream)
}

#[async_trait::async_trait]
impl AccountStore for SupabaseStore {
    async fn upsert_customer(&self, user_id: &str, customer_id: &str) -> Result<()> {
        let row = CustomerRow {
            user_id: user_id.to_string(),
            customer_id: customer_id.to_string(),
        };
        self.upsert(CUSTOMERS_TABLE, "user_id", &row).await
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<Option<String>> {
        let mut url = self.table_url(CUSTOMERS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "user_id")
            .append_pair("customer_id", &format!("eq.{customer_id}"))
            .append_pair("limit", "1");
        trace!("GET {url}");
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .context("Unable to reach the database to look up the customer")
            .pub_result(ErrorType::Upstream)?;
        let response = check(response, || format!("Select {CUSTOMERS_TABLE} failed")).await?;

        #[derive(Deserialize)]
        struct UserId {
            user_id: Option<String>,
        }
        let rows: Vec<UserId> = response
            .json()
            .await
            .with_context(|| format!("Unable to parse the {CUSTOMERS_TABLE} response"))
            .pub_result(ErrorType::Upstream)?;
        Ok(rows.into_iter().next().and_then(|r| r.user_id))
    }

    async fn upsert_subscription(&self, row: &SubscriptionRow) -> Result<()> {
        self.upsert(SUBSCRIPTIONS_TABLE, "subscription_id", row).await
    }
}
