use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{CleanupBackend, MealRecord, UserRecord};
use crate::runner::executor::error_message;

/// Environment variables holding the database endpoint and service key
pub const URL_ENV: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const SERVICE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Direct table access through the database's PostgREST endpoint
pub struct PostgrestBackend {
    client: reqwest::Client,
    url: String,
    service_key: String,
}

impl PostgrestBackend {
    pub fn new(client: reqwest::Client, url: &str, service_key: &str) -> Result<Self> {
        if url.trim().is_empty() || service_key.trim().is_empty() {
            anyhow::bail!("Database URL and service key are required ({} / {})", URL_ENV, SERVICE_KEY_ENV);
        }
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{}", self.url, name)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>> {
        let response = self
            .authorized(self.client.get(self.table(table)))
            .query(&[("select", columns)])
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!(
                "Failed to list {}: HTTP {}: {}",
                table,
                status.as_u16(),
                error_message(&text)
            );
        }
        let rows: Vec<Value> =
            serde_json::from_str(&text).with_context(|| format!("{} listing is not a JSON array", table))?;
        Ok(rows)
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.table(table)))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("HTTP {}: {}", status.as_u16(), error_message(&text));
        }

        let rows: Vec<Value> = serde_json::from_str(&text).unwrap_or_default();
        if rows.is_empty() {
            anyhow::bail!("no {} row with id {}", table, id);
        }
        Ok(())
    }
}

#[async_trait]
impl CleanupBackend for PostgrestBackend {
    fn describe(&self) -> String {
        format!("database {}", self.url)
    }

    async fn list_users(&self) -> Result<Option<Vec<UserRecord>>> {
        let rows = self.select("users", "id,username").await?;
        Ok(Some(rows.iter().filter_map(UserRecord::from_json).collect()))
    }

    async fn list_meals(&self) -> Result<Vec<MealRecord>> {
        let rows = self.select("meals", "*,users(id,username)").await?;
        Ok(rows.iter().filter_map(MealRecord::from_json).collect())
    }

    async fn delete_meal(&self, id: &str) -> Result<()> {
        self.delete_row("meals", id).await
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.delete_row("users", id).await
    }

    fn supports_user_deletion(&self) -> bool {
        true
    }
}
