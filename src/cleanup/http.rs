use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CleanupBackend, MealRecord, UserRecord};
use crate::runner::executor::error_message;

/// Cleanup through the public REST API, authenticated as a throwaway account
pub struct ApiBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiBackend {
    /// Register a temporary account and keep its token
    pub async fn connect(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let username = format!("cleanup_admin_{}", chrono::Utc::now().timestamp());
        let password = uuid::Uuid::new_v4().simple().to_string();

        let response = client
            .post(format!("{}/auth/register", base_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .context("Failed to reach the API")?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!(
                "Failed to register cleanup account: HTTP {}: {}",
                status.as_u16(),
                error_message(&text)
            );
        }

        let body: Value = serde_json::from_str(&text).context("Registration response is not JSON")?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .context("Registration response has no token")?
            .to_string();
        log::info!("registered cleanup account {}", username);

        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl CleanupBackend for ApiBackend {
    fn describe(&self) -> String {
        format!("API {}", self.base_url)
    }

    async fn list_users(&self) -> Result<Option<Vec<UserRecord>>> {
        Ok(None)
    }

    async fn list_meals(&self) -> Result<Vec<MealRecord>> {
        let response = self
            .client
            .get(format!("{}/meals", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to fetch meals: HTTP {}: {}", status.as_u16(), error_message(&text));
        }

        let body: Value = serde_json::from_str(&text).context("Meal list is not JSON")?;
        let items = body.as_array().context("Meal list is not an array")?;
        Ok(items.iter().filter_map(MealRecord::from_json).collect())
    }

    async fn delete_meal(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/meals/{}", self.base_url, id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status.as_u16(), error_message(&text));
        }
        Ok(())
    }

    async fn delete_user(&self, _id: &str) -> Result<()> {
        anyhow::bail!("the REST API cannot delete users")
    }

    fn supports_user_deletion(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{run_cleanup, FilterSpec, PatternFilter};
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_api_cleanup_deletes_matching_meals() {
        let deleted = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = deleted.clone();
        let app = Router::new()
            .route(
                "/auth/register",
                post(|| async { Json(json!({"token": "admin", "user": {"id": "a"}})) }),
            )
            .route(
                "/meals",
                get(|headers: HeaderMap| async move {
                    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer admin") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!([
                            {"id": "m1", "title": "Soup", "userId": "u1", "user": {"username": "chef_1700000000"}},
                            {"id": "m2", "title": "Pasta", "userId": "u2", "user": {"username": "alice"}}
                        ])),
                    )
                }),
            )
            .route(
                "/meals/:id",
                delete(move |Path(id): Path<String>| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(id);
                        Json(json!({"message": "Meal deleted successfully"}))
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let backend = ApiBackend::connect(reqwest::Client::new(), &format!("http://{}/", addr))
            .await
            .unwrap();
        let filter = PatternFilter::new(&FilterSpec {
            deny_usernames: vec![r"chef_\d+".into()],
            ..Default::default()
        })
        .unwrap();

        let report = run_cleanup(&backend, &filter, false).await.unwrap();

        assert_eq!(*deleted.lock().unwrap(), vec!["m1".to_string()]);
        assert_eq!(report.meals_deleted, 1);
        assert_eq!(report.users_deleted, 0);
    }

    #[tokio::test]
    async fn test_connect_reports_registration_error() {
        let app = Router::new().route(
            "/auth/register",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": "Registration closed"}))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = ApiBackend::connect(reqwest::Client::new(), &format!("http://{}", addr))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Registration closed"));
    }
}
