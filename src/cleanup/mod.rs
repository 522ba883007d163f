pub mod filter;
pub mod http;
pub mod postgrest;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::runner::context::json_to_text;
pub use filter::{FilterSpec, PatternFilter, TestDataFilter};
pub use http::ApiBackend;
pub use postgrest::PostgrestBackend;

/// A user account as listed by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
}

/// A meal with whatever owner information the backend exposes
#[derive(Debug, Clone, PartialEq)]
pub struct MealRecord {
    pub id: String,
    pub title: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
}

impl MealRecord {
    /// Accepts both API (`userId`, `user`) and table (`user_id`, `users`) shapes
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("id").filter(|v| !v.is_null()).map(json_to_text)?;
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let user_id = ["userId", "user_id"]
            .iter()
            .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
            .map(json_to_text);
        let username = ["user", "users"]
            .iter()
            .find_map(|k| value.get(*k)?.get("username")?.as_str())
            .map(str::to_string);
        Some(Self {
            id,
            title,
            user_id,
            username,
        })
    }
}

impl UserRecord {
    pub fn from_json(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.get("id").filter(|v| !v.is_null()).map(json_to_text)?,
            username: value.get("username")?.as_str()?.to_string(),
        })
    }
}

/// Where test data lives and how to remove it
#[async_trait]
pub trait CleanupBackend: Send + Sync {
    /// Short label for console output
    fn describe(&self) -> String;

    /// All users, or `None` when the backend cannot list them
    async fn list_users(&self) -> Result<Option<Vec<UserRecord>>>;

    async fn list_meals(&self) -> Result<Vec<MealRecord>>;

    async fn delete_meal(&self, id: &str) -> Result<()>;

    async fn delete_user(&self, id: &str) -> Result<()>;

    fn supports_user_deletion(&self) -> bool;
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub test_users_found: usize,
    pub meals_found: usize,
    pub meals_deleted: usize,
    pub users_deleted: usize,
    pub errors: Vec<String>,
    /// Test meals and users still present afterwards
    pub remaining: usize,
    pub dry_run: bool,
}

impl CleanupReport {
    pub fn success(&self) -> bool {
        self.remaining == 0
    }
}

/// Test users (id -> username) and test meals found in one listing
struct TestData {
    users: BTreeMap<String, String>,
    meals: Vec<MealRecord>,
}

fn identify(
    users: Option<&[UserRecord]>,
    meals: &[MealRecord],
    filter: &dyn TestDataFilter,
) -> TestData {
    let mut test_users: BTreeMap<String, String> = users
        .unwrap_or_default()
        .iter()
        .filter(|u| filter.is_test_user(&u.username))
        .map(|u| (u.id.clone(), u.username.clone()))
        .collect();

    let owner_name = |meal: &MealRecord| -> Option<String> {
        meal.username.clone().or_else(|| {
            let owner = meal.user_id.as_deref()?;
            users?
                .iter()
                .find(|u| u.id == owner)
                .map(|u| u.username.clone())
        })
    };

    // First pass: every test user, including owners of test-titled meals
    for meal in meals {
        let owner = owner_name(meal);
        if owner.as_deref().is_some_and(|name| filter.is_protected(name)) {
            continue;
        }
        let (Some(id), Some(name)) = (&meal.user_id, &owner) else {
            continue;
        };
        if filter.is_test_user(name) {
            test_users.entry(id.clone()).or_insert_with(|| name.clone());
        } else if filter.is_test_meal(&meal.title) && !test_users.contains_key(id) {
            log::info!("'{}' marks owner {} as a test user", meal.title, name);
            test_users.insert(id.clone(), name.clone());
        }
    }

    // Second pass: meals owned by a test user or carrying a test title
    let test_meals = meals
        .iter()
        .filter(|&meal| {
            let owner = owner_name(meal);
            if owner.as_deref().is_some_and(|name| filter.is_protected(name)) {
                return false;
            }
            meal.user_id
                .as_ref()
                .is_some_and(|id| test_users.contains_key(id))
                || owner.as_deref().is_some_and(|name| filter.is_test_user(name))
                || filter.is_test_meal(&meal.title)
        })
        .cloned()
        .collect();

    TestData {
        users: test_users,
        meals: test_meals,
    }
}

/// Identify test data, delete it (meals before users), then re-list to verify
pub async fn run_cleanup(
    backend: &dyn CleanupBackend,
    filter: &dyn TestDataFilter,
    dry_run: bool,
) -> Result<CleanupReport> {
    let users = backend.list_users().await?;
    let meals = backend.list_meals().await?;
    let found = identify(users.as_deref(), &meals, filter);

    let mut report = CleanupReport {
        test_users_found: found.users.len(),
        meals_found: found.meals.len(),
        dry_run,
        ..Default::default()
    };
    log::info!(
        "{}: {} test users, {} test meals",
        backend.describe(),
        report.test_users_found,
        report.meals_found
    );

    let removable_users = if backend.supports_user_deletion() {
        found.users.len()
    } else {
        0
    };

    if dry_run {
        for meal in &found.meals {
            println!("  would delete meal '{}' ({})", meal.title, meal.id);
        }
        if backend.supports_user_deletion() {
            for (id, name) in &found.users {
                println!("  would delete user {} ({})", name, id);
            }
        }
        report.remaining = found.meals.len() + removable_users;
        return Ok(report);
    }

    for meal in &found.meals {
        match backend.delete_meal(&meal.id).await {
            Ok(()) => {
                log::debug!("deleted meal {}", meal.id);
                report.meals_deleted += 1;
            }
            Err(e) => {
                log::warn!("failed to delete meal {}: {}", meal.id, e);
                report
                    .errors
                    .push(format!("Failed to delete meal '{}' ({}): {}", meal.title, meal.id, e));
            }
        }
    }

    if backend.supports_user_deletion() {
        for (id, name) in &found.users {
            match backend.delete_user(id).await {
                Ok(()) => {
                    log::debug!("deleted user {}", id);
                    report.users_deleted += 1;
                }
                Err(e) => {
                    log::warn!("failed to delete user {}: {}", id, e);
                    report
                        .errors
                        .push(format!("Failed to delete user {} ({}): {}", name, id, e));
                }
            }
        }
    }

    let users = backend.list_users().await?;
    let meals = backend.list_meals().await?;
    let left = identify(users.as_deref(), &meals, filter);
    report.remaining = left.meals.len()
        + if backend.supports_user_deletion() {
            left.users.len()
        } else {
            0
        };

    Ok(report)
}

/// Console summary for a cleanup report
pub fn render_report(report: &CleanupReport) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(60));
    out.push_str(if report.dry_run {
        "\nCLEANUP SUMMARY (dry run)\n"
    } else {
        "\nCLEANUP SUMMARY\n"
    });
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!("Test users found: {}\n", report.test_users_found));
    out.push_str(&format!("Test meals found: {}\n", report.meals_found));
    out.push_str(&format!("Meals deleted: {}\n", report.meals_deleted));
    out.push_str(&format!("Users deleted: {}\n", report.users_deleted));
    out.push_str(&format!("Remaining: {}\n", report.remaining));
    if !report.errors.is_empty() {
        out.push_str(&format!("Errors ({}):\n", report.errors.len()));
        for error in &report.errors {
            out.push_str(&format!("  - {}\n", error));
        }
    }
    out
}
