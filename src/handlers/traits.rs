use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{error, info};

use super::actions::{ActionTable, Resolution};
use super::types::{ExecutionTiming, HandlerResult, Payload};

/// Handler errors
///
/// Operations return these; `execute` turns them into failed results.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler {0} must define a non-empty site_id")]
    MissingSiteId(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Failed(String),
    #[error("failed to construct handler '{site_id}': {reason}")]
    Construction { site_id: String, reason: String },
}

/// Capability contract the dispatcher invokes handlers through
#[async_trait]
pub trait ScrapeHandler: Send + Sync {
    /// Site identifier this handler serves
    fn site_id(&self) -> &str;

    /// Concrete implementation name, for diagnostics
    fn implementation(&self) -> &str;

    /// Names accepted by `execute`
    fn available_actions(&self) -> Vec<String>;

    /// Run `action` with `payload`. Never fails: every failure comes back
    /// as a `failed` result.
    async fn execute(&self, action: &str, payload: Payload) -> HandlerResult;
}

/// Site-specific scraping logic plugged into a [`SiteHandler`]
pub trait Scraper: Send + Sync + Sized + 'static {
    /// Empty means "not a registrable handler"
    const SITE_ID: &'static str;

    fn build() -> Result<Self, HandlerError>;

    fn actions() -> ActionTable<Self>;
}

/// Binds a scraper to its site identifier and action table
pub struct SiteHandler<S> {
    site_id: String,
    actions: ActionTable<S>,
    scraper: S,
}

impl<S: Send + Sync + 'static> SiteHandler<S> {
    pub fn new(
        site_id: impl Into<String>,
        scraper: S,
        actions: ActionTable<S>,
    ) -> Result<Self, HandlerError> {
        let site_id = site_id.into();
        if site_id.trim().is_empty() {
            return Err(HandlerError::MissingSiteId(
                std::any::type_name::<S>().to_string(),
            ));
        }

        Ok(Self {
            site_id,
            actions,
            scraper,
        })
    }
}

impl<S: Scraper> SiteHandler<S> {
    pub fn build() -> Result<Self, HandlerError> {
        Self::new(S::SITE_ID, S::build()?, S::actions())
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> ScrapeHandler for SiteHandler<S> {
    fn site_id(&self) -> &str {
        &self.site_id
    }

    fn implementation(&self) -> &str {
        std::any::type_name::<S>()
    }

    fn available_actions(&self) -> Vec<String> {
        self.actions.names()
    }

    async fn execute(&self, action: &str, payload: Payload) -> HandlerResult {
        let operation = match self.actions.resolve(action) {
            Resolution::Operation(operation) => operation,
            Resolution::NotInvokable => {
                return HandlerResult::failed(format!("'{action}' is not a valid action"));
            }
            Resolution::Unknown => {
                return HandlerResult::unsupported(
                    action,
                    &self.site_id,
                    self.available_actions(),
                );
            }
        };

        info!(site_id = %self.site_id, action, "Executing action");

        let started_at = Utc::now();
        let outcome = AssertUnwindSafe(operation(&self.scraper, payload))
            .catch_unwind()
            .await;
        let timing = ExecutionTiming {
            started_at,
            completed_at: Utc::now(),
        };

        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                error!(site_id = %self.site_id, action, error = %err, "Action failed");
                HandlerResult::failed(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(site_id = %self.site_id, action, error = %message, "Action panicked");
                HandlerResult::failed(message)
            }
        };

        result.record_timing(&timing);
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::actions::ActionResult;
    use crate::handlers::types::ResultStatus;
    use futures::future::BoxFuture;
    use serde_json::{Value, json};

    struct Catalog;

    impl Catalog {
        fn search_product(&self, payload: Payload) -> BoxFuture<'_, ActionResult> {
            async move {
                let query = payload
                    .get("query")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HandlerError::InvalidPayload("query is required".into()))?;
                Ok(HandlerResult::completed(Payload::new())
                    .with_data("query", query)
                    .with_metadata("page", 1))
            }
            .boxed()
        }

        fn explode(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
            async { Err(HandlerError::Failed("connection reset by peer".into())) }.boxed()
        }

        fn panics(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
            async {
                let cards: Vec<&str> = Vec::new();
                let first = cards[0];
                Ok(HandlerResult::completed(Payload::new()).with_data("first", first))
            }
            .boxed()
        }
    }

    impl Scraper for Catalog {
        const SITE_ID: &'static str = "catalog";

        fn build() -> Result<Self, HandlerError> {
            Ok(Catalog)
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
                .action("search_product", Catalog::search_product)
                .action("explode", Catalog::explode)
                .action("panics", Catalog::panics)
        }
    }

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_missing_site_id_is_configuration_error() {
        let result = SiteHandler::new("  ", Catalog, Catalog::actions());
        assert!(matches!(result, Err(HandlerError::MissingSiteId(_))));
    }

    #[test]
    fn test_available_actions_exclude_contract_members() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        assert_eq!(handler.site_id(), "catalog");
        assert_eq!(
            handler.available_actions(),
            vec!["search_product", "explode", "panics"]
        );
        assert!(handler.implementation().ends_with("Catalog"));
    }

    #[tokio::test]
    async fn test_execute_success_stamps_timing() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler
            .execute("search_product", payload(json!({"query": "phone"})))
            .await;

        assert_eq!(result.status, ResultStatus::Completed);
        assert_eq!(result.data["query"], "phone");
        assert_eq!(result.metadata["page"], 1);
        assert!(result.metadata["duration_ms"].as_i64().unwrap() >= 0);
        assert!(result.metadata.contains_key("started_at"));
        assert!(result.metadata.contains_key("completed_at"));
    }

    #[tokio::test]
    async fn test_execute_unknown_action() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler.execute("get_reviews", Payload::new()).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("action 'get_reviews' not supported by 'catalog'")
        );
        assert_eq!(
            result.metadata["available_actions"],
            json!(["search_product", "explode", "panics"])
        );
    }

    #[tokio::test]
    async fn test_execute_contract_member_is_rejected() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler.execute("execute", Payload::new()).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("'execute' is not a valid action"));
        assert!(!result.metadata.contains_key("started_at"));
    }

    #[tokio::test]
    async fn test_execute_converts_error_into_failed_result() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler.execute("explode", Payload::new()).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("connection reset by peer"));
        assert!(result.metadata["duration_ms"].as_i64().unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_execute_converts_invalid_payload() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler.execute("search_product", Payload::new()).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(
            result.error.as_deref(),
            Some("invalid payload: query is required")
        );
    }

    #[tokio::test]
    async fn test_execute_catches_panics() {
        let handler = SiteHandler::<Catalog>::build().unwrap();
        let result = handler.execute("panics", Payload::new()).await;

        assert_eq!(result.status, ResultStatus::Failed);
        assert!(
            result
                .error
                .as_deref()
                .unwrap()
                .starts_with("index out of bounds")
        );
        assert!(result.metadata.contains_key("completed_at"));
    }
}
