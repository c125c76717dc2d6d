use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::traits::{HandlerError, ScrapeHandler, Scraper, SiteHandler};
use super::types::HandlerInfo;

/// Builds a fresh handler instance per lookup
pub type HandlerFactory =
    Arc<dyn Fn() -> Result<Box<dyn ScrapeHandler>, HandlerError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler {0} does not define a site_id")]
    MissingSiteId(String),
}

/// Registry entry: identifier, implementation name and factory
#[derive(Clone)]
pub struct HandlerDescriptor {
    site_id: Option<String>,
    implementation: String,
    factory: HandlerFactory,
}

impl HandlerDescriptor {
    pub fn new<F>(
        site_id: Option<String>,
        implementation: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Result<Box<dyn ScrapeHandler>, HandlerError> + Send + Sync + 'static,
    {
        Self {
            site_id: site_id.filter(|id| !id.trim().is_empty()),
            implementation: implementation.into(),
            factory: Arc::new(factory),
        }
    }

    /// Descriptor for a [`Scraper`] bound through [`SiteHandler`]
    pub fn for_scraper<S: Scraper>() -> Self {
        Self::new(
            Some(S::SITE_ID.to_string()),
            std::any::type_name::<S>(),
            || {
                SiteHandler::<S>::build()
                    .map(|handler| Box::new(handler) as Box<dyn ScrapeHandler>)
            },
        )
    }

    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn instantiate(&self) -> Result<Box<dyn ScrapeHandler>, HandlerError> {
        (self.factory)()
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("site_id", &self.site_id)
            .field("implementation", &self.implementation)
            .finish_non_exhaustive()
    }
}

type CandidateLoader = Box<dyn FnOnce() -> Result<HandlerDescriptor, HandlerError> + Send>;

/// One implementation offered to [`HandlerRegistry::discover`]
pub struct HandlerCandidate {
    name: String,
    loader: CandidateLoader,
}

impl HandlerCandidate {
    pub fn new<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: FnOnce() -> Result<HandlerDescriptor, HandlerError> + Send + 'static,
    {
        Self {
            name: name.into(),
            loader: Box::new(loader),
        }
    }

    pub fn scraper<S: Scraper>() -> Self {
        Self::new(std::any::type_name::<S>(), || {
            Ok(HandlerDescriptor::for_scraper::<S>())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry mapping site identifiers to handler factories
///
/// Populated once at startup, then shared read-only behind an `Arc`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, HandlerDescriptor>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a descriptor. An existing entry for the same site is replaced
    /// and the replaced implementation name is returned.
    pub fn register(
        &mut self,
        descriptor: HandlerDescriptor,
    ) -> Result<Option<String>, RegistryError> {
        let site_id = descriptor
            .site_id()
            .ok_or_else(|| RegistryError::MissingSiteId(descriptor.implementation.clone()))?
            .to_string();
        let implementation = descriptor.implementation.clone();

        let replaced = self
            .handlers
            .insert(site_id.clone(), descriptor)
            .map(|previous| previous.implementation);

        if let Some(ref previous) = replaced {
            warn!(
                site_id = %site_id,
                replaced = %previous,
                replacement = %implementation,
                "Handler already registered, replacing"
            );
        }
        info!(site_id = %site_id, implementation = %implementation, "Handler registered");

        Ok(replaced)
    }

    /// Load and register every usable candidate; returns how many were registered.
    /// A candidate that fails to load is logged and skipped.
    pub fn discover(&mut self, candidates: impl IntoIterator<Item = HandlerCandidate>) -> usize {
        let mut count = 0;

        for candidate in candidates {
            let HandlerCandidate { name, loader } = candidate;

            let descriptor = match loader() {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    error!(candidate = %name, error = %err, "Failed to load handler candidate");
                    continue;
                }
            };

            if descriptor.site_id().is_none() {
                debug!(candidate = %name, "Skipping candidate without site_id");
                continue;
            }

            match self.register(descriptor) {
                Ok(_) => count += 1,
                Err(err) => {
                    error!(candidate = %name, error = %err, "Failed to register handler candidate")
                }
            }
        }

        info!(count, "Handler discovery complete");
        count
    }

    /// Fresh handler instance for `site_id`, or `None` when nothing is registered
    pub fn get(&self, site_id: &str) -> Result<Option<Box<dyn ScrapeHandler>>, HandlerError> {
        self.handlers
            .get(site_id)
            .map(HandlerDescriptor::instantiate)
            .transpose()
    }

    pub fn has(&self, site_id: &str) -> bool {
        self.handlers.contains_key(site_id)
    }

    /// Registered site identifiers, sorted
    pub fn list_ids(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn describe(&self, site_id: &str) -> Result<Option<HandlerInfo>, HandlerError> {
        let Some(descriptor) = self.handlers.get(site_id) else {
            return Ok(None);
        };
        let handler = descriptor.instantiate()?;

        Ok(Some(HandlerInfo {
            site_id: site_id.to_string(),
            implementation: descriptor.implementation.clone(),
            available_actions: handler.available_actions(),
        }))
    }

    /// Describe every entry, skipping those whose construction fails
    pub fn describe_all(&self) -> Vec<HandlerInfo> {
        self.handlers
            .keys()
            .filter_map(|site_id| match self.describe(site_id) {
                Ok(info) => info,
                Err(err) => {
                    warn!(site_id = %site_id, error = %err, "Cannot describe handler");
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("site_ids", &self.list_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::actions::{ActionResult, ActionTable};
    use crate::handlers::types::{HandlerResult, Payload};
    use futures::FutureExt;
    use futures::future::BoxFuture;

    struct Olx;

    impl Olx {
        fn search_product(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
            async { Ok(HandlerResult::completed(Payload::new()).with_data("source", "olx")) }
                .boxed()
        }
    }

    impl Scraper for Olx {
        const SITE_ID: &'static str = "olx";

        fn build() -> Result<Self, HandlerError> {
            Ok(Olx)
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new().action("search_product", Olx::search_product)
        }
    }

    struct OlxMobile;

    impl OlxMobile {
        fn search_product(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
            async { Ok(HandlerResult::completed(Payload::new()).with_data("source", "olx-mobile")) }
                .boxed()
        }

        fn get_ad_details(&self, _payload: Payload) -> BoxFuture<'_, ActionResult> {
            async { Ok(HandlerResult::pending("not implemented")) }.boxed()
        }
    }

    impl Scraper for OlxMobile {
        const SITE_ID: &'static str = "olx";

        fn build() -> Result<Self, HandlerError> {
            Ok(OlxMobile)
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
                .action("search_product", OlxMobile::search_product)
                .action("get_ad_details", OlxMobile::get_ad_details)
        }
    }

    struct Amazon;

    impl Scraper for Amazon {
        const SITE_ID: &'static str = "amazon";

        fn build() -> Result<Self, HandlerError> {
            Ok(Amazon)
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
        }
    }

    struct Unnamed;

    impl Scraper for Unnamed {
        const SITE_ID: &'static str = "";

        fn build() -> Result<Self, HandlerError> {
            Ok(Unnamed)
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
        }
    }

    struct Broken;

    impl Scraper for Broken {
        const SITE_ID: &'static str = "broken";

        fn build() -> Result<Self, HandlerError> {
            Err(HandlerError::Construction {
                site_id: "broken".to_string(),
                reason: "session bootstrap failed".to_string(),
            })
        }

        fn actions() -> ActionTable<Self> {
            ActionTable::new()
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = HandlerRegistry::new();
        let replaced = registry
            .register(HandlerDescriptor::for_scraper::<Olx>())
            .unwrap();

        assert!(replaced.is_none());
        assert!(registry.has("olx"));
        assert!(!registry.has("amazon"));

        let handler = registry.get("olx").unwrap().unwrap();
        assert_eq!(handler.site_id(), "olx");
        assert!(registry.get("amazon").unwrap().is_none());
    }

    #[test]
    fn test_register_without_site_id_fails() {
        let mut registry = HandlerRegistry::new();
        let result = registry.register(HandlerDescriptor::for_scraper::<Unnamed>());

        assert!(matches!(result, Err(RegistryError::MissingSiteId(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_last_writer_wins() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerDescriptor::for_scraper::<Olx>())
            .unwrap();
        let replaced = registry
            .register(HandlerDescriptor::for_scraper::<OlxMobile>())
            .unwrap();

        assert!(replaced.unwrap().ends_with("Olx"));
        assert_eq!(registry.len(), 1);

        let handler = registry.get("olx").unwrap().unwrap();
        assert!(handler.implementation().ends_with("OlxMobile"));

        let result = handler.execute("search_product", Payload::new()).await;
        assert_eq!(result.data["source"], "olx-mobile");
    }

    #[test]
    fn test_discover_skips_failing_candidates() {
        let mut registry = HandlerRegistry::new();
        let candidates = vec![
            HandlerCandidate::scraper::<Olx>(),
            HandlerCandidate::new("scrapers::netshoes", || {
                Err(HandlerError::Failed("browser runtime not installed".to_string()))
            }),
            HandlerCandidate::scraper::<Amazon>(),
        ];

        let count = registry.discover(candidates);

        assert_eq!(count, 2);
        assert_eq!(registry.list_ids(), vec!["amazon", "olx"]);
    }

    #[test]
    fn test_discover_filters_candidates_without_site_id() {
        let mut registry = HandlerRegistry::new();
        let count = registry.discover(vec![
            HandlerCandidate::scraper::<Unnamed>(),
            HandlerCandidate::scraper::<Amazon>(),
        ]);

        assert_eq!(count, 1);
        assert_eq!(registry.list_ids(), vec!["amazon"]);
    }

    #[test]
    fn test_get_propagates_construction_failure() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerDescriptor::for_scraper::<Broken>())
            .unwrap();

        let result = registry.get("broken");
        assert!(matches!(result, Err(HandlerError::Construction { .. })));
    }

    #[test]
    fn test_describe() {
        let mut registry = HandlerRegistry::new();
        registry.discover(vec![
            HandlerCandidate::scraper::<OlxMobile>(),
            HandlerCandidate::scraper::<Broken>(),
        ]);

        let info = registry.describe("olx").unwrap().unwrap();
        assert_eq!(info.site_id, "olx");
        assert!(info.implementation.ends_with("OlxMobile"));
        assert_eq!(info.available_actions, vec!["search_product", "get_ad_details"]);

        assert!(registry.describe("unknown").unwrap().is_none());
        assert!(registry.describe("broken").is_err());

        let all = registry.describe_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].site_id, "olx");
    }
}
