//! Handler system for ScrapeBox
//!
//! Every scraping handler is reached through the [`ScrapeHandler`] contract:
//! a site identifier, a list of actions, and an `execute` entry point that
//! always returns a [`HandlerResult`].
//!
//! ## Key Components
//!
//! - [`ScrapeHandler`] - Contract the dispatcher invokes
//! - [`Scraper`] / [`SiteHandler`] - Site logic plus its explicit [`ActionTable`]
//! - [`HandlerRegistry`] - Site identifier -> handler factory
//! - [`DemoScraper`] - Built-in offline handler
//!
//! ## Example
//!
//! ```rust,ignore
//! use scrapebox::handlers::{self, HandlerRegistry};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.discover(handlers::builtin());
//!
//! let handler = registry.get("demo")?.expect("demo is built in");
//! let result = handler.execute("search_product", payload).await;
//! ```

mod actions;
mod demo;
mod registry;
mod traits;
mod types;

pub use actions::{ActionFn, ActionResult, ActionTable, RESERVED_NAMES, Resolution};
pub use demo::DemoScraper;
pub use registry::{
    HandlerCandidate, HandlerDescriptor, HandlerFactory, HandlerRegistry, RegistryError,
};
pub use traits::{HandlerError, ScrapeHandler, Scraper, SiteHandler};
pub use types::{ExecutionTiming, HandlerInfo, HandlerResult, Payload, ResultStatus};

/// Handlers compiled into this binary, in the order they are offered to
/// [`HandlerRegistry::discover`]
pub fn builtin() -> Vec<HandlerCandidate> {
    vec![HandlerCandidate::scraper::<DemoScraper>()]
}
