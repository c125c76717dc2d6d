use futures::future::BoxFuture;

use super::traits::HandlerError;
use super::types::{HandlerResult, Payload};

pub type ActionResult = Result<HandlerResult, HandlerError>;

/// Members of the handler contract itself; never dispatchable as actions
pub const RESERVED_NAMES: &[&str] = &["execute", "available_actions", "site_id"];

/// Bound operation of a scraper `S`
///
/// Plain methods shaped `fn search(&self, payload: Payload) -> BoxFuture<'_, ActionResult>`
/// coerce to this type.
pub type ActionFn<S> = for<'a> fn(&'a S, Payload) -> BoxFuture<'a, ActionResult>;

/// What an action name resolves to
pub enum Resolution<S> {
    Operation(ActionFn<S>),
    /// Name belongs to the contract rather than to an operation
    NotInvokable,
    Unknown,
}

/// Explicit name -> operation table built once per handler
pub struct ActionTable<S> {
    entries: Vec<(String, ActionFn<S>)>,
}

impl<S> ActionTable<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an action; a later entry with the same name replaces the earlier one.
    /// Reserved contract names are ignored.
    pub fn action(mut self, name: impl Into<String>, operation: ActionFn<S>) -> Self {
        let name = name.into();
        if RESERVED_NAMES.contains(&name.as_str()) {
            tracing::warn!(action = %name, "Ignoring action that shadows a contract member");
            return self;
        }

        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = operation,
            None => self.entries.push((name, operation)),
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Resolution<S> {
        if RESERVED_NAMES.contains(&name) {
            return Resolution::NotInvokable;
        }

        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, operation)| Resolution::Operation(*operation))
            .unwrap_or(Resolution::Unknown)
    }

    /// Action names in registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S> Default for ActionTable<S> {
    fn default() -> Self {
        Self::new()
    }
}
