//! Process-wide named properties.
//!
//! Properties sit between environment variables and compiled-in defaults in
//! the configuration precedence chain. They let an embedding application
//! configure the writer programmatically without touching the environment.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

fn store() -> &'static RwLock<HashMap<String, String>> {
    static PROPERTIES: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();
    PROPERTIES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Set a property, returning the previous value if any.
pub fn set_property(key: impl Into<String>, value: impl Into<String>) -> Option<String> {
    store()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key.into(), value.into())
}

/// Look up a property. Blank values read as absent.
pub fn property(key: &str) -> Option<String> {
    store()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .cloned()
}

/// Remove a property, returning its value if it was set.
pub fn remove_property(key: &str) -> Option<String> {
    store()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key)
}
