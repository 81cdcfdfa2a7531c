//! Resolution of server ids to service locators.
//!
//! The directory only knows servers by [`ServerId`]. Serialization needs the
//! network locator clients dial, which lives in the cluster's server list.

use std::collections::HashMap;
use tablets_common::ServerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown server {0}")]
    UnknownServer(ServerId),
}

/// Source of service locators for serialization.
pub trait ServerRegistry: Send + Sync {
    /// The locator string for `id`, or `UnknownServer` if it is not enlisted.
    fn locator(&self, id: ServerId) -> Result<String, RegistryError>;
}

/// A fixed, in-memory server list.
#[derive(Debug, Clone, Default)]
pub struct StaticServerRegistry {
    locators: HashMap<ServerId, String>,
}

impl StaticServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enlist a server. Returns the previous locator if `id` was present.
    pub fn insert(&mut self, id: ServerId, locator: impl Into<String>) -> Option<String> {
        self.locators.insert(id, locator.into())
    }

    pub fn remove(&mut self, id: ServerId) -> Option<String> {
        self.locators.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

impl FromIterator<(ServerId, String)> for StaticServerRegistry {
    fn from_iter<I: IntoIterator<Item = (ServerId, String)>>(iter: I) -> Self {
        Self {
            locators: iter.into_iter().collect(),
        }
    }
}

impl ServerRegistry for StaticServerRegistry {
    fn locator(&self, id: ServerId) -> Result<String, RegistryError> {
        self.locators
            .get(&id)
            .cloned()
            .ok_or(RegistryError::UnknownServer(id))
    }
}
