use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Users directory kept in memory; stands in for the users service.
#[derive(Default)]
pub struct MemoryProfileLookup {
    profiles: RwLock<HashMap<UserId, String>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryProfileLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles<'a>(profiles: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let lookup = Self::new();
        for (id, name) in profiles {
            if let Ok(id) = UserId::new(id) {
                lookup.insert(id, name);
            }
        }
        lookup
    }

    pub fn insert(&self, id: UserId, name: &str) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(id, name.to_owned());
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `resolve` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProfileLookup for MemoryProfileLookup {
    async fn resolve(&self, ids: &[UserId]) -> Result<Vec<Profile>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable("memory lookup switched off".into()));
        }

        let profiles = self
            .profiles
            .read()
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        // reverse of the request order; callers reorder
        Ok(ids
            .iter()
            .rev()
            .filter_map(|id| {
                profiles.get(id).map(|name| Profile {
                    id: id.clone(),
                    name: name.clone(),
                })
            })
            .collect())
    }
}
