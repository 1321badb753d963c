use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::ResourceError;

type Result<T> = std::result::Result<T, ResourceError>;

pub const ROOT_PATH: &str = "/";
pub const ROOT_PRIMARY_TYPE: &str = "rep:root";
/// Primary type given to parents created on the way to a new resource.
pub const INTERMEDIATE_PRIMARY_TYPE: &str = "nt:unstructured";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    path: String,
    primary_type: String,
}

impl Resource {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Hierarchical resource tree with transactional writes.
///
/// Changes are visible to reads immediately and become durable on
/// [`commit`](ResourceStore::commit).
pub trait ResourceStore: Send + Sync {
    fn get(&self, path: &str) -> Option<Resource>;

    fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns the resource at `path`, creating it and any missing parents.
    /// An existing resource keeps its primary type.
    fn get_or_create(&self, path: &str, primary_type: &str) -> Result<Resource>;

    /// Deletes the resource at `path` and everything below it.
    fn delete(&self, path: &str) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn revert(&self);

    fn has_changes(&self) -> bool;
}

#[derive(Debug)]
struct StoreState {
    committed: BTreeMap<String, Resource>,
    working: BTreeMap<String, Resource>,
}

#[derive(Debug)]
pub struct InMemoryResourceStore {
    state: RwLock<StoreState>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(
            ROOT_PATH.to_string(),
            Resource {
                path: ROOT_PATH.to_string(),
                primary_type: ROOT_PRIMARY_TYPE.to_string(),
            },
        );
        Self {
            state: RwLock::new(StoreState {
                committed: resources.clone(),
                working: resources,
            }),
        }
    }
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute, no empty segments, no trailing slash (except for the root).
fn validate_path(path: &str) -> Result<()> {
    if path == ROOT_PATH {
        return Ok(());
    }
    let valid = path.starts_with('/')
        && path[1..]
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(ResourceError::InvalidPath(path.to_string()))
    }
}

/// Every ancestor of `path` below the root, outermost first.
fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .skip(1)
        .map(|(index, _)| &path[..index])
        .collect()
}

fn is_same_or_descendant(candidate: &str, path: &str) -> bool {
    candidate == path
        || candidate
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl ResourceStore for InMemoryResourceStore {
    fn get(&self, path: &str) -> Option<Resource> {
        self.state.read().working.get(path).cloned()
    }

    fn get_or_create(&self, path: &str, primary_type: &str) -> Result<Resource> {
        validate_path(path)?;
        let mut state = self.state.write();
        if let Some(existing) = state.working.get(path) {
            return Ok(existing.clone());
        }

        for parent in ancestors(path) {
            state
                .working
                .entry(parent.to_string())
                .or_insert_with(|| Resource {
                    path: parent.to_string(),
                    primary_type: INTERMEDIATE_PRIMARY_TYPE.to_string(),
                });
        }
        let resource = Resource {
            path: path.to_string(),
            primary_type: primary_type.to_string(),
        };
        state.working.insert(path.to_string(), resource.clone());
        debug!(path, primary_type, "Created resource");
        Ok(resource)
    }

    fn delete(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        if path == ROOT_PATH {
            return Err(ResourceError::InvalidPath(path.to_string()));
        }
        let mut state = self.state.write();
        if !state.working.contains_key(path) {
            return Err(ResourceError::NotFound(path.to_string()));
        }
        state
            .working
            .retain(|candidate, _| !is_same_or_descendant(candidate, path));
        debug!(path, "Deleted resource");
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.state.write();
        state.committed = state.working.clone();
        Ok(())
    }

    fn revert(&self) {
        let mut state = self.state.write();
        state.working = state.committed.clone();
    }

    fn has_changes(&self) -> bool {
        let state = self.state.read();
        state.working != state.committed
    }
}
