use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::{error::ResourceError, resource::ResourceStore};

pub const ORDERED_FOLDER: &str = "sling:OrderedFolder";

/// Per-test-run root paths below `/content`, `/apps` and `/libs`.
///
/// Each root is created on first access and removed again by
/// [`clean_up`](UniqueRoot::clean_up) when the run ends.
pub struct UniqueRoot {
    unique_path_part: String,
    store: Arc<dyn ResourceStore>,
    content: Mutex<Option<String>>,
    apps: Mutex<Option<String>>,
    libs: Mutex<Option<String>>,
}

impl UniqueRoot {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            unique_path_part: Uuid::new_v4().to_string(),
            store,
            content: Mutex::new(None),
            apps: Mutex::new(None),
            libs: Mutex::new(None),
        }
    }

    pub fn unique_path_part(&self) -> &str {
        &self.unique_path_part
    }

    /// `/content/<unique>`
    pub fn content(&self) -> Result<String, ResourceError> {
        self.get_or_create(&self.content, "/content")
    }

    /// `/apps/<unique>`
    pub fn apps(&self) -> Result<String, ResourceError> {
        self.get_or_create(&self.apps, "/apps")
    }

    /// `/libs/<unique>`
    pub fn libs(&self) -> Result<String, ResourceError> {
        self.get_or_create(&self.libs, "/libs")
    }

    fn get_or_create(
        &self,
        slot: &Mutex<Option<String>>,
        parent: &str,
    ) -> Result<String, ResourceError> {
        let mut slot = slot.lock();
        if let Some(path) = slot.as_ref() {
            return Ok(path.clone());
        }
        let path = format!("{parent}/{}", self.unique_path_part);
        let resource = self.store.get_or_create(&path, ORDERED_FOLDER)?;
        *slot = Some(resource.path().to_string());
        Ok(resource.path().to_string())
    }

    /// Deletes the roots created so far and commits. Failures are logged,
    /// not returned.
    pub fn clean_up(&self) {
        for slot in [&self.content, &self.apps, &self.libs] {
            let Some(path) = slot.lock().take() else {
                continue;
            };
            if !self.store.exists(&path) {
                continue;
            }
            if let Err(e) = self.store.delete(&path) {
                warn!(path, error = %e, "Unable to delete root path");
            }
        }
        if let Err(e) = self.store.commit() {
            warn!(error = %e, "Unable to commit root path deletions");
        }
    }
}

impl std::fmt::Debug for UniqueRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniqueRoot")
            .field("unique_path_part", &self.unique_path_part)
            .finish()
    }
}
