use std::collections::BTreeSet;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::SettingsError;

/// Interface name the settings service is registered under.
pub const SETTINGS_SERVICE: &str = "org.apache.sling.settings.SlingSettingsService";

/// Settings service with configurable run modes and a random instance id.
#[derive(Debug)]
pub struct MockSettingService {
    run_modes: RwLock<BTreeSet<String>>,
    sling_id: String,
}

impl MockSettingService {
    pub fn new() -> Self {
        Self::with_run_modes(Vec::<String>::new())
    }

    pub fn with_run_modes<I, S>(run_modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            run_modes: RwLock::new(run_modes.into_iter().map(Into::into).collect()),
            sling_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_modes(&self) -> BTreeSet<String> {
        self.run_modes.read().clone()
    }

    pub fn set_run_modes<I, S>(&self, run_modes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.run_modes.write() = run_modes.into_iter().map(Into::into).collect();
    }

    pub fn sling_id(&self) -> &str {
        &self.sling_id
    }

    pub fn absolute_path_within_sling_home(
        &self,
        _relative_path: &str,
    ) -> Result<String, SettingsError> {
        Err(SettingsError::Unsupported("absolute_path_within_sling_home"))
    }

    pub fn sling_home_path(&self) -> Result<String, SettingsError> {
        Err(SettingsError::Unsupported("sling_home_path"))
    }

    pub fn sling_name(&self) -> Result<String, SettingsError> {
        Err(SettingsError::Unsupported("sling_name"))
    }

    pub fn sling_description(&self) -> Result<String, SettingsError> {
        Err(SettingsError::Unsupported("sling_description"))
    }

    pub fn best_run_mode_match_count(&self, _run_modes: &str) -> Result<usize, SettingsError> {
        Err(SettingsError::Unsupported("best_run_mode_match_count"))
    }
}

impl Default for MockSettingService {
    fn default() -> Self {
        Self::new()
    }
}
