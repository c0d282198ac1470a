//! Instance definitions and project settings
//!
//! An [`InstanceSpec`] identifies one configured Blender installation.
//! Its addon path is not configured by the user; it is learned from the
//! running instance during the handshake and cached on the spec, which
//! is shared (`Arc`) between the settings and any launched record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use blendlink_utils::{BlendlinkError, Result};

/// One configured Blender installation
#[derive(Debug)]
pub struct InstanceSpec {
    executable: PathBuf,
    /// Addon root reported by the instance; `None` until first learned
    addon_path: Mutex<Option<PathBuf>>,
}

/// Outcome of recording a reported addon path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddonPathChange {
    /// Reported path matches the known one
    Unchanged,
    /// No path was known before
    FirstSeen,
    /// A different path was known before
    Drifted { previous: PathBuf },
}

impl InstanceSpec {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            addon_path: Mutex::new(None),
        }
    }

    /// Restore a spec with a previously learned addon path
    pub fn with_addon_path(executable: impl Into<PathBuf>, addon_path: Option<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            addon_path: Mutex::new(addon_path),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn addon_path(&self) -> Option<PathBuf> {
        self.addon_path.lock().clone()
    }

    /// Record the addon path reported by a running instance
    pub fn record_addon_path(&self, reported: &Path) -> AddonPathChange {
        let mut known = self.addon_path.lock();
        match known.as_deref() {
            Some(current) if current == reported => AddonPathChange::Unchanged,
            Some(current) => {
                let previous = current.to_path_buf();
                *known = Some(reported.to_path_buf());
                AddonPathChange::Drifted { previous }
            }
            None => {
                *known = Some(reported.to_path_buf());
                AddonPathChange::FirstSeen
            }
        }
    }
}

/// In-memory authoritative settings for one project session
#[derive(Debug)]
pub struct ProjectSettings {
    project_root: PathBuf,
    instances: Vec<Arc<InstanceSpec>>,
    addons: Vec<String>,
}

impl ProjectSettings {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            instances: Vec::new(),
            addons: Vec::new(),
        }
    }

    /// Rebuild session settings from a persisted snapshot
    pub fn from_saved(project_root: impl Into<PathBuf>, saved: &SavedSettings) -> Self {
        let mut settings = Self::new(project_root);
        for instance in &saved.instances {
            settings.instances.push(Arc::new(InstanceSpec::with_addon_path(
                &instance.executable,
                instance.addon_path.clone(),
            )));
        }
        settings.addons = saved.addons.clone();
        settings
    }

    /// Snapshot for persistence
    pub fn to_saved(&self) -> SavedSettings {
        SavedSettings {
            instances: self
                .instances
                .iter()
                .map(|spec| SavedInstance {
                    executable: spec.executable().to_path_buf(),
                    addon_path: spec.addon_path(),
                })
                .collect(),
            addons: self.addons.clone(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Add an instance definition; the executable path must be non-empty
    pub fn add_instance(&mut self, spec: InstanceSpec) -> Result<Arc<InstanceSpec>> {
        if spec.executable().as_os_str().is_empty() {
            return Err(BlendlinkError::config("instance executable path is empty"));
        }
        let spec = Arc::new(spec);
        self.instances.push(Arc::clone(&spec));
        Ok(spec)
    }

    /// Remove an instance definition; returns whether it was present
    pub fn remove_instance(&mut self, spec: &Arc<InstanceSpec>) -> bool {
        let before = self.instances.len();
        self.instances.retain(|known| !Arc::ptr_eq(known, spec));
        self.instances.len() != before
    }

    /// Configured instances in insertion order
    pub fn instances(&self) -> &[Arc<InstanceSpec>] {
        &self.instances
    }

    pub fn add_addon(&mut self, name: impl Into<String>) {
        self.addons.push(name.into());
    }

    pub fn remove_addon(&mut self, name: &str) -> bool {
        let before = self.addons.len();
        self.addons.retain(|known| known != name);
        self.addons.len() != before
    }

    /// Configured addon names in insertion order
    pub fn addon_names(&self) -> &[String] {
        &self.addons
    }

    /// Drop configured addons whose directory no longer exists under the
    /// project root; returns how many were removed
    pub fn prune_missing_addons(&mut self) -> usize {
        let root = self.project_root.clone();
        let before = self.addons.len();
        self.addons.retain(|name| root.join(name).is_dir());
        before - self.addons.len()
    }
}

/// Persisted form of the project settings
///
/// The on-disk format is the store's concern; the host only exchanges
/// this snapshot with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedSettings {
    #[serde(default)]
    pub addons: Vec<String>,
    #[serde(default)]
    pub instances: Vec<SavedInstance>,
}

/// Persisted form of one instance definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedInstance {
    pub executable: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_path: Option<PathBuf>,
}

/// Persistence collaborator for project settings
pub trait SettingsStore: Send {
    fn load(&self) -> Result<SavedSettings>;
    fn save(&self, settings: &SavedSettings) -> Result<()>;
}

/// TOML-backed settings store
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<SavedSettings> {
        if !self.path.exists() {
            return Ok(SavedSettings::default());
        }

        let text = std::fs::read_to_string(&self.path).map_err(|e| BlendlinkError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;

        toml::from_str(&text).map_err(|e| BlendlinkError::SettingsInvalid {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn save(&self, settings: &SavedSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BlendlinkError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let text = toml::to_string_pretty(settings)
            .map_err(|e| BlendlinkError::config(format!("Failed to encode settings: {}", e)))?;

        std::fs::write(&self.path, text).map_err(|e| BlendlinkError::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== InstanceSpec Tests ====================

    #[test]
    fn test_spec_starts_without_addon_path() {
        let spec = InstanceSpec::new("/usr/bin/blender");
        assert_eq!(spec.executable(), Path::new("/usr/bin/blender"));
        assert_eq!(spec.addon_path(), None);
    }

    #[test]
    fn test_record_addon_path_first_seen() {
        let spec = InstanceSpec::new("/usr/bin/blender");
        let change = spec.record_addon_path(Path::new("/addons/x"));
        assert_eq!(change, AddonPathChange::FirstSeen);
        assert_eq!(spec.addon_path(), Some(PathBuf::from("/addons/x")));
    }

    #[test]
    fn test_record_addon_path_unchanged() {
        let spec = InstanceSpec::new("/usr/bin/blender");
        spec.record_addon_path(Path::new("/addons/x"));
        let change = spec.record_addon_path(Path::new("/addons/x"));
        assert_eq!(change, AddonPathChange::Unchanged);
    }

    #[test]
    fn test_record_addon_path_drift() {
        let spec = InstanceSpec::new("/usr/bin/blender");
        spec.record_addon_path(Path::new("/addons/x"));
        let change = spec.record_addon_path(Path::new("/addons/y"));
        assert_eq!(
            change,
            AddonPathChange::Drifted {
                previous: PathBuf::from("/addons/x")
            }
        );
        assert_eq!(spec.addon_path(), Some(PathBuf::from("/addons/y")));
    }

    // ==================== ProjectSettings Tests ====================

    #[test]
    fn test_add_and_list_instances() {
        let mut settings = ProjectSettings::new("/project");
        settings.add_instance(InstanceSpec::new("/usr/bin/blender")).unwrap();
        settings.add_instance(InstanceSpec::new("/opt/blender-4.1/blender")).unwrap();

        let listed: Vec<_> = settings
            .instances()
            .iter()
            .map(|s| s.executable().to_path_buf())
            .collect();
        assert_eq!(
            listed,
            vec![
                PathBuf::from("/usr/bin/blender"),
                PathBuf::from("/opt/blender-4.1/blender"),
            ]
        );
    }

    #[test]
    fn test_add_instance_rejects_empty_path() {
        let mut settings = ProjectSettings::new("/project");
        let result = settings.add_instance(InstanceSpec::new(""));
        assert!(matches!(result, Err(BlendlinkError::Config(_))));
    }

    #[test]
    fn test_remove_instance() {
        let mut settings = ProjectSettings::new("/project");
        let first = settings.add_instance(InstanceSpec::new("/usr/bin/blender")).unwrap();
        let second = settings
            .add_instance(InstanceSpec::new("/opt/blender/blender"))
            .unwrap();

        assert!(settings.remove_instance(&first));
        assert!(!settings.remove_instance(&first));
        assert_eq!(settings.instances().len(), 1);
        assert!(Arc::ptr_eq(&settings.instances()[0], &second));
    }

    #[test]
    fn test_addon_names() {
        let mut settings = ProjectSettings::new("/project");
        settings.add_addon("measure_tools");
        settings.add_addon("exporter");

        assert_eq!(settings.addon_names(), ["measure_tools", "exporter"]);
        assert!(settings.remove_addon("measure_tools"));
        assert!(!settings.remove_addon("measure_tools"));
        assert_eq!(settings.addon_names(), ["exporter"]);
    }

    #[test]
    fn test_prune_missing_addons() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("kept")).unwrap();

        let mut settings = ProjectSettings::new(temp.path());
        settings.add_addon("kept");
        settings.add_addon("gone");

        assert_eq!(settings.prune_missing_addons(), 1);
        assert_eq!(settings.addon_names(), ["kept"]);
    }

    // ==================== Persistence Tests ====================

    #[test]
    fn test_saved_roundtrip() {
        let mut settings = ProjectSettings::new("/project");
        let spec = settings.add_instance(InstanceSpec::new("/usr/bin/blender")).unwrap();
        spec.record_addon_path(Path::new("/addons/x"));
        settings.add_addon("measure_tools");

        let saved = settings.to_saved();
        let restored = ProjectSettings::from_saved("/project", &saved);

        assert_eq!(restored.instances().len(), 1);
        assert_eq!(
            restored.instances()[0].addon_path(),
            Some(PathBuf::from("/addons/x"))
        );
        assert_eq!(restored.addon_names(), ["measure_tools"]);
    }

    #[test]
    fn test_toml_store_missing_file_is_default() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = TomlSettingsStore::new(temp.path().join("settings.toml"));

        assert_eq!(store.load().unwrap(), SavedSettings::default());
    }

    #[test]
    fn test_toml_store_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = TomlSettingsStore::new(temp.path().join("nested").join("settings.toml"));

        let saved = SavedSettings {
            instances: vec![SavedInstance {
                executable: PathBuf::from("/usr/bin/blender"),
                addon_path: Some(PathBuf::from("/addons/x")),
            }],
            addons: vec!["measure_tools".into()],
        };

        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), saved);
    }

    #[test]
    fn test_toml_store_invalid_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "this is [not valid").unwrap();

        let store = TomlSettingsStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(BlendlinkError::SettingsInvalid { .. })
        ));
    }
}
