//! Layout Registry - Store and reuse custom column layouts
//!
//! Saves layouts to disk as JSON and matches them to uploaded sheets by header row.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::{LayoutError, LayoutResult};
use crate::normalize::layout::{header_compatibility, ColumnLayout};

/// Directory where layouts are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".pricedepot/layouts";

/// Minimum header compatibility for a stored layout to be tried
const MIN_COMPATIBILITY: f64 = 0.5;

/// A stored layout with usage metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredLayout {
    /// Unique identifier
    pub id: String,
    /// The column layout
    pub layout: ColumnLayout,
    /// Header labels this layout was registered for
    pub headers: Vec<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this layout was used
    pub last_used: Option<String>,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Number of times used
    pub use_count: u32,
}

impl StoredLayout {
    pub fn name(&self) -> &str {
        &self.layout.name
    }
}

/// Registry for managing custom column layouts
pub struct LayoutRegistry {
    /// Directory where layouts are stored
    registry_dir: PathBuf,
    /// Loaded layouts (id -> layout)
    layouts: HashMap<String, StoredLayout>,
}

impl LayoutRegistry {
    /// Create a registry in the default directory, loading existing layouts
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            layouts: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all layouts from the registry directory
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }

            let stored = fs::read_to_string(&path)
                .map_err(LayoutError::from)
                .and_then(|content| {
                    serde_json::from_str::<StoredLayout>(&content).map_err(LayoutError::from)
                });

            match stored {
                Ok(stored) if stored.layout.check().is_ok() => {
                    self.layouts.insert(stored.id.clone(), stored);
                }
                Ok(stored) => {
                    log_warning(format!("Ignoring invalid stored layout: {}", stored.id));
                }
                Err(e) => {
                    log_warning(format!("Ignoring {}: {}", path.display(), e));
                }
            }
        }
    }

    /// All stored layouts, sorted by name
    pub fn list(&self) -> Vec<&StoredLayout> {
        let mut layouts: Vec<_> = self.layouts.values().collect();
        layouts.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id.cmp(&b.id)));
        layouts
    }

    /// Get a layout by ID
    pub fn get(&self, id: &str) -> Option<&StoredLayout> {
        self.layouts.get(id)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Find stored layouts compatible with a sheet's header row.
    /// Sorted by compatibility score weighted by success rate.
    pub fn find_compatible(&self, headers: &[String]) -> Vec<(&StoredLayout, f64)> {
        let mut compatible: Vec<_> = self
            .layouts
            .values()
            .filter_map(|stored| {
                let score = header_compatibility(&stored.headers, headers);
                (score > MIN_COMPATIBILITY).then_some((stored, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            let score_a = a.1 * a.0.success_rate;
            let score_b = b.1 * b.0.success_rate;
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });

        compatible
    }

    /// Save a layout. Headers default to the layout's own header hints.
    pub fn save(&mut self, layout: ColumnLayout, headers: Option<Vec<String>>) -> LayoutResult<String> {
        layout.check()?;
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(&layout.name);
        let headers = headers.unwrap_or_else(|| layout.header_hints.clone());
        let stored = StoredLayout {
            id: id.clone(),
            layout,
            headers,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            success_rate: 1.0,
            use_count: 0,
        };

        self.write(&stored)?;
        self.layouts.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a layout from a JSON file, optionally renaming it
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> LayoutResult<String> {
        let content = fs::read_to_string(path)?;
        let mut layout = ColumnLayout::from_json(&content)?;

        if let Some(name) = name {
            layout.name = name.to_string();
        }

        self.save(layout, None)
    }

    /// Update statistics after using a layout
    pub fn update_stats(&mut self, id: &str, success: bool) -> LayoutResult<()> {
        let stored = self
            .layouts
            .get_mut(id)
            .ok_or_else(|| LayoutError::NotFound(id.to_string()))?;

        // Exponential moving average
        stored.success_rate = if success {
            stored.success_rate * 0.9 + 0.1
        } else {
            stored.success_rate * 0.9
        };
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let stored = stored.clone();
        self.write(&stored)
    }

    /// Delete a layout from the registry
    pub fn delete(&mut self, id: &str) -> LayoutResult<()> {
        if self.layouts.remove(id).is_none() {
            return Err(LayoutError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn write(&self, stored: &StoredLayout) -> LayoutResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    /// Generate a unique ID from a name
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        let base = format!("{}-{}", slug, chrono::Utc::now().timestamp_millis());
        let mut id = base.clone();
        let mut n = 1;
        while self.layouts.contains_key(&id) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
