use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{CategorySettings, Priority, WorkCategory};

/// Per-category desired headcount and priority, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkSettings {
    entries: Vec<(WorkCategory, CategorySettings)>,
}

impl WorkSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for `category`, or the inert default when absent.
    pub fn get(&self, category: &WorkCategory) -> CategorySettings {
        self.entries
            .iter()
            .find(|(key, _)| key == category)
            .map(|(_, settings)| *settings)
            .unwrap_or_default()
    }

    pub fn set(
        &mut self,
        category: impl Into<WorkCategory>,
        desired_count: u32,
        priority: Priority,
    ) {
        let category = category.into();
        let settings = CategorySettings::new(desired_count, priority);
        match self.entries.iter_mut().find(|(key, _)| *key == category) {
            Some((_, existing)) => *existing = settings,
            None => self.entries.push((category, settings)),
        }
    }

    pub fn remove(&mut self, category: &WorkCategory) -> Option<CategorySettings> {
        let index = self.entries.iter().position(|(key, _)| key == category)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkCategory, CategorySettings)> {
        self.entries.iter().map(|(key, settings)| (key, *settings))
    }

    /// Categories whose headcount and priority are both positive.
    pub fn active(&self) -> impl Iterator<Item = (&WorkCategory, CategorySettings)> {
        self.iter().filter(|(_, settings)| settings.is_active())
    }

    pub fn active_categories(&self) -> Vec<WorkCategory> {
        self.active().map(|(category, _)| category.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_persisted(&self) -> PersistedSettings {
        let mut desired_counts = BTreeMap::new();
        let mut priorities = BTreeMap::new();
        for (category, settings) in self.iter() {
            desired_counts.insert(category.clone(), settings.desired_count);
            priorities.insert(category.clone(), settings.priority);
        }

        PersistedSettings {
            desired_counts: Some(desired_counts),
            priorities: Some(priorities),
        }
    }

    /// Rebuild from the two persisted mappings. Missing either mapping yields
    /// empty settings; a category present in only one mapping keeps zero for
    /// the other field.
    pub fn from_persisted(persisted: PersistedSettings) -> Self {
        let (Some(desired_counts), Some(mut priorities)) =
            (persisted.desired_counts, persisted.priorities)
        else {
            return Self::default();
        };

        let mut merged: BTreeMap<WorkCategory, CategorySettings> = BTreeMap::new();
        for (category, desired_count) in desired_counts {
            let priority = priorities.remove(&category).unwrap_or_default();
            merged.insert(category, CategorySettings::new(desired_count, priority));
        }
        for (category, priority) in priorities {
            merged.insert(category, CategorySettings::new(0, priority));
        }

        Self {
            entries: merged.into_iter().collect(),
        }
    }

    pub fn save<W: Write>(&self, writer: W) -> Result<(), SettingsError> {
        serde_json::to_writer_pretty(writer, &self.to_persisted())?;
        Ok(())
    }

    /// Load persisted settings, resetting to empty on malformed input.
    pub fn load<R: Read>(reader: R) -> Self {
        match serde_json::from_reader::<_, PersistedSettings>(reader) {
            Ok(persisted) => {
                if persisted.desired_counts.is_none() || persisted.priorities.is_none() {
                    warn!("persisted work settings incomplete; starting with empty settings");
                }
                Self::from_persisted(persisted)
            }
            Err(error) => {
                warn!(%error, "persisted work settings malformed; starting with empty settings");
                Self::default()
            }
        }
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Like [`WorkSettings::load`]; a missing file is treated as empty.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        match File::open(path) {
            Ok(file) => Ok(Self::load(BufReader::new(file))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error.into()),
        }
    }
}

impl<C: Into<WorkCategory>> FromIterator<(C, CategorySettings)> for WorkSettings {
    fn from_iter<I: IntoIterator<Item = (C, CategorySettings)>>(iter: I) -> Self {
        let mut settings = Self::new();
        for (category, entry) in iter {
            settings.set(category, entry.desired_count, entry.priority);
        }
        settings
    }
}

/// On-disk layout: two parallel mappings keyed by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default)]
    pub desired_counts: Option<BTreeMap<WorkCategory, u32>>,
    #[serde(default)]
    pub priorities: Option<BTreeMap<WorkCategory, Priority>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode settings: {0}")]
    Json(#[from] serde_json::Error),
}
