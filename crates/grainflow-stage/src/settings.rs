//! Persisted pipeline configuration.
//!
//! A [`PipelineSettings`] document is an ordered list of per-stage records,
//! each addressed by a monotonically increasing slot index. Stages write
//! their keys through a [`SettingsWriter`] and read them back through a
//! [`SettingsReader`]; readers fall back to the stage's current value for
//! any key that is missing or has the wrong type, so older documents load
//! into newer stages.

use std::fs;
use std::path::{Path, PathBuf};

use grainflow_core::{DataArrayPath, ElementType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::parameter::ParameterValue;
use crate::stage::StageInfo;

/// Current settings document version.
pub const SETTINGS_VERSION: u32 = 1;

/// Errors loading or saving pipeline settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Filesystem failure.
    #[error("settings i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON.
    #[error("settings document is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// Document written by a newer format.
    #[error("settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the document.
        found: u32,
        /// Highest version this build reads.
        supported: u32,
    },
}

/// One stage's persisted configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Slot index.
    pub index: usize,
    /// Class identifier of the stage.
    pub class_name: String,
    /// UUID of the stage type.
    pub uuid: Uuid,
    /// Key/value configuration in write order.
    #[serde(default)]
    pub values: IndexMap<String, ParameterValue>,
}

/// A persisted pipeline: format version plus ordered stage records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Document format version.
    pub version: u32,
    /// Stage records in pipeline order.
    #[serde(default)]
    pub stages: Vec<StageSettings>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            stages: Vec::new(),
        }
    }
}

impl PipelineSettings {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text)?;
        if settings.version > SETTINGS_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_VERSION,
            });
        }
        Ok(settings)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a JSON document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Write as JSON to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The record at slot `index`.
    pub fn stage(&self, index: usize) -> Option<&StageSettings> {
        self.stages.iter().find(|s| s.index == index)
    }
}

/// Collects stage records while a pipeline is persisted.
#[derive(Debug, Default)]
pub struct SettingsWriter {
    stages: Vec<StageSettings>,
}

impl SettingsWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the record for slot `index`. Reopening a slot clears it.
    pub fn open_stage(&mut self, index: usize, info: &StageInfo) -> StageSettingsWriter<'_> {
        self.stages.retain(|s| s.index != index);
        self.stages.push(StageSettings {
            index,
            class_name: info.class_name.to_string(),
            uuid: info.uuid,
            values: IndexMap::new(),
        });
        let last = self.stages.len() - 1;
        StageSettingsWriter {
            record: &mut self.stages[last],
        }
    }

    /// Number of records written.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Finish into a document, ordered by slot index.
    pub fn finish(mut self) -> PipelineSettings {
        self.stages.sort_by_key(|s| s.index);
        PipelineSettings {
            version: SETTINGS_VERSION,
            stages: self.stages,
        }
    }
}

/// Writes keys into one stage record.
#[derive(Debug)]
pub struct StageSettingsWriter<'a> {
    record: &'a mut StageSettings,
}

impl StageSettingsWriter<'_> {
    /// Store any value.
    pub fn value(&mut self, key: &str, value: ParameterValue) -> &mut Self {
        self.record.values.insert(key.to_string(), value);
        self
    }

    /// Store a boolean.
    pub fn bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.value(key, ParameterValue::Bool(value))
    }

    /// Store an integer.
    pub fn int(&mut self, key: &str, value: i64) -> &mut Self {
        self.value(key, ParameterValue::Int(value))
    }

    /// Store a float.
    pub fn float(&mut self, key: &str, value: f64) -> &mut Self {
        self.value(key, ParameterValue::Float(value))
    }

    /// Store three floats.
    pub fn float_vec3(&mut self, key: &str, value: [f32; 3]) -> &mut Self {
        self.value(key, ParameterValue::FloatVec3(value))
    }

    /// Store three integers.
    pub fn int_vec3(&mut self, key: &str, value: [i64; 3]) -> &mut Self {
        self.value(key, ParameterValue::IntVec3(value))
    }

    /// Store text.
    pub fn text(&mut self, key: &str, value: &str) -> &mut Self {
        self.value(key, ParameterValue::Text(value.to_string()))
    }

    /// Store a filesystem path.
    pub fn path(&mut self, key: &str, value: &Path) -> &mut Self {
        self.value(key, ParameterValue::Path(value.to_path_buf()))
    }

    /// Store an array path.
    pub fn array_path(&mut self, key: &str, value: &DataArrayPath) -> &mut Self {
        self.value(key, ParameterValue::ArrayPath(value.clone()))
    }

    /// Store an element type.
    pub fn element_type(&mut self, key: &str, value: ElementType) -> &mut Self {
        self.value(key, ParameterValue::ElementType(value))
    }
}

/// Read access to a persisted pipeline, by slot.
#[derive(Clone, Copy, Debug)]
pub struct SettingsReader<'a> {
    settings: &'a PipelineSettings,
}

impl<'a> SettingsReader<'a> {
    /// Wrap a document.
    pub fn new(settings: &'a PipelineSettings) -> Self {
        Self { settings }
    }

    /// The record at slot `index`, if any.
    pub fn stage(&self, index: usize) -> Option<StageSettingsReader<'a>> {
        self.settings
            .stage(index)
            .map(|record| StageSettingsReader { record })
    }
}

/// Typed reads from one stage record with fallbacks.
#[derive(Clone, Copy, Debug)]
pub struct StageSettingsReader<'a> {
    record: &'a StageSettings,
}

impl<'a> StageSettingsReader<'a> {
    /// Slot index of this record.
    pub fn index(&self) -> usize {
        self.record.index
    }

    /// Raw value for `key`.
    pub fn value(&self, key: &str) -> Option<&'a ParameterValue> {
        self.record.values.get(key)
    }

    fn typed<T>(
        &self,
        key: &str,
        default: T,
        extract: impl FnOnce(&'a ParameterValue) -> Option<T>,
    ) -> T {
        let Some(value) = self.value(key) else {
            return default;
        };
        match extract(value) {
            Some(v) => v,
            None => {
                warn!(
                    stage = %self.record.class_name,
                    key,
                    found = value.kind(),
                    "ignoring mistyped setting"
                );
                default
            }
        }
    }

    /// Boolean at `key`, or `default`.
    pub fn bool(&self, key: &str, default: bool) -> bool {
        self.typed(key, default, ParameterValue::as_bool)
    }

    /// Integer at `key`, or `default`.
    pub fn int(&self, key: &str, default: i64) -> i64 {
        self.typed(key, default, ParameterValue::as_int)
    }

    /// Float at `key`, or `default`.
    pub fn float(&self, key: &str, default: f64) -> f64 {
        self.typed(key, default, ParameterValue::as_float)
    }

    /// Three floats at `key`, or `default`.
    pub fn float_vec3(&self, key: &str, default: [f32; 3]) -> [f32; 3] {
        self.typed(key, default, ParameterValue::as_float_vec3)
    }

    /// Three integers at `key`, or `default`.
    pub fn int_vec3(&self, key: &str, default: [i64; 3]) -> [i64; 3] {
        self.typed(key, default, ParameterValue::as_int_vec3)
    }

    /// Text at `key`, or `default`.
    pub fn text(&self, key: &str, default: &str) -> String {
        self.typed(key, default.to_string(), |v| v.as_text().map(str::to_string))
    }

    /// Filesystem path at `key`, or `default`.
    pub fn path(&self, key: &str, default: &Path) -> PathBuf {
        self.typed(key, default.to_path_buf(), |v| v.as_path().cloned())
    }

    /// Array path at `key`, or `default`.
    pub fn array_path(&self, key: &str, default: &DataArrayPath) -> DataArrayPath {
        self.typed(key, default.clone(), |v| v.as_array_path().cloned())
    }

    /// Element type at `key`, or `default`.
    pub fn element_type(&self, key: &str, default: ElementType) -> ElementType {
        self.typed(key, default, ParameterValue::as_element_type)
    }
}
