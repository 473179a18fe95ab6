//! Stage factories and the explicit [`StageRegistry`].
//!
//! The registry maps a class name or UUID to a factory so persisted
//! pipelines can be rebuilt without compile-time knowledge of every stage
//! type. It is built once at startup by explicit `register` calls and is
//! read-only while pipelines run.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::settings::{PipelineSettings, SettingsReader};
use crate::stage::{Stage, StageInfo};

/// Errors from registering or resolving stage factories.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another factory already uses this class name.
    #[error("stage class '{0}' is already registered")]
    DuplicateClassName(String),
    /// Another factory already uses this UUID.
    #[error("stage uuid {0} is already registered")]
    DuplicateUuid(Uuid),
    /// No factory for this class name.
    #[error("no stage registered with class name '{0}'")]
    UnknownClassName(String),
    /// No factory for this UUID.
    #[error("no stage registered with uuid {0}")]
    UnknownUuid(Uuid),
    /// A persisted record's class name and UUID name different factories.
    #[error("stage record '{class_name}' has uuid {uuid} belonging to '{registered}'")]
    IdentityConflict {
        /// Class name in the record.
        class_name: String,
        /// UUID in the record.
        uuid: Uuid,
        /// Class name registered for that UUID.
        registered: String,
    },
}

/// Constructs default-configured stages of one type.
pub trait StageFactory: Send + Sync {
    /// Static identity of the produced stage type.
    fn info(&self) -> StageInfo;

    /// A new, default-configured stage.
    fn create(&self) -> Box<dyn Stage>;
}

/// [`StageFactory`] for any `Stage + Default` type.
pub struct TypedFactory<S> {
    info: StageInfo,
    _stage: PhantomData<fn() -> S>,
}

impl<S: Stage + Default> TypedFactory<S> {
    /// Factory for `S`, reading its identity from `S::default()`.
    pub fn new() -> Self {
        Self {
            info: S::default().info(),
            _stage: PhantomData,
        }
    }
}

impl<S: Stage + Default> Default for TypedFactory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stage + Default> StageFactory for TypedFactory<S> {
    fn info(&self) -> StageInfo {
        self.info
    }

    fn create(&self) -> Box<dyn Stage> {
        Box::new(S::default())
    }
}

impl<S> fmt::Debug for TypedFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedFactory")
            .field(&self.info.class_name)
            .finish()
    }
}

/// Lookup table from class name and UUID to [`StageFactory`].
///
/// # Examples
///
/// ```
/// use grainflow_stage::StageRegistry;
///
/// let registry = StageRegistry::new();
/// assert!(registry.create_by_name("Missing").is_err());
/// ```
#[derive(Default)]
pub struct StageRegistry {
    factories: Vec<Box<dyn StageFactory>>,
    by_name: HashMap<&'static str, usize>,
    by_uuid: HashMap<Uuid, usize>,
}

impl StageRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory. Class names and UUIDs must both be unique.
    pub fn register(&mut self, factory: impl StageFactory + 'static) -> Result<(), RegistryError> {
        let info = factory.info();
        if self.by_name.contains_key(info.class_name) {
            return Err(RegistryError::DuplicateClassName(
                info.class_name.to_string(),
            ));
        }
        if self.by_uuid.contains_key(&info.uuid) {
            return Err(RegistryError::DuplicateUuid(info.uuid));
        }
        let slot = self.factories.len();
        self.by_name.insert(info.class_name, slot);
        self.by_uuid.insert(info.uuid, slot);
        self.factories.push(Box::new(factory));
        debug!(class = info.class_name, uuid = %info.uuid, "registered stage");
        Ok(())
    }

    /// Register `S` through a [`TypedFactory`].
    pub fn register_stage<S: Stage + Default>(&mut self) -> Result<(), RegistryError> {
        self.register(TypedFactory::<S>::new())
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Factory for a class name.
    pub fn by_name(&self, class_name: &str) -> Option<&dyn StageFactory> {
        self.by_name
            .get(class_name)
            .map(|&slot| self.factories[slot].as_ref())
    }

    /// Factory for a UUID.
    pub fn by_uuid(&self, uuid: &Uuid) -> Option<&dyn StageFactory> {
        self.by_uuid
            .get(uuid)
            .map(|&slot| self.factories[slot].as_ref())
    }

    /// New default stage by class name.
    pub fn create_by_name(&self, class_name: &str) -> Result<Box<dyn Stage>, RegistryError> {
        self.by_name(class_name)
            .map(|f| f.create())
            .ok_or_else(|| RegistryError::UnknownClassName(class_name.to_string()))
    }

    /// New default stage by UUID.
    pub fn create_by_uuid(&self, uuid: &Uuid) -> Result<Box<dyn Stage>, RegistryError> {
        self.by_uuid(uuid)
            .map(|f| f.create())
            .ok_or(RegistryError::UnknownUuid(*uuid))
    }

    /// Factories in registration order.
    pub fn factories(&self) -> impl Iterator<Item = &dyn StageFactory> {
        self.factories.iter().map(|f| f.as_ref())
    }

    /// Instantiate and configure every stage of a persisted pipeline.
    ///
    /// Records resolve by class name first and by UUID when the name is
    /// unknown. A record whose name and UUID both resolve, but to
    /// different factories, is rejected. Each stage reads from its own
    /// slot and reports the next one, so stages spanning several slots
    /// load as a single stage.
    pub fn load_pipeline(
        &self,
        settings: &PipelineSettings,
    ) -> Result<Vec<Box<dyn Stage>>, RegistryError> {
        let reader = SettingsReader::new(settings);
        let mut stages = Vec::with_capacity(settings.stages.len());
        let mut next = 0;
        for record in &settings.stages {
            // Slot already consumed by a multi-slot stage.
            if record.index < next {
                continue;
            }
            let factory = self.resolve(&record.class_name, &record.uuid)?;
            let mut stage = factory.create();
            next = stage.read_parameters(&reader, record.index).max(record.index + 1);
            stages.push(stage);
        }
        Ok(stages)
    }

    fn resolve(&self, class_name: &str, uuid: &Uuid) -> Result<&dyn StageFactory, RegistryError> {
        match (self.by_name.get(class_name), self.by_uuid.get(uuid)) {
            (Some(&a), Some(&b)) if a != b => Err(RegistryError::IdentityConflict {
                class_name: class_name.to_string(),
                uuid: *uuid,
                registered: self.factories[b].info().class_name.to_string(),
            }),
            (Some(&slot), _) | (None, Some(&slot)) => Ok(self.factories[slot].as_ref()),
            (None, None) => Err(RegistryError::UnknownClassName(class_name.to_string())),
        }
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|f| f.info().class_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CheckMode, StageContext};
    use crate::parameter::{ParameterDef, ParameterValue};
    use crate::settings::SettingsWriter;
    use grainflow_core::DataContainerArray;

    #[derive(Default)]
    struct Scale {
        factor: f64,
    }

    impl Stage for Scale {
        fn info(&self) -> StageInfo {
            StageInfo {
                class_name: "Scale",
                uuid: Uuid::from_u128(1),
                group: "Test",
                subgroup: "Math",
                human_label: "Scale",
            }
        }

        fn parameters(&self) -> Vec<ParameterDef> {
            vec![ParameterDef::parameter(
                "Factor",
                "Factor",
                ParameterValue::Float(self.factor),
            )]
        }

        fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

        fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {}

        fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
            writer
                .open_stage(index, &self.info())
                .float("Factor", self.factor);
            index + 1
        }

        fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
            if let Some(stage) = reader.stage(index) {
                self.factor = stage.float("Factor", self.factor);
            }
            index + 1
        }
    }

    #[derive(Default)]
    struct Other;

    impl Stage for Other {
        fn info(&self) -> StageInfo {
            StageInfo {
                class_name: "Other",
                uuid: Uuid::from_u128(2),
                group: "Test",
                subgroup: "Misc",
                human_label: "Other",
            }
        }

        fn parameters(&self) -> Vec<ParameterDef> {
            Vec::new()
        }

        fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

        fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {}

        fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
            writer.open_stage(index, &self.info());
            index + 1
        }

        fn read_parameters(&mut self, _: &SettingsReader<'_>, index: usize) -> usize {
            index + 1
        }
    }

    /// Persists its bounds across two consecutive slots.
    #[derive(Default)]
    struct Bounds {
        low: f64,
        high: f64,
    }

    impl Stage for Bounds {
        fn info(&self) -> StageInfo {
            StageInfo {
                class_name: "Bounds",
                uuid: Uuid::from_u128(3),
                group: "Test",
                subgroup: "Math",
                human_label: "Bounds",
            }
        }

        fn parameters(&self) -> Vec<ParameterDef> {
            vec![
                ParameterDef::parameter("Low", "Low", ParameterValue::Float(self.low)),
                ParameterDef::parameter("High", "High", ParameterValue::Float(self.high)),
            ]
        }

        fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

        fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {}

        fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
            let info = self.info();
            writer.open_stage(index, &info).float("Low", self.low);
            writer.open_stage(index + 1, &info).float("High", self.high);
            index + 2
        }

        fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
            if let Some(s) = reader.stage(index) {
                self.low = s.float("Low", self.low);
            }
            if let Some(s) = reader.stage(index + 1) {
                self.high = s.float("High", self.high);
            }
            index + 2
        }
    }

    fn registry() -> StageRegistry {
        let mut r = StageRegistry::new();
        r.register_stage::<Scale>().unwrap();
        r.register_stage::<Other>().unwrap();
        r
    }

    #[test]
    fn name_and_uuid_resolve_to_same_factory() {
        let r = registry();
        let by_name = r.by_name("Scale").unwrap().info();
        let by_uuid = r.by_uuid(&Uuid::from_u128(1)).unwrap().info();
        assert_eq!(by_name, by_uuid);
        assert_eq!(r.create_by_uuid(&Uuid::from_u128(2)).unwrap().class_name(), "Other");
    }

    #[test]
    fn duplicates_rejected() {
        let mut r = registry();
        assert_eq!(
            r.register_stage::<Scale>(),
            Err(RegistryError::DuplicateClassName("Scale".into()))
        );
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn unknown_lookups_fail() {
        let r = registry();
        assert!(matches!(
            r.create_by_name("Nope"),
            Err(RegistryError::UnknownClassName(_))
        ));
        assert!(matches!(
            r.create_by_uuid(&Uuid::from_u128(99)),
            Err(RegistryError::UnknownUuid(_))
        ));
    }

    #[test]
    fn factories_listed_in_registration_order() {
        let names: Vec<_> = registry().factories().map(|f| f.info().class_name).collect();
        assert_eq!(names, ["Scale", "Other"]);
    }

    #[test]
    fn load_pipeline_configures_stages() {
        let r = registry();
        let mut writer = SettingsWriter::new();
        let next = Scale { factor: 4.0 }.write_parameters(&mut writer, 0);
        Other.write_parameters(&mut writer, next);
        let settings = writer.finish();

        let stages = r.load_pipeline(&settings).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(
            stages[0].parameters()[0].default,
            ParameterValue::Float(4.0)
        );
        assert_eq!(stages[1].class_name(), "Other");
    }

    #[test]
    fn multi_slot_stage_loads_once() {
        let mut r = registry();
        r.register_stage::<Bounds>().unwrap();
        let mut writer = SettingsWriter::new();
        let next = Bounds { low: -1.0, high: 3.0 }.write_parameters(&mut writer, 0);
        assert_eq!(next, 2);
        let next = Scale { factor: 5.0 }.write_parameters(&mut writer, next);
        assert_eq!(next, 3);
        let settings = writer.finish();
        assert_eq!(settings.stages.len(), 3);

        let stages = r.load_pipeline(&settings).unwrap();
        let names: Vec<_> = stages.iter().map(|s| s.class_name()).collect();
        assert_eq!(names, ["Bounds", "Scale"]);
        let bounds = stages[0].parameters();
        assert_eq!(bounds[0].default, ParameterValue::Float(-1.0));
        assert_eq!(bounds[1].default, ParameterValue::Float(3.0));
        assert_eq!(stages[1].parameters()[0].default, ParameterValue::Float(5.0));
    }

    #[test]
    fn read_parameters_reports_next_slot() {
        let mut writer = SettingsWriter::new();
        Bounds { low: 1.0, high: 2.0 }.write_parameters(&mut writer, 4);
        let settings = writer.finish();
        let reader = SettingsReader::new(&settings);
        let mut bounds = Bounds::default();
        assert_eq!(bounds.read_parameters(&reader, 4), 6);
        assert_eq!((bounds.low, bounds.high), (1.0, 2.0));
        assert_eq!(Scale::default().read_parameters(&reader, 6), 7);
    }

    #[test]
    fn load_pipeline_falls_back_to_uuid() {
        let r = registry();
        let mut writer = SettingsWriter::new();
        Scale { factor: 2.0 }.write_parameters(&mut writer, 0);
        let mut settings = writer.finish();
        settings.stages[0].class_name = "RenamedScale".into();
        let stages = r.load_pipeline(&settings).unwrap();
        assert_eq!(stages[0].class_name(), "Scale");
    }

    #[test]
    fn load_pipeline_rejects_conflicting_identity() {
        let r = registry();
        let mut writer = SettingsWriter::new();
        Scale::default().write_parameters(&mut writer, 0);
        let mut settings = writer.finish();
        settings.stages[0].uuid = Uuid::from_u128(2);
        assert!(matches!(
            r.load_pipeline(&settings),
            Err(RegistryError::IdentityConflict { .. })
        ));
    }
}
