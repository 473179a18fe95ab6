//! Pipeline stages that write and read container files.

use std::fs;
use std::path::{Path, PathBuf};

use grainflow_core::{DataContainer, DataContainerArray};
use grainflow_stage::{
    codes, CheckMode, ParameterDef, ParameterValue, RegistryError, SettingsReader,
    SettingsWriter, Stage, StageContext, StageInfo, StageRegistry,
};
use tracing::info;
use uuid::Uuid;

use crate::layout;

/// Register [`DataContainerWriter`] and [`DataContainerReader`].
pub fn register_stages(registry: &mut StageRegistry) -> Result<(), RegistryError> {
    registry.register_stage::<DataContainerWriter>()?;
    registry.register_stage::<DataContainerReader>()
}

// ── DataContainerWriter ─────────────────────────────────────────

/// Writes every container to a container file, optionally with an XDMF
/// companion.
///
/// Containers and categories written before a failure stay in the file.
#[derive(Clone, Debug, PartialEq)]
pub struct DataContainerWriter {
    /// Destination file.
    pub output_file: PathBuf,
    /// Also write `<output_file>.xdmf`.
    pub write_xdmf: bool,
}

impl Default for DataContainerWriter {
    fn default() -> Self {
        Self {
            output_file: PathBuf::new(),
            write_xdmf: true,
        }
    }
}

impl DataContainerWriter {
    /// Writer for `output_file` with XDMF enabled.
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
            ..Self::default()
        }
    }
}

impl Stage for DataContainerWriter {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "DataContainerWriter",
            uuid: Uuid::from_u128(0x3fcd_4c43_9d75_4b80_8ce3_6a3b_0f1e_8a01),
            group: "IO",
            subgroup: "Output",
            human_label: "Write DREAM3D Data File",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::parameter(
                "OutputFile",
                "Output File",
                ParameterValue::Path(self.output_file.clone()),
            ),
            ParameterDef::parameter(
                "WriteXdmfFile",
                "Write Xdmf File",
                ParameterValue::Bool(self.write_xdmf),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
        if self.output_file.as_os_str().is_empty() {
            ctx.error(codes::MISSING_OUTPUT_FILE, "the output file must be set");
        }
        if dca.is_empty() {
            ctx.error(codes::MISSING_CONTAINER, "there are no data containers to write");
        }
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        if let Some(parent) = self.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = fs::create_dir_all(parent) {
                    ctx.error(
                        codes::CREATE_GROUP_FAILED,
                        format!("cannot create directory '{}': {err}", parent.display()),
                    );
                    return;
                }
            }
        }
        match layout::write_file(&self.output_file, dca, self.write_xdmf) {
            Ok(()) => ctx.status("Complete"),
            Err(err) => ctx.error(err.code(), err.to_string()),
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .path("OutputFile", &self.output_file)
            .bool("WriteXdmfFile", self.write_xdmf);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        if let Some(s) = reader.stage(index) {
            self.output_file = s.path("OutputFile", &self.output_file);
            self.write_xdmf = s.bool("WriteXdmfFile", self.write_xdmf);
        }
        index + 1
    }
}

// ── DataContainerReader ─────────────────────────────────────────

/// Loads the containers of a container file into the pipeline's data.
///
/// Preflight declares each container as a placeholder (geometry and array
/// shapes, no contents) so later stages can check against it; execute
/// loads the contents. A container that already exists is an error unless
/// `overwrite_existing` is set, or unless it already has exactly the
/// file's shapes, as after an earlier pass of this reader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataContainerReader {
    /// Source file.
    pub input_file: PathBuf,
    /// Replace containers that already exist.
    pub overwrite_existing: bool,
}

impl DataContainerReader {
    /// Reader for `input_file` that refuses to overwrite.
    pub fn new(input_file: impl Into<PathBuf>) -> Self {
        Self {
            input_file: input_file.into(),
            overwrite_existing: false,
        }
    }

    fn load(&self, ctx: &mut StageContext<'_>) -> Option<DataContainerArray> {
        match layout::read_file(&self.input_file) {
            Ok(loaded) => Some(loaded),
            Err(err) => {
                ctx.error(
                    codes::READ_FAILED,
                    format!("cannot read '{}': {err}", self.input_file.display()),
                );
                None
            }
        }
    }

    fn merge(
        &self,
        dca: &mut DataContainerArray,
        loaded: DataContainerArray,
        placeholders: bool,
        ctx: &mut StageContext<'_>,
    ) {
        let incoming: Vec<DataContainer> = loaded
            .iter()
            .map(|dc| {
                if placeholders {
                    dc.placeholder_copy()
                } else {
                    dc.clone()
                }
            })
            .collect();
        for dc in &incoming {
            if let Some(existing) = dca.get(dc.name()) {
                let redeclared = existing.placeholder_copy() == dc.placeholder_copy();
                if !self.overwrite_existing && !redeclared {
                    ctx.error(
                        codes::CONTAINER_EXISTS,
                        format!("data container '{}' already exists", dc.name()),
                    );
                }
            }
        }
        if ctx.has_failed() {
            return;
        }
        for dc in incoming {
            dca.replace(dc);
        }
    }
}

impl Stage for DataContainerReader {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "DataContainerReader",
            uuid: Uuid::from_u128(0x9a4e_52b1_07c6_4d8e_b1f0_2c54_e7a3_6d02),
            group: "IO",
            subgroup: "Input",
            human_label: "Read DREAM3D Data File",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::parameter(
                "InputFile",
                "Input File",
                ParameterValue::Path(self.input_file.clone()),
            ),
            ParameterDef::parameter(
                "OverwriteExistingDataContainers",
                "Overwrite Existing Data Containers",
                ParameterValue::Bool(self.overwrite_existing),
            ),
        ]
    }

    fn data_check(
        &self,
        dca: &mut DataContainerArray,
        mode: CheckMode,
        ctx: &mut StageContext<'_>,
    ) {
        if !is_readable_file(&self.input_file) {
            ctx.error(
                codes::MISSING_INPUT_FILE,
                format!("input file '{}' does not exist", self.input_file.display()),
            );
            return;
        }
        if mode.is_preflight() {
            if let Some(loaded) = self.load(ctx) {
                self.merge(dca, loaded, true, ctx);
            }
        }
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let Some(loaded) = self.load(ctx) else {
            return;
        };
        let count = loaded.len();
        self.merge(dca, loaded, false, ctx);
        if !ctx.has_failed() {
            info!(path = %self.input_file.display(), containers = count, "containers loaded");
            ctx.status("Complete");
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .path("InputFile", &self.input_file)
            .bool("OverwriteExistingDataContainers", self.overwrite_existing);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        if let Some(s) = reader.stage(index) {
            self.input_file = s.path("InputFile", &self.input_file);
            self.overwrite_existing =
                s.bool("OverwriteExistingDataContainers", self.overwrite_existing);
        }
        index + 1
    }
}

fn is_readable_file(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_core::{Category, ElementType, TypedArray};

    fn volume() -> DataContainerArray {
        let mut dc = DataContainer::new("Volume");
        dc.set_dimensions([2, 2, 1]);
        dc.insert_array(
            Category::Cell,
            TypedArray::from_vec::<i32>("Phases", 1, vec![1, 2, 1, 2]).unwrap(),
        )
        .unwrap();
        let mut dca = DataContainerArray::new();
        dca.add(dc).unwrap();
        dca
    }

    #[test]
    fn writer_requires_output_file() {
        let stage = DataContainerWriter::default();
        let mut dca = volume();
        let mut ctx = StageContext::new(0);
        stage.preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::MISSING_OUTPUT_FILE);
    }

    #[test]
    fn writer_requires_containers() {
        let stage = DataContainerWriter::new("out.gfdc");
        let mut ctx = StageContext::new(0);
        stage.preflight(&mut DataContainerArray::new(), &mut ctx);
        assert_eq!(ctx.error_code(), codes::MISSING_CONTAINER);
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grains.gfdc");

        let writer = DataContainerWriter::new(&path);
        let mut source = volume();
        let mut ctx = StageContext::new(0);
        writer.execute(&mut source, &mut ctx);
        assert_eq!(ctx.error_code(), 0, "{:?}", ctx.messages());
        assert!(layout::xdmf_path(&path).is_file());

        let reader = DataContainerReader::new(&path);
        let mut target = DataContainerArray::new();
        let mut ctx = StageContext::new(1);
        reader.execute(&mut target, &mut ctx);
        assert_eq!(ctx.error_code(), 0, "{:?}", ctx.messages());
        assert_eq!(target, source);
    }

    #[test]
    fn reader_preflight_declares_placeholders_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grains.gfdc");
        layout::write_file(&path, &volume(), false).unwrap();

        let reader = DataContainerReader::new(&path);
        let mut dca = DataContainerArray::new();
        for _ in 0..2 {
            let mut ctx = StageContext::new(0);
            reader.preflight(&mut dca, &mut ctx);
            assert_eq!(ctx.error_code(), 0, "{:?}", ctx.messages());
        }
        let phases = dca.get("Volume").unwrap().array(Category::Cell, "Phases").unwrap();
        assert_eq!(phases.tuples(), 0);
        assert_eq!(phases.element_type(), ElementType::Int32);
    }

    #[test]
    fn reader_refuses_conflicting_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grains.gfdc");
        layout::write_file(&path, &volume(), false).unwrap();

        let mut dca = DataContainerArray::new();
        dca.add(DataContainer::new("Volume")).unwrap();
        let mut reader = DataContainerReader::new(&path);
        let mut ctx = StageContext::new(0);
        reader.preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::CONTAINER_EXISTS);

        reader.overwrite_existing = true;
        let mut ctx = StageContext::new(0);
        reader.execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        assert_eq!(dca.get("Volume").unwrap().total_points(), 4);
    }

    #[test]
    fn reader_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DataContainerReader::new(dir.path().join("nope.gfdc"));
        let mut ctx = StageContext::new(0);
        missing.preflight(&mut DataContainerArray::new(), &mut ctx);
        assert_eq!(ctx.error_code(), codes::MISSING_INPUT_FILE);

        let corrupt_path = dir.path().join("corrupt.gfdc");
        fs::write(&corrupt_path, b"GFDC\x01\x01").unwrap();
        let corrupt = DataContainerReader::new(&corrupt_path);
        let mut ctx = StageContext::new(0);
        corrupt.preflight(&mut DataContainerArray::new(), &mut ctx);
        assert_eq!(ctx.error_code(), codes::READ_FAILED);
    }

    #[test]
    fn settings_round_trip() {
        let stage = DataContainerWriter {
            output_file: PathBuf::from("/tmp/out.gfdc"),
            write_xdmf: false,
        };
        let mut writer = SettingsWriter::new();
        assert_eq!(stage.write_parameters(&mut writer, 3), 4);
        let settings = writer.finish();

        let mut restored = DataContainerWriter::default();
        restored.read_parameters(&SettingsReader::new(&settings), 3);
        assert_eq!(restored, stage);
    }

    #[test]
    fn registration_is_by_name_and_uuid() {
        let mut registry = StageRegistry::new();
        register_stages(&mut registry).unwrap();
        let by_name = registry.create_by_name("DataContainerReader").unwrap();
        let by_uuid = registry.create_by_uuid(&by_name.info().uuid).unwrap();
        assert_eq!(by_uuid.class_name(), "DataContainerReader");
        assert!(register_stages(&mut registry).is_err());
    }
}
