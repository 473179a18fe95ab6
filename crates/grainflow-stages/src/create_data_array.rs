//! Creates a constant-filled array.

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType};
use grainflow_stage::{
    check, codes, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use uuid::Uuid;

/// Creates an array of any fixed-width element type in any category,
/// sized to the owning map and filled with `initial_value`.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateDataArray {
    /// Where the new array goes.
    pub path: DataArrayPath,
    /// Element type of the new array.
    pub element_type: ElementType,
    /// Components per tuple.
    pub components: usize,
    /// Fill value; must be representable in `element_type`.
    pub initial_value: f64,
}

impl Default for CreateDataArray {
    fn default() -> Self {
        Self {
            path: DataArrayPath::new("VoxelDataContainer", Category::Cell, "NewArray"),
            element_type: ElementType::Float32,
            components: 1,
            initial_value: 0.0,
        }
    }
}

impl CreateDataArray {
    /// A one-component array at `path` filled with `initial_value`.
    pub fn new(path: DataArrayPath, element_type: ElementType, initial_value: f64) -> Self {
        Self {
            path,
            element_type,
            components: 1,
            initial_value,
        }
    }
}

/// Whether `value` converts to `ty` without saturating or truncating.
fn representable(ty: ElementType, value: f64) -> bool {
    let (lo, hi) = match ty {
        ElementType::Float32 => {
            return !value.is_finite() || value.abs() <= f64::from(f32::MAX);
        }
        ElementType::Float64 => return true,
        ElementType::Bool => return value == 0.0 || value == 1.0,
        ElementType::Int8 => (f64::from(i8::MIN), f64::from(i8::MAX)),
        ElementType::Int16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
        ElementType::Int32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
        ElementType::Int64 => (i64::MIN as f64, i64::MAX as f64),
        ElementType::UInt8 => (0.0, f64::from(u8::MAX)),
        ElementType::UInt16 => (0.0, f64::from(u16::MAX)),
        ElementType::UInt32 => (0.0, f64::from(u32::MAX)),
        ElementType::UInt64 => (0.0, u64::MAX as f64),
    };
    value.fract() == 0.0 && value >= lo && value <= hi
}

impl Stage for CreateDataArray {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "CreateDataArray",
            uuid: Uuid::from_u128(0x2c1e_88a4_6f0b_4d35_8a3e_47b9_c0d6_51f2),
            group: "Core",
            subgroup: "Generation",
            human_label: "Create Data Array",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::created_array("CreatedArrayPath", "Created Array", self.path.clone()),
            ParameterDef::parameter(
                "ScalarType",
                "Scalar Type",
                ParameterValue::ElementType(self.element_type),
            ),
            ParameterDef::parameter(
                "NumberOfComponents",
                "Number of Components",
                ParameterValue::Int(self.components as i64),
            ),
            ParameterDef::parameter(
                "InitializationValue",
                "Initialization Value",
                ParameterValue::Float(self.initial_value),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, mode: CheckMode, ctx: &mut StageContext<'_>) {
        if !representable(self.element_type, self.initial_value) {
            ctx.error(
                codes::VALUE_OUT_OF_RANGE,
                format!(
                    "initial value {} does not fit in {}",
                    self.initial_value, self.element_type
                ),
            );
            return;
        }
        check::create_array(
            dca,
            &self.path,
            self.element_type,
            self.components,
            mode,
            ctx,
        );
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let Some(array) = dca.array_mut(&self.path) else {
            ctx.error(
                codes::MISSING_ARRAY,
                format!("array '{}' was not created", self.path),
            );
            return;
        };
        array.fill_f64(self.initial_value);
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("CreatedArrayPath", &self.path)
            .element_type("ScalarType", self.element_type)
            .int("NumberOfComponents", self.components as i64)
            .float("InitializationValue", self.initial_value);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.path = s.array_path("CreatedArrayPath", &self.path);
        self.element_type = s.element_type("ScalarType", self.element_type);
        self.components =
            usize::try_from(s.int("NumberOfComponents", self.components as i64)).unwrap_or(0);
        self.initial_value = s.float("InitializationValue", self.initial_value);
        index + 1
    }
}
