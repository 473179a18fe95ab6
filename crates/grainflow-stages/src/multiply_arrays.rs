//! Element-wise product of two numeric arrays.

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType, TypedArray};
use grainflow_stage::{
    check, codes, CheckMode, ParameterDef, SettingsReader, SettingsWriter, Stage, StageContext,
    StageInfo,
};
use rayon::prelude::*;
use uuid::Uuid;

/// `output[i] = first[i] * second[i]`, widened to float64.
///
/// The inputs may have different element types but must agree on
/// component count and on the tuple count of their maps; the output map
/// must have that tuple count too. A disagreement fails with
/// [`codes::INVALID_EXPRESSION`].
#[derive(Clone, Debug, PartialEq)]
pub struct MultiplyArrays {
    /// Left operand.
    pub first: DataArrayPath,
    /// Right operand.
    pub second: DataArrayPath,
    /// Created float64 result.
    pub output: DataArrayPath,
}

impl Default for MultiplyArrays {
    fn default() -> Self {
        let path = |name: &str| DataArrayPath::new("VoxelDataContainer", Category::Cell, name);
        Self {
            first: path("A"),
            second: path("B"),
            output: path("Product"),
        }
    }
}

impl MultiplyArrays {
    /// Multiply `first` by `second` into `output`.
    pub fn new(first: DataArrayPath, second: DataArrayPath, output: DataArrayPath) -> Self {
        Self {
            first,
            second,
            output,
        }
    }

    /// Looks up a numeric operand of whatever width it has.
    fn operand<'d>(
        dca: &'d DataContainerArray,
        path: &DataArrayPath,
        ctx: &mut StageContext<'_>,
    ) -> Option<&'d TypedArray> {
        let components = dca.array(path).map_or(1, TypedArray::components);
        check::require_numeric_array(dca, path, components, ctx)
    }
}

fn map_tuples(dca: &DataContainerArray, path: &DataArrayPath) -> Option<usize> {
    dca.get(&path.container)
        .map(|dc| dc.map(path.category).tuple_count())
}

impl Stage for MultiplyArrays {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "MultiplyArrays",
            uuid: Uuid::from_u128(0xa7c4_2e19_d3b5_4f60_8c2d_71e0_45ab_9c14),
            group: "Core",
            subgroup: "Memory/Management",
            human_label: "Multiply Arrays",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::required_array("FirstArrayPath", "First Array", self.first.clone()),
            ParameterDef::required_array("SecondArrayPath", "Second Array", self.second.clone()),
            ParameterDef::created_array("OutputArrayPath", "Product Array", self.output.clone()),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, mode: CheckMode, ctx: &mut StageContext<'_>) {
        let Some(first) = Self::operand(dca, &self.first, ctx) else {
            return;
        };
        let components = first.components();
        let Some(second) = Self::operand(dca, &self.second, ctx) else {
            return;
        };
        if second.components() != components {
            ctx.error(
                codes::INVALID_EXPRESSION,
                format!(
                    "'{}' has {components} components but '{}' has {}",
                    self.first,
                    self.second,
                    second.components()
                ),
            );
            return;
        }
        let tuples = map_tuples(dca, &self.first);
        if map_tuples(dca, &self.second) != tuples {
            ctx.error(
                codes::INVALID_EXPRESSION,
                format!(
                    "'{}' and '{}' live in maps of different tuple counts",
                    self.first, self.second
                ),
            );
            return;
        }
        if check::require_container(dca, &self.output.container, ctx).is_none() {
            return;
        }
        if map_tuples(dca, &self.output) != tuples {
            ctx.error(
                codes::INVALID_EXPRESSION,
                format!(
                    "output '{}' lives in a map of a different tuple count",
                    self.output
                ),
            );
            return;
        }
        check::create_array(dca, &self.output, ElementType::Float64, components, mode, ctx);
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let (Some(a), Some(b)) = (dca.array(&self.first), dca.array(&self.second)) else {
            ctx.error(codes::MISSING_ARRAY, "operand vanished after data check");
            return;
        };
        if a.element_count() != b.element_count() {
            ctx.error(
                codes::INVALID_EXPRESSION,
                format!(
                    "operands hold {} and {} values",
                    a.element_count(),
                    b.element_count()
                ),
            );
            return;
        }
        let product: Vec<f64> = (0..a.element_count())
            .into_par_iter()
            .map(|i| a.value_f64(i).unwrap_or(0.0) * b.value_f64(i).unwrap_or(0.0))
            .collect();

        match dca
            .array_mut(&self.output)
            .and_then(|out| out.as_mut_slice::<f64>())
        {
            Some(out) if out.len() == product.len() => out.copy_from_slice(&product),
            _ => ctx.error(
                codes::INVALID_EXPRESSION,
                format!("output '{}' does not match the operands", self.output),
            ),
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("FirstArrayPath", &self.first)
            .array_path("SecondArrayPath", &self.second)
            .array_path("OutputArrayPath", &self.output);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.first = s.array_path("FirstArrayPath", &self.first);
        self.second = s.array_path("SecondArrayPath", &self.second);
        self.output = s.array_path("OutputArrayPath", &self.output);
        index + 1
    }
}
