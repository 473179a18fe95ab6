//! XDMF companion description of written containers.
//!
//! Visualization tools read the XDMF file to learn grid topology and where
//! each attribute lives inside the container file. Writing is best-effort:
//! the first I/O error is logged and disables the writer for the rest of
//! the run, without failing the container write.

use std::collections::BTreeMap;
use std::io::{self, Write};

use grainflow_core::{Category, DataContainer, ElementType, TypedArray};
use smallvec::SmallVec;
use tracing::warn;

use crate::layout::CONTAINERS_GROUP;

/// Streams an XDMF document. Every call is a no-op once disabled.
///
/// # Examples
///
/// ```
/// use grainflow_core::{Category, DataContainer, ElementType, TypedArray};
/// use grainflow_io::XdmfWriter;
///
/// let mut dc = DataContainer::new("Volume");
/// dc.set_dimensions([2, 2, 1]);
/// dc.insert_array(
///     Category::Cell,
///     TypedArray::zeros("Phases", ElementType::Int32, 1, 4).unwrap(),
/// ).unwrap();
///
/// let mut xdmf = XdmfWriter::new(Vec::new(), "grains.gfdc");
/// xdmf.container(&dc);
/// let text = String::from_utf8(xdmf.finish().unwrap()).unwrap();
/// assert!(text.contains("grains.gfdc:/DataContainers/Volume/CellData/Phases"));
/// ```
#[derive(Debug)]
pub struct XdmfWriter<W: Write> {
    out: Option<W>,
    data_file: String,
}

impl<W: Write> XdmfWriter<W> {
    /// An enabled writer. The preamble is written immediately.
    ///
    /// `data_file` is the container file name used in attribute references.
    pub fn new(out: W, data_file: impl Into<String>) -> Self {
        let mut writer = Self {
            out: Some(out),
            data_file: data_file.into(),
        };
        writer.emit(|out| {
            writeln!(out, "<?xml version=\"1.0\"?>")?;
            writeln!(out, "<!DOCTYPE Xdmf SYSTEM \"Xdmf.dtd\"[]>")?;
            writeln!(
                out,
                "<Xdmf xmlns:xi=\"http://www.w3.org/2003/XInclude\" Version=\"2.2\">"
            )?;
            writeln!(out, " <Domain>")
        });
        writer
    }

    /// A writer that never writes.
    pub fn disabled() -> Self {
        Self {
            out: None,
            data_file: String::new(),
        }
    }

    /// Whether calls still produce output.
    pub fn is_enabled(&self) -> bool {
        self.out.is_some()
    }

    /// Describe one container: its cell grid, its feature grid and one grid
    /// per distinct neighbor-list size.
    pub fn container(&mut self, dc: &DataContainer) {
        if !self.is_enabled() {
            return;
        }
        self.cell_grid(dc);
        self.feature_grids(dc);
    }

    /// Close the document and return the sink, or `None` if disabled.
    pub fn finish(mut self) -> Option<W> {
        self.emit(|out| {
            writeln!(out, " </Domain>")?;
            writeln!(out, "</Xdmf>")?;
            out.flush()
        });
        self.out
    }

    fn cell_grid(&mut self, dc: &DataContainer) {
        let cells = dc.map(Category::Cell);
        let arrays: Vec<&TypedArray> = cells.iter().filter(|a| !a.is_neighbor_list()).collect();
        if arrays.is_empty() {
            return;
        }
        let g = dc.geometry();
        let [x, y, z] = g.dimensions;
        let label = format!("{} Cell Data", dc.name());
        let dims = format!("{z} {y} {x}");
        let data_file = self.data_file.clone();
        self.emit(|out| {
            writeln!(out)?;
            writeln!(out, "  <Grid Name=\"{}\" GridType=\"Uniform\">", escape(&label))?;
            writeln!(
                out,
                "    <Topology TopologyType=\"3DCoRectMesh\" Dimensions=\"{} {} {} \"></Topology>",
                z + 1,
                y + 1,
                x + 1
            )?;
            write_geometry(
                out,
                [g.origin[2], g.origin[1], g.origin[0]],
                [g.spacing[2], g.spacing[1], g.spacing[0]],
            )?;
            for array in &arrays {
                write_attribute(out, &data_file, dc.name(), Category::Cell, array, &dims, " (Cell)")?;
            }
            write_footer(out, &label)
        });
    }

    fn feature_grids(&mut self, dc: &DataContainer) {
        let features = dc.map(Category::CellFeature);
        let data_file = self.data_file.clone();

        let fixed: Vec<&TypedArray> = features.iter().filter(|a| !a.is_neighbor_list()).collect();
        if !fixed.is_empty() {
            let total = features.tuple_count();
            let label = format!("{} Field Data ({total})", dc.name());
            self.emit(|out| {
                write_unit_grid_header(out, &label, total)?;
                for array in &fixed {
                    write_attribute(
                        out,
                        &data_file,
                        dc.name(),
                        Category::CellFeature,
                        array,
                        &total.to_string(),
                        " (Field)",
                    )?;
                }
                write_footer(out, &label)
            });
        }

        // Neighbor lists have no fixed tuple width; arrays sharing a
        // flattened size share one grid.
        let mut by_size: BTreeMap<usize, SmallVec<[&TypedArray; 4]>> = BTreeMap::new();
        for array in features.iter().filter(|a| a.is_neighbor_list()) {
            by_size.entry(array.element_count()).or_default().push(array);
        }
        for (total, arrays) in by_size {
            let label = format!("{} Neighbor Data ({total})", dc.name());
            self.emit(|out| {
                write_unit_grid_header(out, &label, total)?;
                for array in &arrays {
                    write_attribute(
                        out,
                        &data_file,
                        dc.name(),
                        Category::CellFeature,
                        array,
                        &total.to_string(),
                        " (Neighbor Data)",
                    )?;
                }
                write_footer(out, &label)
            });
        }
    }

    fn emit(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        if let Err(err) = f(out) {
            warn!(error = %err, "XDMF write failed; companion file disabled");
            self.out = None;
        }
    }
}

fn write_geometry(out: &mut dyn Write, origin: [f32; 3], spacing: [f32; 3]) -> io::Result<()> {
    writeln!(out, "    <Geometry Type=\"ORIGIN_DXDYDZ\">")?;
    writeln!(out, "      <!-- Origin -->")?;
    writeln!(
        out,
        "      <DataItem Format=\"XML\" Dimensions=\"3\">{} {} {}</DataItem>",
        origin[0], origin[1], origin[2]
    )?;
    writeln!(out, "      <!-- DxDyDz (Spacing/Resolution)-->")?;
    writeln!(
        out,
        "      <DataItem Format=\"XML\" Dimensions=\"3\">{} {} {}</DataItem>",
        spacing[0], spacing[1], spacing[2]
    )?;
    writeln!(out, "    </Geometry>")
}

fn write_unit_grid_header(out: &mut dyn Write, label: &str, elements: usize) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  <Grid Name=\"{}\" GridType=\"Uniform\">", escape(label))?;
    writeln!(
        out,
        "    <Topology TopologyType=\"3DCoRectMesh\" Dimensions=\"{elements} 1 1\"></Topology>"
    )?;
    write_geometry(out, [0.0; 3], [1.0; 3])
}

fn write_footer(out: &mut dyn Write, label: &str) -> io::Result<()> {
    writeln!(out, "  </Grid>")?;
    writeln!(out, "    <!-- *************** END OF {} *************** -->", escape(label))?;
    writeln!(out)
}

fn write_attribute(
    out: &mut dyn Write,
    data_file: &str,
    container: &str,
    category: Category,
    array: &TypedArray,
    dims: &str,
    suffix: &str,
) -> io::Result<()> {
    let components = array.components();
    let dims = if components > 1 && !array.is_neighbor_list() {
        format!("{dims} {components}")
    } else {
        dims.to_string()
    };
    let (number_type, precision) = number_type(array.element_type());
    writeln!(
        out,
        "    <Attribute Name=\"{}{suffix}\" AttributeType=\"{}\" Center=\"Cell\">",
        escape(array.name()),
        attribute_type(components)
    )?;
    writeln!(
        out,
        "      <DataItem Format=\"GFDC\" Dimensions=\"{dims}\" NumberType=\"{number_type}\" \
         Precision=\"{precision}\" >"
    )?;
    writeln!(
        out,
        "        {}:/{CONTAINERS_GROUP}/{}/{}/{}",
        escape(data_file),
        escape(container),
        category.group_name(),
        escape(array.name())
    )?;
    writeln!(out, "      </DataItem>")?;
    writeln!(out, "    </Attribute>")
}

/// XDMF attribute type for a tuple width.
pub fn attribute_type(components: usize) -> &'static str {
    match components {
        1 => "Scalar",
        3 => "Vector",
        6 => "Tensor6",
        9 => "Tensor",
        _ => "Matrix",
    }
}

fn number_type(element_type: ElementType) -> (&'static str, usize) {
    let name = match element_type {
        ElementType::Int8 => "Char",
        ElementType::UInt8 | ElementType::Bool => "UChar",
        ElementType::Int16 | ElementType::Int32 | ElementType::Int64 => "Int",
        ElementType::UInt16 | ElementType::UInt32 | ElementType::UInt64 => "UInt",
        ElementType::Float32 | ElementType::Float64 => "Float",
    };
    (name, element_type.size_in_bytes())
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
