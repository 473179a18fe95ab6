//! Mapping between a [`DataContainerArray`] and the container file's group
//! tree.
//!
//! ```text
//! /DataContainers/<container>            @Dimensions @Origin @Spacing
//!                                        @NumberOfPoints @VtkDataObject
//! /DataContainers/<container>/VertexData @TupleCount  <datasets>
//!                             EdgeData, FaceData, CellData,
//!                             FieldData, EnsembleData
//! ```
//!
//! Containers are written in container order, categories in
//! [`Category::ALL`] order, and arrays in map order with neighbor lists
//! after the fixed-width arrays of the same category.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use grainflow_core::{AttributeArrayMap, Category, DataContainer, DataContainerArray, Geometry};
use tracing::{debug, info, warn};

use crate::error::{ContainerFileError, WriteError, WriteStep};
use crate::reader::ContainerFileReader;
use crate::tree::{AttributeValue, Group};
use crate::writer::{ContainerFileWriter, GroupGuard};
use crate::xdmf::XdmfWriter;

/// Top-level group holding one group per container.
pub const CONTAINERS_GROUP: &str = "DataContainers";
/// Grid point counts, `[x, y, z]` as i64.
pub const DIMENSIONS: &str = "Dimensions";
/// Grid origin, `[x, y, z]` as f32.
pub const ORIGIN: &str = "Origin";
/// Voxel spacing, `[dx, dy, dz]` as f32.
pub const SPACING: &str = "Spacing";
/// Product of the dimensions, as a one-element i64 vector.
pub const NUMBER_OF_POINTS: &str = "NumberOfPoints";
/// VTK data object kind of the container.
pub const VTK_DATA_OBJECT: &str = "VtkDataObject";
/// Declared tuple count of a category group, as u64.
pub const TUPLE_COUNT: &str = "TupleCount";
/// The only VTK object kind written.
pub const VTK_STRUCTURED_POINTS: &str = "VTK_STRUCTURED_POINTS";

// ── Writing ─────────────────────────────────────────────────────

/// Write every container under [`CONTAINERS_GROUP`], describing each in
/// `xdmf` once its groups are complete.
///
/// Stops at the first failure; containers and categories already written
/// stay in the stream.
pub fn write_container_array<W: Write, X: Write>(
    file: &mut ContainerFileWriter<W>,
    dca: &DataContainerArray,
    xdmf: &mut XdmfWriter<X>,
) -> Result<(), WriteError> {
    let mut root = file
        .open_group(CONTAINERS_GROUP)
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))?;
    for dc in dca.iter() {
        write_container(&mut root, dc)?;
        xdmf.container(dc);
    }
    root.close()
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))
}

fn write_container<W: Write>(
    parent: &mut GroupGuard<'_, W>,
    dc: &DataContainer,
) -> Result<(), WriteError> {
    let name = dc.name();
    let mut group = parent
        .open_group(name)
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, name, e))?;
    write_meta(&mut group, dc.geometry())
        .map_err(|e| WriteError::new(WriteStep::WriteMeta, name, e))?;
    for map in dc.maps() {
        write_category(&mut group, name, map)?;
    }
    group
        .close()
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, name, e))?;
    debug!(container = name, arrays = dc.array_count(), "container written");
    Ok(())
}

fn write_meta<W: Write>(
    group: &mut GroupGuard<'_, W>,
    geometry: &Geometry,
) -> Result<(), ContainerFileError> {
    let dims: Vec<i64> = geometry.dimensions.iter().map(|&d| d as i64).collect();
    let points = dims.iter().product::<i64>();
    group.attribute(DIMENSIONS, &AttributeValue::I64s(dims))?;
    group.attribute(ORIGIN, &AttributeValue::F32s(geometry.origin.to_vec()))?;
    group.attribute(SPACING, &AttributeValue::F32s(geometry.spacing.to_vec()))?;
    group.attribute(NUMBER_OF_POINTS, &AttributeValue::I64s(vec![points]))?;
    group.attribute(
        VTK_DATA_OBJECT,
        &AttributeValue::Text(VTK_STRUCTURED_POINTS.to_string()),
    )
}

fn write_category<W: Write>(
    parent: &mut GroupGuard<'_, W>,
    container: &str,
    map: &AttributeArrayMap,
) -> Result<(), WriteError> {
    let category = map.category();
    let mut group = parent
        .open_group(category.group_name())
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, container, e))?;
    let step = WriteStep::WriteCategory(category);
    group
        .attribute(TUPLE_COUNT, &AttributeValue::U64(map.tuple_count() as u64))
        .map_err(|e| WriteError::new(step, container, e))?;
    let fixed = map.iter().filter(|a| !a.is_neighbor_list());
    let lists = map.iter().filter(|a| a.is_neighbor_list());
    for array in fixed.chain(lists) {
        group
            .dataset(array)
            .map_err(|e| WriteError::new(step, container, e))?;
    }
    group
        .close()
        .map_err(|e| WriteError::new(step, container, e))
}

// ── Reading ─────────────────────────────────────────────────────

/// Rebuild a [`DataContainerArray`] from a decoded tree.
pub fn container_array_from_tree(root: Group) -> Result<DataContainerArray, ContainerFileError> {
    let Some(containers) = root.groups.into_iter().find(|g| g.name == CONTAINERS_GROUP) else {
        return Err(ContainerFileError::malformed(format!(
            "missing '{CONTAINERS_GROUP}' group"
        )));
    };
    let mut dca = DataContainerArray::new();
    for group in containers.groups {
        dca.add(container_from_group(group)?)?;
    }
    Ok(dca)
}

fn container_from_group(group: Group) -> Result<DataContainer, ContainerFileError> {
    let name = group.name;
    let dims = vec3_attr(&group.attributes, DIMENSIONS, &name, AttributeValue::as_i64s)?;
    let mut dimensions = [0usize; 3];
    for (slot, &d) in dimensions.iter_mut().zip(dims.iter()) {
        *slot = usize::try_from(d).map_err(|_| {
            ContainerFileError::malformed(format!("container '{name}' has dimension {d}"))
        })?;
    }
    let geometry = Geometry {
        dimensions,
        origin: vec3_attr(&group.attributes, ORIGIN, &name, AttributeValue::as_f32s)?,
        spacing: vec3_attr(&group.attributes, SPACING, &name, AttributeValue::as_f32s)?,
    };
    let mut dc = DataContainer::with_geometry(name.clone(), geometry);

    for sub in group.groups {
        let category = Category::from_group_name(&sub.name).ok_or_else(|| {
            ContainerFileError::malformed(format!(
                "container '{name}' has unknown group '{}'",
                sub.name
            ))
        })?;
        let tuples = sub
            .attribute(TUPLE_COUNT)
            .and_then(AttributeValue::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                ContainerFileError::malformed(format!(
                    "{name}/{} lacks a valid {TUPLE_COUNT}",
                    sub.name
                ))
            })?;
        if category == Category::Cell {
            if tuples != dc.total_points() {
                return Err(ContainerFileError::malformed(format!(
                    "{name}/{} declares {tuples} tuples for {} grid points",
                    sub.name,
                    dc.total_points()
                )));
            }
        } else {
            dc.resize_tuples(category, tuples);
        }
        for array in sub.datasets {
            dc.insert_array(category, array)?;
        }
    }
    dc.validate()?;
    Ok(dc)
}

fn vec3_attr<T: Copy>(
    attributes: &indexmap::IndexMap<String, AttributeValue>,
    key: &str,
    container: &str,
    get: impl Fn(&AttributeValue) -> Option<&[T]>,
) -> Result<[T; 3], ContainerFileError> {
    match attributes.get(key).and_then(get) {
        Some(&[a, b, c]) => Ok([a, b, c]),
        _ => Err(ContainerFileError::malformed(format!(
            "container '{container}' lacks a 3-element {key} attribute"
        ))),
    }
}

// ── Files ───────────────────────────────────────────────────────

/// The XDMF companion path for a container file.
pub fn xdmf_path(path: &Path) -> PathBuf {
    path.with_extension("xdmf")
}

/// Write `dca` to `path`, plus an XDMF companion next to it if asked.
///
/// An XDMF file that cannot be created is logged and skipped.
pub fn write_file(
    path: &Path,
    dca: &DataContainerArray,
    write_xdmf: bool,
) -> Result<(), WriteError> {
    let open = || -> Result<_, ContainerFileError> {
        let file = File::create(path)?;
        ContainerFileWriter::new(BufWriter::new(file))
    };
    let mut writer = open().map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))?;

    let mut xdmf = XdmfWriter::disabled();
    if write_xdmf {
        let companion = xdmf_path(path);
        match File::create(&companion) {
            Ok(file) => {
                let data_file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                xdmf = XdmfWriter::new(BufWriter::new(file), data_file);
            }
            Err(err) => {
                warn!(path = %companion.display(), error = %err, "cannot create XDMF file");
            }
        }
    }

    write_container_array(&mut writer, dca, &mut xdmf)?;
    writer
        .finish()
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))?;
    xdmf.finish();
    info!(path = %path.display(), containers = dca.len(), "container file written");
    Ok(())
}

/// Decode the group tree of the file at `path`.
pub fn read_tree_file(path: &Path) -> Result<Group, ContainerFileError> {
    let file = File::open(path)?;
    ContainerFileReader::open(BufReader::new(file))?.read_tree()
}

/// Read a [`DataContainerArray`] from the file at `path`.
pub fn read_file(path: &Path) -> Result<DataContainerArray, ContainerFileError> {
    let dca = container_array_from_tree(read_tree_file(path)?)?;
    info!(path = %path.display(), containers = dca.len(), "container file read");
    Ok(dca)
}

/// Encode `dca` into an in-memory buffer without XDMF.
pub fn to_bytes(dca: &DataContainerArray) -> Result<Vec<u8>, WriteError> {
    let mut writer = ContainerFileWriter::new(Vec::new())
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))?;
    write_container_array(&mut writer, dca, &mut XdmfWriter::<Vec<u8>>::disabled())?;
    writer
        .finish()
        .map_err(|e| WriteError::new(WriteStep::CreateGroup, "", e))
}

/// Decode a [`DataContainerArray`] from bytes written by [`to_bytes`].
pub fn from_bytes(bytes: &[u8]) -> Result<DataContainerArray, ContainerFileError> {
    container_array_from_tree(ContainerFileReader::open(bytes)?.read_tree()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_core::{ElementType, TypedArray};

    fn sample() -> DataContainerArray {
        let mut dc = DataContainer::new("Volume");
        dc.set_dimensions([2, 2, 1]);
        dc.set_origin([1.0, 2.0, 3.0]);
        dc.set_spacing([0.5, 0.5, 2.0]);
        dc.insert_array(
            Category::Cell,
            TypedArray::from_vec::<i32>("Phases", 1, vec![1, 1, 2, 2]).unwrap(),
        )
        .unwrap();
        dc.resize_tuples(Category::CellFeature, 10);
        dc.insert_array(
            Category::CellFeature,
            TypedArray::neighbor_list("NeighborList", vec![vec![1]; 10]),
        )
        .unwrap();
        dc.insert_array(
            Category::CellFeature,
            TypedArray::from_vec::<f32>("Volumes", 1, (0..10).map(|i| i as f32).collect())
                .unwrap(),
        )
        .unwrap();
        dc.insert_array(
            Category::Vertex,
            TypedArray::zeros("Nodes", ElementType::Float32, 3, 0).unwrap(),
        )
        .unwrap();
        dc.resize_tuples(Category::CellEnsemble, 3);

        let mut dca = DataContainerArray::new();
        dca.add(dc).unwrap();
        dca.add(DataContainer::new("Surface")).unwrap();
        dca
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dca = sample();
        let back = from_bytes(&to_bytes(&dca).unwrap()).unwrap();

        let dc = back.get("Volume").unwrap();
        assert_eq!(dc.geometry(), dca.get("Volume").unwrap().geometry());
        assert_eq!(dc.map(Category::CellFeature).tuple_count(), 10);
        assert_eq!(dc.map(Category::CellEnsemble).tuple_count(), 3);
        assert_eq!(dc.array(Category::Vertex, "Nodes").unwrap().tuples(), 0);
        for (a, b) in dca.iter().zip(back.iter()) {
            for category in Category::ALL {
                for array in a.map(category).iter() {
                    assert_eq!(b.array(category, array.name()), Some(array));
                }
            }
        }
        assert_eq!(back.names().collect::<Vec<_>>(), vec!["Volume", "Surface"]);
    }

    #[test]
    fn neighbor_lists_follow_fixed_arrays() {
        let tree = ContainerFileReader::open(to_bytes(&sample()).unwrap().as_slice())
            .unwrap()
            .read_tree()
            .unwrap();
        let features = tree
            .group(CONTAINERS_GROUP)
            .and_then(|g| g.group("Volume"))
            .and_then(|g| g.group("FieldData"))
            .unwrap();
        let names: Vec<_> = features.datasets.iter().map(TypedArray::name).collect();
        assert_eq!(names, vec!["Volumes", "NeighborList"]);
    }

    #[test]
    fn meta_attributes_are_written() {
        let tree = ContainerFileReader::open(to_bytes(&sample()).unwrap().as_slice())
            .unwrap()
            .read_tree()
            .unwrap();
        let volume = tree
            .group(CONTAINERS_GROUP)
            .and_then(|g| g.group("Volume"))
            .unwrap();
        assert_eq!(
            volume.attribute(DIMENSIONS),
            Some(&AttributeValue::I64s(vec![2, 2, 1]))
        );
        assert_eq!(
            volume.attribute(NUMBER_OF_POINTS),
            Some(&AttributeValue::I64s(vec![4]))
        );
        assert_eq!(
            volume.attribute(VTK_DATA_OBJECT).and_then(AttributeValue::as_text),
            Some(VTK_STRUCTURED_POINTS)
        );
        let groups: Vec<_> = volume.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            groups,
            vec!["VertexData", "EdgeData", "FaceData", "CellData", "FieldData", "EnsembleData"]
        );
    }

    #[test]
    fn missing_containers_group_is_malformed() {
        let bytes = ContainerFileWriter::new(Vec::new()).unwrap().finish().unwrap();
        assert!(matches!(
            from_bytes(&bytes),
            Err(ContainerFileError::Malformed { .. })
        ));
    }

    #[test]
    fn cell_count_must_match_geometry() {
        let mut writer = ContainerFileWriter::new(Vec::new()).unwrap();
        {
            let mut root = writer.open_group(CONTAINERS_GROUP).unwrap();
            let mut dc = root.open_group("Volume").unwrap();
            dc.attribute(DIMENSIONS, &AttributeValue::I64s(vec![2, 2, 1])).unwrap();
            dc.attribute(ORIGIN, &AttributeValue::F32s(vec![0.0; 3])).unwrap();
            dc.attribute(SPACING, &AttributeValue::F32s(vec![1.0; 3])).unwrap();
            let mut cells = dc.open_group("CellData").unwrap();
            cells.attribute(TUPLE_COUNT, &AttributeValue::U64(5)).unwrap();
        }
        let bytes = writer.finish().unwrap();
        assert!(matches!(
            from_bytes(&bytes),
            Err(ContainerFileError::Malformed { .. })
        ));
    }

    #[test]
    fn file_round_trip_with_xdmf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grains.gfdc");
        write_file(&path, &sample(), true).unwrap();

        let back = read_file(&path).unwrap();
        assert_eq!(back.len(), 2);
        let xdmf = std::fs::read_to_string(xdmf_path(&path)).unwrap();
        assert!(xdmf.contains("grains.gfdc:/DataContainers/Volume/CellData/Phases"));
    }

    /// Accepts `limit` bytes, then fails every write.
    struct FailAfter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.limit - self.written.len();
            if room == 0 {
                return Err(std::io::Error::other("device full"));
            }
            let n = buf.len().min(room);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failure_inside_category_reports_category_step() {
        let mut dc = DataContainer::new("Volume");
        dc.set_dimensions([64, 64, 1]);
        dc.insert_array(
            Category::Cell,
            TypedArray::from_vec::<f64>("Big", 1, (0..4096).map(|i| i as f64).collect())
                .unwrap(),
        )
        .unwrap();
        let mut dca = DataContainerArray::new();
        dca.add(dc).unwrap();
        dca.add(DataContainer::new("Surface")).unwrap();

        // The cell dataset dominates the stream, so the midpoint lands in it.
        let full = to_bytes(&dca).unwrap();
        let limit = full.len() / 2;
        let mut sink = FailAfter {
            written: Vec::new(),
            limit,
        };
        let err = {
            let mut writer = ContainerFileWriter::new(&mut sink).unwrap();
            write_container_array(&mut writer, &dca, &mut XdmfWriter::<Vec<u8>>::disabled())
                .unwrap_err()
        };
        assert_eq!(err.step, WriteStep::WriteCategory(Category::Cell));
        assert_eq!(err.container, "Volume");
        assert_eq!(err.code(), grainflow_stage::codes::CATEGORY_WRITE_FAILED);
        assert!(matches!(err.source, ContainerFileError::Io(_)));

        // Everything before the failure stays; nothing is rolled back.
        assert_eq!(sink.written, full[..limit]);
        assert!(from_bytes(&sink.written).is_err());
    }

    #[test]
    fn unwritable_path_reports_create_group() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.gfdc");
        let err = write_file(&path, &sample(), false).unwrap_err();
        assert_eq!(err.step, WriteStep::CreateGroup);
        assert_eq!(err.code(), grainflow_stage::codes::CREATE_GROUP_FAILED);
    }
}
