//! In-memory group tree decoded from a container file.

use std::fmt;

use grainflow_core::TypedArray;
use indexmap::IndexMap;

/// A tagged attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    /// UTF-8 text.
    Text(String),
    /// Vector of signed 64-bit integers.
    I64s(Vec<i64>),
    /// Vector of single-precision floats.
    F32s(Vec<f32>),
    /// One unsigned 64-bit integer.
    U64(u64),
}

impl AttributeValue {
    /// The text, if this is a text attribute.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The integers, if this is an i64 vector.
    pub fn as_i64s(&self) -> Option<&[i64]> {
        match self {
            Self::I64s(v) => Some(v),
            _ => None,
        }
    }

    /// The floats, if this is an f32 vector.
    pub fn as_f32s(&self) -> Option<&[f32]> {
        match self {
            Self::F32s(v) => Some(v),
            _ => None,
        }
    }

    /// The value, if this is a u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v:?}"),
            Self::I64s(v) => write!(f, "{v:?}"),
            Self::F32s(v) => write!(f, "{v:?}"),
            Self::U64(v) => write!(f, "{v}"),
        }
    }
}

/// A named group: attributes, datasets and child groups, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Group {
    /// Group name; the root is `"/"`.
    pub name: String,
    /// Attributes by name.
    pub attributes: IndexMap<String, AttributeValue>,
    /// Datasets in file order.
    pub datasets: Vec<TypedArray>,
    /// Child groups in file order.
    pub groups: Vec<Group>,
}

impl Group {
    /// Empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Dataset by name.
    pub fn dataset(&self, name: &str) -> Option<&TypedArray> {
        self.datasets.iter().find(|d| d.name() == name)
    }

    /// First child group with the given name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Number of datasets in this group and all descendants.
    pub fn dataset_count(&self) -> usize {
        self.datasets.len() + self.groups.iter().map(Group::dataset_count).sum::<usize>()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}{}/", self.name)?;
        for (name, value) in &self.attributes {
            writeln!(f, "{pad}  @{name} = {value}")?;
        }
        for d in &self.datasets {
            let kind = if d.is_neighbor_list() {
                "neighbor list".to_string()
            } else {
                format!("{} x{}", d.element_type(), d.components())
            };
            writeln!(f, "{pad}  {} : {kind}, {} tuples", d.name(), d.tuples())?;
        }
        for g in &self.groups {
            g.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_core::ElementType;

    #[test]
    fn lookups_by_name() {
        let mut root = Group::new("/");
        let mut child = Group::new("CellData");
        child
            .attributes
            .insert("TupleCount".into(), AttributeValue::U64(4));
        child
            .datasets
            .push(TypedArray::zeros("Phases", ElementType::Int32, 1, 4).unwrap());
        root.groups.push(child);

        let cells = root.group("CellData").unwrap();
        assert_eq!(cells.attribute("TupleCount").and_then(AttributeValue::as_u64), Some(4));
        assert_eq!(cells.dataset("Phases").unwrap().tuples(), 4);
        assert!(root.group("FieldData").is_none());
        assert_eq!(root.dataset_count(), 1);
    }

    #[test]
    fn display_lists_nested_content() {
        let mut root = Group::new("/");
        let mut dc = Group::new("Volume");
        dc.attributes
            .insert("Dimensions".into(), AttributeValue::I64s(vec![2, 2, 1]));
        dc.datasets
            .push(TypedArray::neighbor_list("NeighborList", vec![vec![1], vec![0]]));
        root.groups.push(dc);

        let text = root.to_string();
        assert!(text.contains("  Volume/"), "{text}");
        assert!(text.contains("@Dimensions = [2, 2, 1]"), "{text}");
        assert!(text.contains("NeighborList : neighbor list, 2 tuples"), "{text}");
    }
}
