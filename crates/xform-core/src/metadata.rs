//! Descriptive metadata attached to transform operations.
//!
//! File formats carry descriptive name/value information alongside the
//! numeric payload of each operation (element names, ids, descriptions).
//! The tree is purely informational: it never influences the numeric
//! behavior of an operation, but it travels with the operation through
//! cloning, inversion and identity replacement, and the `id` attribute
//! participates in cache identities.

/// A tree of descriptive name/value pairs.
///
/// Every operation owns its metadata independently; cloning an operation
/// deep-copies the whole tree, so a clone can be edited without affecting
/// the source. The optimizer relies on this independence when it rewrites
/// sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatMetadata {
    /// Element name (e.g. "Description", "Info").
    name: String,
    /// Element text value.
    value: String,
    /// Attribute name/value pairs.
    attributes: Vec<(String, String)>,
    /// Child elements.
    children: Vec<FormatMetadata>,
}

impl FormatMetadata {
    /// Creates an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element text value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Sets the element text value.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Value of the `id` attribute, empty if absent.
    pub fn id(&self) -> &str {
        self.attribute("id").unwrap_or("")
    }

    /// Sets the `id` attribute, replacing any previous value.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if let Some(attr) = self.attributes.iter_mut().find(|(n, _)| n == "id") {
            attr.1 = id;
        } else {
            self.attributes.push(("id".into(), id));
        }
    }

    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Appends an attribute.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// Appends a child element.
    pub fn add_child(&mut self, child: FormatMetadata) {
        self.children.push(child);
    }

    /// Child elements.
    pub fn children(&self) -> &[FormatMetadata] {
        &self.children
    }

    /// Merges another tree into this one.
    ///
    /// Used when two operations are composed into one: the result keeps
    /// this element's name and value and gains the other's attributes and
    /// children.
    pub fn combine(&mut self, other: &FormatMetadata) {
        for (n, v) in &other.attributes {
            if self.attribute(n).is_none() {
                self.attributes.push((n.clone(), v.clone()));
            }
        }
        self.children.extend(other.children.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_attribute() {
        let mut md = FormatMetadata::new("Gamma");
        assert_eq!(md.id(), "");
        md.set_id("op-1");
        assert_eq!(md.id(), "op-1");
        md.set_id("op-2");
        assert_eq!(md.id(), "op-2");
        assert_eq!(md.attributes.len(), 1);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut md = FormatMetadata::new("Log");
        let mut desc = FormatMetadata::new("Description");
        desc.set_value("camera curve");
        md.add_child(desc);

        let mut copy = md.clone();
        copy.children[0].set_value("edited");
        copy.set_id("changed");

        assert_eq!(md.children()[0].value(), "camera curve");
        assert_eq!(md.id(), "");
    }

    #[test]
    fn test_combine() {
        let mut a = FormatMetadata::new("Lut1D");
        a.set_id("a");
        let mut b = FormatMetadata::new("Lut1D");
        b.set_id("b");
        b.add_child(FormatMetadata::new("Description"));

        a.combine(&b);
        // Existing attributes win; children are appended.
        assert_eq!(a.id(), "a");
        assert_eq!(a.children().len(), 1);
    }
}
