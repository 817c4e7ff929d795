//! Attribute data model
//!
//! Items are named bags of name/value attributes. [`AttributeList`] is the
//! request-side helper that expands attribute pairs into the numbered
//! `Prefix.N.Name` / `Prefix.N.Value` query parameters the wire protocol
//! expects.

use sdc_core::Request;

/// A single name/value attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named item and its attributes, as returned by a select query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

/// An ordered list of attributes destined for request parameters
#[derive(Debug, Clone, Default)]
pub struct AttributeList(Vec<Attribute>);

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(Attribute::new(name, value));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    /// Expand into numbered parameters under `prefix`
    /// (`Attribute.0.Name=color`, `Attribute.0.Value=red`, ...)
    pub fn apply(&self, req: &mut Request, prefix: &str) {
        for (i, attr) in self.0.iter().enumerate() {
            req.set_param(format!("{prefix}.{i}.Name"), &attr.name);
            req.set_param(format!("{prefix}.{i}.Value"), &attr.value);
        }
    }
}

impl FromIterator<Attribute> for AttributeList {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::Method;
    use url::Url;

    #[test]
    fn test_attribute_list_expands_numbered_params() {
        let attrs = AttributeList::new()
            .add("color", "red")
            .add("size", "large");
        let mut req = Request::new(Method::GET, Url::parse("http://sdb.example.com/").unwrap());
        attrs.apply(&mut req, "Attribute");

        let params = req.params();
        assert!(params.contains(&("Attribute.0.Name".into(), "color".into())));
        assert!(params.contains(&("Attribute.0.Value".into(), "red".into())));
        assert!(params.contains(&("Attribute.1.Name".into(), "size".into())));
        assert!(params.contains(&("Attribute.1.Value".into(), "large".into())));
    }

    #[test]
    fn test_expected_prefix() {
        let expected = AttributeList::new().add("version", "3");
        let mut req = Request::new(Method::GET, Url::parse("http://sdb.example.com/").unwrap());
        expected.apply(&mut req, "Expected");

        assert!(req
            .params()
            .contains(&("Expected.0.Name".into(), "version".into())));
    }
}
