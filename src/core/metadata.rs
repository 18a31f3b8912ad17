//! Metadata for objects and properties.
//!
//! Metadata is an ordered list of string key/value pairs. Its text form is
//! `key=value;key2=value2` with `\`, `;` and `=` escaped by a backslash.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Ordered key/value metadata.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    pub const SCHEMA_KEY: &'static str = "schema";
    pub const SCHEMA_BASE_KEY: &'static str = "schemaBaseType";
    /// `<schema title>:<schema compound name>`
    pub const SCHEMA_OBJ_TITLE_KEY: &'static str = "schemaObjTitle";
    pub const INTERPRETATION_KEY: &'static str = "interpretation";
    pub const GEOM_PARAM_KEY: &'static str = "isGeomParam";
    pub const GEO_SCOPE_KEY: &'static str = "geoScope";
    pub const APP_NAME_KEY: &'static str = "_ai_Application";
    pub const DESCRIPTION_KEY: &'static str = "_ai_Description";
    pub const ALEMBIC_VERSION_KEY: &'static str = "_ai_AlembicVersion";

    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing entry with the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`MetaData::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Text form: `key=value;key2=value2`.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            push_escaped(&mut out, k);
            out.push('=');
            push_escaped(&mut out, v);
        }
        out
    }

    /// Parse the text form. Entries without `=` or with an empty key are
    /// dropped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            let target = if in_value { &mut value } else { &mut key };
            match c {
                '\\' => match chars.next() {
                    Some(next @ ('\\' | ';' | '=')) => target.push(next),
                    Some(other) => {
                        target.push('\\');
                        target.push(other);
                    }
                    None => target.push('\\'),
                },
                '=' if !in_value => in_value = true,
                ';' => {
                    if in_value && !key.is_empty() {
                        meta.set(std::mem::take(&mut key), std::mem::take(&mut value));
                    }
                    key.clear();
                    value.clear();
                    in_value = false;
                }
                _ => target.push(c),
            }
        }
        if in_value && !key.is_empty() {
            meta.set(key, value);
        }

        meta
    }

    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA_KEY)
    }

    pub fn set_schema(&mut self, schema: &str) {
        self.set(Self::SCHEMA_KEY, schema);
    }

    pub fn schema_base(&self) -> Option<&str> {
        self.get(Self::SCHEMA_BASE_KEY)
    }

    pub fn schema_obj_title(&self) -> Option<&str> {
        self.get(Self::SCHEMA_OBJ_TITLE_KEY)
    }

    /// Interpretation (e.g. "point", "vector", "normal", "box").
    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION_KEY)
    }

    /// True when the property is a geometry parameter.
    pub fn is_geom_param(&self) -> bool {
        self.get(Self::GEOM_PARAM_KEY) == Some("true")
    }

    /// Check if the schema title starts with `prefix` (titles carry a
    /// version suffix, e.g. `AbcGeom_PolyMesh_v1`).
    pub fn matches_schema_prefix(&self, prefix: &str) -> bool {
        self.schema().is_some_and(|s| s.starts_with(prefix))
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl From<String> for MetaData {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<MetaData> for String {
    fn from(meta: MetaData) -> Self {
        meta.serialize()
    }
}

impl FromIterator<(String, String)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}
