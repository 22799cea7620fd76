//! Typed option and attribute tables.
//!
//! Options and attributes are grouped into named tables of named
//! parameters (`"limits" "texturememory"`, `"System" "SqrtGridSize"`
//! and so on).  Lookups are typed and return borrowed slices; a
//! missing table, parameter, or type mismatch yields `None` and the
//! caller falls back to its default.

use std::collections::HashMap;

use glam::Vec3;

/// A single option or attribute value.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum OptionValue {
    Float(Vec<f32>),
    Integer(Vec<i32>),
    String(Vec<String>),
    Point(Vec<Vec3>),
    Color(Vec<Vec3>),
}

/// A two-level table of named options.
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    tables: HashMap<String, HashMap<String, OptionValue>>,
}

impl OptionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value.
    pub fn set(
        &mut self,
        table: impl Into<String>,
        param: impl Into<String>,
        value: OptionValue,
    ) {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(param.into(), value);
    }

    fn get(&self, table: &str, param: &str) -> Option<&OptionValue> {
        self.tables.get(table)?.get(param)
    }

    /// Look up a float parameter.
    pub fn float(&self, table: &str, param: &str) -> Option<&[f32]> {
        match self.get(table, param)? {
            OptionValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Look up an integer parameter.
    pub fn integer(&self, table: &str, param: &str) -> Option<&[i32]> {
        match self.get(table, param)? {
            OptionValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a string parameter.
    pub fn string(&self, table: &str, param: &str) -> Option<&[String]> {
        match self.get(table, param)? {
            OptionValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a point parameter.
    pub fn point(&self, table: &str, param: &str) -> Option<&[Vec3]> {
        match self.get(table, param)? {
            OptionValue::Point(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a color parameter.
    pub fn color(&self, table: &str, param: &str) -> Option<&[Vec3]> {
        match self.get(table, param)? {
            OptionValue::Color(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_misses_on_wrong_type() {
        let mut table = OptionTable::new();
        table.set("limits", "texturememory", OptionValue::Integer(vec![8192]));
        assert_eq!(table.integer("limits", "texturememory"), Some(&[8192][..]));
        assert!(table.float("limits", "texturememory").is_none());
        assert!(table.integer("limits", "bucketsize").is_none());
    }
}
