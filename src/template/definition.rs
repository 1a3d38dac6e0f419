//! Raw, unresolved template definitions as supplied by a store

use toml::{Table, Value};

use super::fields::MergeMode;
use super::registry::TemplateError;

/// A template exactly as it was declared: its parents plus whatever fields it sets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateDefinition {
    /// Unique template id
    pub id: String,
    /// Parent ids, in declaration order
    pub extends: Vec<String>,
    /// Every field the template declares, untyped
    pub fields: Table,
}

impl TemplateDefinition {
    /// Create an empty definition with no parents
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extends: Vec::new(),
            fields: Table::new(),
        }
    }

    /// Build a definition from a TOML table, pulling `extends` out of the fields
    ///
    /// `extends` may be a single id or an array of ids.
    pub fn from_table(id: impl Into<String>, mut table: Table) -> Result<Self, TemplateError> {
        let id = id.into();
        let extends = match table.remove("extends") {
            None => Vec::new(),
            Some(Value::String(parent)) => vec![parent],
            Some(Value::Array(parents)) => parents
                .into_iter()
                .map(|p| match p {
                    Value::String(s) => Ok(s),
                    other => Err(TemplateError::InvalidField {
                        template: id.clone(),
                        field: "extends".to_string(),
                        message: format!("expected a template id, found {}", other.type_str()),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(TemplateError::InvalidField {
                    template: id,
                    field: "extends".to_string(),
                    message: format!(
                        "expected a template id or list of ids, found {}",
                        other.type_str()
                    ),
                })
            }
        };

        Ok(Self {
            id,
            extends,
            fields: table,
        })
    }

    /// Add a parent
    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }

    /// Set a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a declared field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Check if this template declares a field at all
    pub fn declares(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Read the merge flag `flag` as declared on this template
    pub fn merge_mode(&self, flag: &str) -> Result<MergeMode, TemplateError> {
        read_merge_mode(&self.fields, flag, MergeMode::Replace).map_err(|_| TemplateError::MalformedMergeFlag {
            template: self.id.clone(),
            field: flag.to_string(),
        })
    }
}

/// Read a merge flag out of any table; absence means `absent`
pub(crate) fn read_merge_mode(table: &Table, flag: &str, absent: MergeMode) -> Result<MergeMode, ()> {
    match table.get(flag) {
        None => Ok(absent),
        Some(Value::Boolean(concat)) => Ok(MergeMode::from_flag(*concat)),
        Some(_) => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_single_parent() {
        let table: Table = toml::from_str(r#"extends = "base""#).unwrap();
        let def = TemplateDefinition::from_table("child", table).unwrap();
        assert_eq!(def.extends, vec!["base".to_string()]);
        assert!(!def.declares("extends"));
    }

    #[test]
    fn test_from_table_parent_list() {
        let table: Table = toml::from_str(
            r#"
            extends = ["a", "b"]
            command = "bash"
            "#,
        )
        .unwrap();
        let def = TemplateDefinition::from_table("child", table).unwrap();
        assert_eq!(def.extends, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(def.field("command").and_then(Value::as_str), Some("bash"));
    }

    #[test]
    fn test_from_table_rejects_bad_extends() {
        let table: Table = toml::from_str("extends = 3").unwrap();
        let result = TemplateDefinition::from_table("child", table);
        assert!(matches!(result, Err(TemplateError::InvalidField { .. })));
    }

    #[test]
    fn test_merge_mode_defaults_to_replace() {
        let def = TemplateDefinition::new("t");
        assert_eq!(def.merge_mode("merge_pre_commands").unwrap(), MergeMode::Replace);
    }

    #[test]
    fn test_malformed_merge_flag() {
        let def = TemplateDefinition::new("t").with_field("merge_pre_commands", "yes");
        match def.merge_mode("merge_pre_commands") {
            Err(TemplateError::MalformedMergeFlag { template, field }) => {
                assert_eq!(template, "t");
                assert_eq!(field, "merge_pre_commands");
            }
            other => panic!("Expected MalformedMergeFlag, got {:?}", other),
        }
    }
}
