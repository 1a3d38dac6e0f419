//! Fully materialized templates

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::renderer::Value as VarValue;

/// A file to write into the session before launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFile {
    /// Destination path
    pub target: String,
    /// File content (a template)
    #[serde(default)]
    pub content: String,
}

/// A host directory to mount into the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Path on the host (a template)
    pub host: String,
    /// Path inside the session; defaults to the host path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl BindMount {
    /// Where the mount appears inside the session
    pub fn target(&self) -> &str {
        self.container.as_deref().unwrap_or(&self.host)
    }
}

/// A link shown alongside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Display name (a template); also the merge key
    pub name: String,
    /// Target url (a template)
    pub url: String,
    /// Drop the link when any placeholder it uses has no value
    #[serde(default)]
    pub skip_if_unresolved: bool,
    /// Show while the session is running
    #[serde(default = "default_true")]
    pub show_active: bool,
    /// Show while the session is stopped
    #[serde(default = "default_true")]
    pub show_inactive: bool,
}

fn default_true() -> bool {
    true
}

/// Input widget for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Text,
    Select,
    Boolean,
    Number,
}

/// Where a parameter's selectable values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionsSource {
    /// Values configured for the viewer and the viewer's groups
    User,
    /// Names of the enabled forges
    Forges,
    /// Output of a command registered on the active forge
    Forge,
}

/// A user-supplied launch parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ParameterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<VarValue>,
    /// Static choices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionsSource>,
    /// Forge command key used with `options_source = "forge"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_forge_key: Option<String>,
}

/// The resolved `sandbox_overrides` fragment
///
/// List fields already include the primary value they were seeded with.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OverlayBlock {
    pub name: Option<String>,
    pub description: Option<String>,
    pub isolation: Option<String>,
    pub image: Option<String>,
    pub command: Option<String>,
    pub fork_command: Option<String>,
    pub working_directory: Option<String>,
    pub pre_commands: Option<Vec<String>>,
    pub post_commands: Option<Vec<String>>,
    pub fork_pre_commands: Option<Vec<String>>,
    pub fork_post_commands: Option<Vec<String>>,
    pub write_files: Option<Vec<WriteFile>>,
    pub expand_file_includes: Option<Vec<String>>,
    pub bind_mounts: Option<Vec<BindMount>>,
    pub env_vars: Option<BTreeMap<String, String>>,
    pub parameters: Option<Vec<Parameter>>,
    pub links: Option<Vec<Link>>,
    /// Scalars without a dedicated field
    pub extra: Table,
}

/// A template with its whole ancestry merged in
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolvedTemplate {
    pub id: String,
    /// Linearized ancestors, earliest first
    pub ancestors: Vec<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub isolation: Option<String>,
    pub image: Option<String>,
    pub command: Option<String>,
    pub fork_command: Option<String>,
    pub working_directory: Option<String>,
    pub pre_commands: Vec<String>,
    pub post_commands: Vec<String>,
    pub fork_pre_commands: Option<Vec<String>>,
    pub fork_post_commands: Option<Vec<String>>,
    pub write_files: Vec<WriteFile>,
    pub expand_file_includes: Vec<String>,
    pub bind_mounts: Vec<BindMount>,
    pub env_vars: BTreeMap<String, String>,
    pub parameters: Vec<Parameter>,
    pub links: Vec<Link>,
    pub sandbox_overrides: Option<OverlayBlock>,
    /// Scalars without a dedicated field
    pub extra: Table,
}

/// A field that failed to take its typed shape
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldShapeError {
    pub field: String,
    pub message: String,
}

fn take<T: DeserializeOwned>(table: &mut Table, field: &str) -> Result<Option<T>, FieldShapeError> {
    table
        .remove(field)
        .map(|value| {
            value.try_into::<T>().map_err(|e| FieldShapeError {
                field: field.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

impl OverlayBlock {
    pub(crate) fn from_table(mut table: Table) -> Result<Self, FieldShapeError> {
        let prefixed = |e: FieldShapeError| FieldShapeError {
            field: format!("sandbox_overrides.{}", e.field),
            message: e.message,
        };

        let t = &mut table;
        Ok(Self {
            name: take(t, "name").map_err(prefixed)?,
            description: take(t, "description").map_err(prefixed)?,
            isolation: take(t, "isolation").map_err(prefixed)?,
            image: take(t, "image").map_err(prefixed)?,
            command: take(t, "command").map_err(prefixed)?,
            fork_command: take(t, "fork_command").map_err(prefixed)?,
            working_directory: take(t, "working_directory").map_err(prefixed)?,
            pre_commands: take(t, "pre_commands").map_err(prefixed)?,
            post_commands: take(t, "post_commands").map_err(prefixed)?,
            fork_pre_commands: take(t, "fork_pre_commands").map_err(prefixed)?,
            fork_post_commands: take(t, "fork_post_commands").map_err(prefixed)?,
            write_files: take(t, "write_files").map_err(prefixed)?,
            expand_file_includes: take(t, "expand_file_includes").map_err(prefixed)?,
            bind_mounts: take(t, "bind_mounts").map_err(prefixed)?,
            env_vars: take(t, "env_vars").map_err(prefixed)?,
            parameters: take(t, "parameters").map_err(prefixed)?,
            links: take(t, "links").map_err(prefixed)?,
            extra: table,
        })
    }
}

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}

impl ResolvedTemplate {
    /// Give a merged field table its typed shape
    pub(crate) fn from_table(
        id: &str,
        ancestors: Vec<String>,
        mut table: Table,
    ) -> Result<Self, FieldShapeError> {
        let t = &mut table;
        let sandbox_overrides = match t.remove("sandbox_overrides") {
            Some(Value::Table(overlay)) => Some(OverlayBlock::from_table(overlay)?),
            Some(other) => {
                return Err(FieldShapeError {
                    field: "sandbox_overrides".to_string(),
                    message: format!("expected a table, found {}", other.type_str()),
                })
            }
            None => None,
        };

        Ok(Self {
            id: id.to_string(),
            ancestors,
            name: take(t, "name")?,
            description: take(t, "description")?,
            isolation: take(t, "isolation")?,
            image: take(t, "image")?,
            command: take(t, "command")?,
            fork_command: take(t, "fork_command")?,
            working_directory: take(t, "working_directory")?,
            pre_commands: take(t, "pre_commands")?.unwrap_or_default(),
            post_commands: take(t, "post_commands")?.unwrap_or_default(),
            fork_pre_commands: take(t, "fork_pre_commands")?,
            fork_post_commands: take(t, "fork_post_commands")?,
            write_files: take(t, "write_files")?.unwrap_or_default(),
            expand_file_includes: take(t, "expand_file_includes")?.unwrap_or_default(),
            bind_mounts: take(t, "bind_mounts")?.unwrap_or_default(),
            env_vars: take(t, "env_vars")?.unwrap_or_default(),
            parameters: take(t, "parameters")?.unwrap_or_default(),
            links: take(t, "links")?.unwrap_or_default(),
            sandbox_overrides,
            extra: table,
        })
    }

    /// Get a declared parameter
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The template as it applies inside a sandbox: overlay values win where set
    pub fn with_sandbox_overrides(&self) -> ResolvedTemplate {
        let mut effective = self.clone();
        let Some(overlay) = &self.sandbox_overrides else {
            return effective;
        };

        set_opt(&mut effective.name, &overlay.name);
        set_opt(&mut effective.description, &overlay.description);
        set_opt(&mut effective.isolation, &overlay.isolation);
        set_opt(&mut effective.image, &overlay.image);
        set_opt(&mut effective.command, &overlay.command);
        set_opt(&mut effective.fork_command, &overlay.fork_command);
        set_opt(&mut effective.working_directory, &overlay.working_directory);
        set(&mut effective.pre_commands, &overlay.pre_commands);
        set(&mut effective.post_commands, &overlay.post_commands);
        set_opt(&mut effective.fork_pre_commands, &overlay.fork_pre_commands);
        set_opt(&mut effective.fork_post_commands, &overlay.fork_post_commands);
        set(&mut effective.write_files, &overlay.write_files);
        set(&mut effective.expand_file_includes, &overlay.expand_file_includes);
        set(&mut effective.bind_mounts, &overlay.bind_mounts);
        set(&mut effective.env_vars, &overlay.env_vars);
        set(&mut effective.parameters, &overlay.parameters);
        set(&mut effective.links, &overlay.links);
        for (key, value) in &overlay.extra {
            effective.extra.insert(key.clone(), value.clone());
        }
        effective
    }
}
