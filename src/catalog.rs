//! Catalog files: templates plus the configuration around them
//!
//! A catalog is a TOML document with `[templates.<id>]` tables, `[[forges]]`,
//! `[users.<name>]` / `[groups.<name>]` option values, and optional `[render]`
//! and `[options]` settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

use crate::options::{
    ForgeConfig, GroupEntry, OptionsConfig, ParameterOptionsResolver, UserDirectory, UserEntry,
};
use crate::renderer::RenderConfig;
use crate::template::{TemplateDefinition, TemplateError, TemplateRegistry, TemplateResolver};

/// Errors that can occur when loading a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse catalog TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// TOML structure for deserializing catalogs
#[derive(Deserialize, Default)]
#[serde(default)]
struct TomlCatalog {
    templates: Table,
    forges: Vec<ForgeConfig>,
    users: std::collections::BTreeMap<String, UserEntry>,
    groups: std::collections::BTreeMap<String, GroupEntry>,
    render: RenderConfig,
    options: OptionsConfig,
}

/// Everything loaded from one catalog file
#[derive(Debug)]
pub struct Catalog {
    pub registry: Arc<TemplateRegistry>,
    pub forges: Vec<ForgeConfig>,
    pub directory: UserDirectory,
    pub render: RenderConfig,
    pub options: OptionsConfig,
}

fn definitions(templates: Table) -> Result<Vec<TemplateDefinition>, TemplateError> {
    templates
        .into_iter()
        .map(|(id, value)| match value {
            Value::Table(table) => TemplateDefinition::from_table(id, table),
            other => Err(TemplateError::InvalidField {
                field: "templates".to_string(),
                message: format!("expected a table, found {}", other.type_str()),
                template: id,
            }),
        })
        .collect()
}

impl Catalog {
    /// Load a catalog from a TOML file
    ///
    /// Relative render directories are taken relative to the file, and the
    /// file's directory is the default root for includes.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let mut catalog = Self::from_str(&content)?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let anchor = |dir: &PathBuf| if dir.is_relative() { base.join(dir) } else { dir.clone() };
        catalog.render.include_dirs = catalog.render.include_dirs.iter().map(anchor).collect();
        catalog.render.root_dir = Some(
            catalog
                .render
                .root_dir
                .as_ref()
                .map(anchor)
                .unwrap_or_else(|| base.clone()),
        );

        debug!(path = %path.display(), templates = catalog.registry.len(), "loaded catalog");
        Ok(catalog)
    }

    /// Load a catalog from a TOML string
    pub fn from_str(content: &str) -> Result<Self, CatalogError> {
        let parsed: TomlCatalog = toml::from_str(content)?;
        let registry = TemplateRegistry::from_definitions(definitions(parsed.templates)?)?;

        Ok(Catalog {
            registry: Arc::new(registry),
            forges: parsed.forges,
            directory: UserDirectory {
                users: parsed.users,
                groups: parsed.groups,
            },
            render: parsed.render,
            options: parsed.options,
        })
    }

    /// Swap in the templates of another catalog text
    ///
    /// Resolvers built from [`Catalog::resolver`] see the change on their next
    /// lookup. Other settings are left alone.
    pub fn reload_templates(&self, content: &str) -> Result<(), CatalogError> {
        let parsed: TomlCatalog = toml::from_str(content)?;
        self.registry.replace_all(definitions(parsed.templates)?)?;
        Ok(())
    }

    /// A caching resolver over this catalog's templates
    pub fn resolver(&self) -> TemplateResolver<Arc<TemplateRegistry>> {
        TemplateResolver::new(Arc::clone(&self.registry))
    }

    /// An option resolver using this catalog's forges and users
    pub fn options_resolver(&self) -> ParameterOptionsResolver {
        ParameterOptionsResolver::new(
            self.forges.clone(),
            self.directory.clone(),
            self.options.clone(),
        )
    }
}
