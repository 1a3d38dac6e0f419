//! Session Templates - composable launch templates for isolated sessions
//!
//! This library resolves multi-parent template inheritance into concrete
//! templates and renders their text fields (commands, files, mounts, links)
//! through a small template language.
//!
//! # Example
//!
//! ```rust
//! use session_templates::{plan_launch, Catalog, LaunchRequest, LocalFileProbe};
//!
//! let catalog = Catalog::from_str(r#"
//!     [templates.base]
//!     command = "bash -l"
//!     pre_commands = ["cd /work/{session_id}"]
//!
//!     [templates.agent]
//!     extends = "base"
//!     merge_pre_commands = true
//!     pre_commands = ["echo ready"]
//! "#).unwrap();
//!
//! let plan = plan_launch(
//!     &catalog.resolver(),
//!     "agent",
//!     &LaunchRequest::new("s1"),
//!     &catalog.render,
//!     &LocalFileProbe,
//! ).unwrap();
//! assert_eq!(plan.command, "cd /work/s1 && echo ready && bash -l");
//! ```

pub mod catalog;
pub mod error;
pub mod launch;
pub mod options;
pub mod parser;
pub mod renderer;
pub mod template;

pub use catalog::{Catalog, CatalogError};
pub use error::ParseError;
pub use launch::{
    prepare_launch, ChainPolicy, FileProbe, LaunchPlan, LaunchRequest, LocalFileProbe,
    RenderedLink,
};
pub use options::{
    ForgeConfig, OptionsConfig, OptionsError, OptionsOutcome, ParameterOptionsResolver,
    UserDirectory,
};
pub use parser::{parse, Template};
pub use renderer::{
    render, render_with_config, FieldRenderError, RenderConfig, RenderError, Rendered, Value,
    Variables,
};
pub use template::{
    resolve_template, ResolvedTemplate, TemplateDefinition, TemplateError, TemplateRegistry,
    TemplateResolver, TemplateStore,
};

use thiserror::Error;

/// Errors that can occur during the launch pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaunchError {
    /// The template does not resolve
    #[error("configuration error: {0}")]
    Config(#[from] TemplateError),

    /// A field of the resolved template does not render
    #[error("render error: {0}")]
    Render(#[from] FieldRenderError),
}

/// Resolve a template and render it for one session
pub fn plan_launch<S: TemplateStore>(
    templates: &TemplateResolver<S>,
    id: &str,
    request: &LaunchRequest,
    config: &RenderConfig,
    probe: &dyn FileProbe,
) -> Result<LaunchPlan, LaunchError> {
    let template = templates.resolve(id)?;
    Ok(prepare_launch(&template, request, config, probe)?)
}
