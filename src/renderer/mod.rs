//! Renderer for template text
//!
//! Parses template text and evaluates it against a [`Variables`] environment.
//! `{file:...}` includes are resolved through [`RenderConfig`].

pub mod config;
pub mod include;
mod render;
pub mod value;

use std::fs;
use std::path::Path;

use thiserror::Error;

pub use config::{RenderConfig, DEFAULT_MAX_INCLUDE_DEPTH};
pub use include::{expand_env, expand_path, locate};
pub use render::Rendered;
pub use value::{Value, Variables};

use crate::parser::parse;
use crate::ParseError;
use render::Interpreter;

/// Errors that can occur while rendering template text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The template (or an included file) does not parse
    #[error("{}", describe_syntax(origin.as_deref(), errors))]
    Syntax {
        /// Included file the errors belong to; `None` for the text being rendered
        origin: Option<String>,
        errors: Vec<ParseError>,
    },

    #[error("include '{path}' not found (searched: {})", format_paths(searched))]
    IncludeNotFound {
        path: String,
        searched: Vec<std::path::PathBuf>,
    },

    #[error("failed to read include '{path}': {message}")]
    IncludeRead { path: String, message: String },

    #[error("include '{path}' exceeds the maximum include depth of {limit}")]
    IncludeDepth { path: String, limit: usize },

    #[error("circular include: {chain}")]
    CircularInclude { chain: String },
}

impl RenderError {
    /// Format the error for a terminal, with source context for syntax errors
    ///
    /// `source` and `filename` describe the text that was rendered; syntax
    /// errors inside an included file are reported against that file.
    pub fn report(&self, source: &str, filename: &str) -> String {
        match self {
            RenderError::Syntax { origin: None, errors } => format_reports(errors, source, filename),
            RenderError::Syntax {
                origin: Some(path),
                errors,
            } => match fs::read_to_string(path) {
                Ok(included) => format_reports(errors, &included, path),
                Err(_) => self.to_string(),
            },
            other => other.to_string(),
        }
    }
}

fn format_reports(errors: &[ParseError], source: &str, filename: &str) -> String {
    errors
        .iter()
        .map(|e| e.format(source, filename))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_syntax(origin: Option<&str>, errors: &[ParseError]) -> String {
    let messages = errors
        .iter()
        .map(|e| e.message().to_string())
        .collect::<Vec<_>>()
        .join("; ");
    match origin {
        Some(path) => format!("syntax error in included file '{}': {}", path, messages),
        None => format!("syntax error: {}", messages),
    }
}

fn format_paths(paths: &[std::path::PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A render failure attributed to a template field
#[derive(Debug, Clone, PartialEq, Error)]
#[error("template '{template}', field '{field}': {source}")]
pub struct FieldRenderError {
    pub template: String,
    /// Field path such as `pre_commands[1]` or `write_files[0].content`
    pub field: String,
    pub source: RenderError,
}

/// Render template text with default configuration
///
/// # Example
///
/// ```rust
/// use session_templates::renderer::{render, Variables};
///
/// let vars = Variables::new().with("x", "").with("y", "hello");
/// let text = render(r#"{% if x nonempty %} --flag={x}{% endif %} "{y}""#, &vars).unwrap();
/// assert_eq!(text, r#""hello""#);
/// ```
pub fn render(source: &str, vars: &Variables) -> Result<String, RenderError> {
    render_with_config(source, vars, &RenderConfig::default()).map(|r| r.text)
}

/// Render template text, reporting which placeholders it used
pub fn render_with_config(
    source: &str,
    vars: &Variables,
    config: &RenderConfig,
) -> Result<Rendered, RenderError> {
    render_source(source, vars, config, true)
}

/// Render template text, emitting `{file:...}` includes verbatim
pub fn render_without_includes(source: &str, vars: &Variables) -> Result<Rendered, RenderError> {
    render_source(source, vars, &RenderConfig::default(), false)
}

/// Render a shell script template, quoting every substituted value
///
/// Includes are emitted verbatim. Blank values still render empty so
/// conditionals and spacing behave as in [`render`].
pub fn render_shell_command(source: &str, vars: &Variables) -> Result<Rendered, RenderError> {
    let template = parse(source).map_err(|errors| RenderError::Syntax {
        origin: None,
        errors,
    })?;
    Interpreter::new(&RenderConfig::default(), vars, false)
        .quoting_values()
        .run(&template, None)
}

/// Render template text, optionally expanding includes
pub fn render_source(
    source: &str,
    vars: &Variables,
    config: &RenderConfig,
    expand_includes: bool,
) -> Result<Rendered, RenderError> {
    let template = parse(source).map_err(|errors| RenderError::Syntax {
        origin: None,
        errors,
    })?;
    Interpreter::new(config, vars, expand_includes).run(&template, None)
}

/// Render a template file; its own directory is searched last for includes
pub fn render_file(
    path: &Path,
    vars: &Variables,
    config: &RenderConfig,
) -> Result<Rendered, RenderError> {
    let source = fs::read_to_string(path).map_err(|e| RenderError::IncludeRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let template = parse(&source).map_err(|errors| RenderError::Syntax {
        origin: Some(path.display().to_string()),
        errors,
    })?;
    Interpreter::new(config, vars, true).run(&template, Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_zero() {
        let vars = Variables::new().with("n", 0i64);
        assert_eq!(render("{n}", &vars).unwrap(), "0");
    }

    #[test]
    fn test_eq_condition() {
        let vars = Variables::new().with("mode", "fast").with("on", true);
        let source = r#"{% if mode eq "slow" %}S{% elif mode eq "fast" %}F{% endif %}{% if on eq "true" %}!{% endif %}"#;
        assert_eq!(render(source, &vars).unwrap(), "F!");
    }

    #[test]
    fn test_syntax_error_message() {
        let err = render("{% if a nonempty %}x", &Variables::new()).expect_err("Should fail");
        assert!(matches!(err, RenderError::Syntax { origin: None, .. }));
        assert!(err.to_string().contains("unterminated conditional"));
        assert!(err.report("{% if a nonempty %}x", "command").contains("command"));
    }

    #[test]
    fn test_missing_include_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::new().with_root_dir(dir.path());
        let err = render_with_config("{file:nope.txt}", &Variables::new(), &config)
            .expect_err("Should fail");
        match err {
            RenderError::IncludeNotFound { path, searched } => {
                assert_eq!(path, "nope.txt");
                assert_eq!(searched, vec![dir.path().join("nope.txt")]);
            }
            other => panic!("Expected IncludeNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_shell_command_quotes_values() {
        let vars = Variables::new()
            .with("plain", "acme")
            .with("evil", "a; echo $(id)")
            .with("blank", "");
        let rendered = render_shell_command(
            "list {plain} {evil}{% if blank nonempty %} --b {blank}{% endif %} {file:x}",
            &vars,
        )
        .unwrap();
        assert_eq!(rendered.text, "list acme 'a; echo $(id)' {file:x}");
    }

    #[test]
    fn test_field_error_display() {
        let err = FieldRenderError {
            template: "shell".into(),
            field: "pre_commands[1]".into(),
            source: RenderError::CircularInclude {
                chain: "a -> b -> a".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "template 'shell', field 'pre_commands[1]': circular include: a -> b -> a"
        );
    }
}
