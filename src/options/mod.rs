//! Selectable values for template parameters
//!
//! A parameter lists its choices statically (`options`) or names a source:
//! the viewer's configured values (`user`), the enabled forges (`forges`), or
//! a command registered on the active forge (`forge`). Lookups never fail
//! outright; a failing source yields no options plus the error.

mod directory;
mod forge;
mod runner;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub use directory::{GroupEntry, OptionValues, UserDirectory, UserEntry};
pub use forge::{active_forge, ForgeConfig, FORGE_VARIABLE};
pub use runner::{CommandRunner, ShellCommand, ShellRunner};

use crate::renderer::{render_shell_command, RenderError, Variables};
use crate::template::{OptionsSource, TemplateError, TemplateResolver, TemplateStore};

/// Default limit on how long a forge command may run
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for option lookups
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Forge command timeout in milliseconds
    pub command_timeout_ms: u64,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT.as_millis() as u64,
        }
    }
}

impl OptionsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Why an option lookup came back empty
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("template '{template}' has no parameter '{parameter}'")]
    UnknownParameter { template: String, parameter: String },

    #[error("parameter '{parameter}' of template '{template}' uses forge options without options_forge_key")]
    MissingForgeKey { template: String, parameter: String },

    #[error("no enabled forge is configured")]
    NoForge,

    #[error("forge '{forge}' has no command '{key}'")]
    MissingCommand { forge: String, key: String },

    #[error("forge '{forge}' command '{key}' does not render: {source}")]
    Render {
        forge: String,
        key: String,
        source: RenderError,
    },

    #[error("failed to run '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error("'{command}' exited with status {}: {stderr}", format_code(*code))]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{command}' timed out after {after:?}")]
    Timeout { command: String, after: Duration },
}

fn format_code(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Options for a parameter, or none and the reason
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionsOutcome {
    pub options: Vec<String>,
    pub error: Option<OptionsError>,
}

impl OptionsOutcome {
    pub fn ok(options: Vec<String>) -> Self {
        Self {
            options,
            error: None,
        }
    }

    pub fn failed(error: OptionsError) -> Self {
        Self {
            options: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether the lookup failed and fell back to no options
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Answers option lookups for template parameters
pub struct ParameterOptionsResolver<R = ShellRunner> {
    forges: Vec<ForgeConfig>,
    directory: UserDirectory,
    config: OptionsConfig,
    runner: R,
}

impl ParameterOptionsResolver<ShellRunner> {
    pub fn new(forges: Vec<ForgeConfig>, directory: UserDirectory, config: OptionsConfig) -> Self {
        Self::with_runner(forges, directory, config, ShellRunner)
    }
}

impl<R: CommandRunner> ParameterOptionsResolver<R> {
    pub fn with_runner(
        forges: Vec<ForgeConfig>,
        directory: UserDirectory,
        config: OptionsConfig,
        runner: R,
    ) -> Self {
        Self {
            forges,
            directory,
            config,
            runner,
        }
    }

    pub fn forges(&self) -> &[ForgeConfig] {
        &self.forges
    }

    /// Names of the enabled forges
    pub fn forge_names(&self) -> Vec<String> {
        self.forges
            .iter()
            .filter(|f| f.enabled)
            .map(|f| f.name.clone())
            .collect()
    }

    /// Options for `parameter` of template `id`
    ///
    /// `viewer` is the user asking; without one, user-sourced options are empty.
    pub async fn options_for<S: TemplateStore>(
        &self,
        templates: &TemplateResolver<S>,
        id: &str,
        parameter: &str,
        vars: &Variables,
        viewer: Option<&str>,
    ) -> OptionsOutcome {
        match self.lookup(templates, id, parameter, vars, viewer).await {
            Ok(options) => {
                debug!(template = id, parameter, count = options.len(), "resolved options");
                OptionsOutcome::ok(options)
            }
            Err(e) => {
                warn!(template = id, parameter, error = %e, "option lookup failed");
                OptionsOutcome::failed(e)
            }
        }
    }

    async fn lookup<S: TemplateStore>(
        &self,
        templates: &TemplateResolver<S>,
        id: &str,
        parameter: &str,
        vars: &Variables,
        viewer: Option<&str>,
    ) -> Result<Vec<String>, OptionsError> {
        let template = templates.resolve(id)?;
        let param = template
            .parameter(parameter)
            .ok_or_else(|| OptionsError::UnknownParameter {
                template: id.to_string(),
                parameter: parameter.to_string(),
            })?;

        match (param.options_source, &param.options) {
            (Some(OptionsSource::User), _) => Ok(viewer
                .map(|v| self.directory.options_for(v, parameter))
                .unwrap_or_default()),
            (Some(OptionsSource::Forges), _) => Ok(self.forge_names()),
            (Some(OptionsSource::Forge), _) => {
                let key = param
                    .options_forge_key
                    .as_deref()
                    .ok_or_else(|| OptionsError::MissingForgeKey {
                        template: id.to_string(),
                        parameter: parameter.to_string(),
                    })?;
                self.forge_options(key, vars).await
            }
            (None, Some(options)) => Ok(options.clone()),
            (None, None) => Ok(Vec::new()),
        }
    }

    /// Run command `key` on the active forge, one option per non-empty line
    ///
    /// Variable values are shell-quoted into the script, so they reach the
    /// command as single words.
    pub async fn forge_options(&self, key: &str, vars: &Variables) -> Result<Vec<String>, OptionsError> {
        let forge = active_forge(&self.forges, vars).ok_or(OptionsError::NoForge)?;
        let source = forge
            .commands
            .get(key)
            .ok_or_else(|| OptionsError::MissingCommand {
                forge: forge.name.clone(),
                key: key.to_string(),
            })?;
        let script = render_shell_command(source, vars)
            .map_err(|e| OptionsError::Render {
                forge: forge.name.clone(),
                key: key.to_string(),
                source: e,
            })?
            .text;

        let command = ShellCommand {
            script,
            env: forge.command_env(),
            timeout: self.config.command_timeout(),
        };
        let stdout = self.runner.run(&command).await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
