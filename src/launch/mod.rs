//! Launch plans: a resolved template rendered for one session
//!
//! [`prepare_launch`] turns a [`ResolvedTemplate`] and a [`LaunchRequest`] into
//! everything the external launcher needs: the joined command line, files to
//! write, bind mounts that exist on the host, and the session's links.

mod command;
mod links;
mod mounts;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

pub use command::{assemble, render_chain, ChainPolicy, CommandChain, CommandSteps};
pub use links::{resolve_links, RenderedLink};
pub use mounts::{filter_bind_mounts, FileProbe, LocalFileProbe};

use crate::renderer::{
    render_source, render_with_config, FieldRenderError, RenderConfig, Value, Variables,
};
use crate::template::{BindMount, ResolvedTemplate, WriteFile};

/// Target pattern that turns include expansion on for every written file
const EXPAND_ALL: &str = "*";

/// Per-session inputs to a launch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchRequest {
    pub session_id: String,
    /// Values for declared parameters
    pub parameters: Variables,
    /// Extra variables injected by the caller; these win over parameters
    pub variables: Variables,
    /// Continue an existing session with the fork command set
    pub fork: bool,
    /// Apply `sandbox_overrides`
    pub sandboxed: bool,
    /// Whether the session is currently running, for link visibility
    pub session_active: bool,
    pub policy: ChainPolicy,
}

impl LaunchRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session_active: true,
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.set(name, value);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.set(name, value);
        self
    }

    pub fn forking(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn sandboxed(mut self, sandboxed: bool) -> Self {
        self.sandboxed = sandboxed;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.session_active = active;
        self
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Everything rendered for one launch
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LaunchPlan {
    pub template: String,
    /// The joined command line
    pub command: String,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub env_vars: BTreeMap<String, String>,
    pub write_files: Vec<WriteFile>,
    pub bind_mounts: Vec<BindMount>,
    pub links: Vec<RenderedLink>,
}

/// The variable environment for a launch
///
/// `session_id`, then every declared parameter (request value, else its
/// default), then the request's extra variables.
pub fn launch_variables(template: &ResolvedTemplate, request: &LaunchRequest) -> Variables {
    let mut vars = Variables::new().with("session_id", request.session_id.as_str());
    for parameter in &template.parameters {
        let value = request
            .parameters
            .get(&parameter.name)
            .or(parameter.default.as_ref())
            .cloned()
            .unwrap_or_default();
        vars.set(parameter.name.as_str(), value);
    }
    vars.extend(&request.variables);
    vars
}

/// Render a resolved template for one session
pub fn prepare_launch(
    template: &ResolvedTemplate,
    request: &LaunchRequest,
    config: &RenderConfig,
    probe: &dyn FileProbe,
) -> Result<LaunchPlan, FieldRenderError> {
    let effective;
    let template = if request.sandboxed {
        effective = template.with_sandbox_overrides();
        &effective
    } else {
        template
    };

    debug!(
        template = %template.id,
        session = %request.session_id,
        fork = request.fork,
        sandboxed = request.sandboxed,
        "preparing launch"
    );

    let vars = launch_variables(template, request);
    let field = |field: String| {
        move |source| FieldRenderError {
            template: template.id.clone(),
            field,
            source,
        }
    };
    let render_text = |name: String, text: &str| {
        render_with_config(text, &vars, config)
            .map(|r| r.text)
            .map_err(field(name))
    };

    let chain = render_chain(template, request.fork, &vars, config, request.policy)?;

    let working_directory = template
        .working_directory
        .as_deref()
        .map(|dir| render_text("working_directory".to_string(), dir))
        .transpose()?;

    let mut env_vars = BTreeMap::new();
    for (key, value) in &template.env_vars {
        env_vars.insert(key.clone(), render_text(format!("env_vars.{}", key), value)?);
    }

    let expand_all = template.expand_file_includes.iter().any(|t| t == EXPAND_ALL);
    let mut write_files = Vec::with_capacity(template.write_files.len());
    for (i, file) in template.write_files.iter().enumerate() {
        let target = render_source(&file.target, &vars, config, false)
            .map(|r| r.text)
            .map_err(field(format!("write_files[{}].target", i)))?;
        let expand = expand_all
            || template
                .expand_file_includes
                .iter()
                .any(|t| *t == file.target || *t == target);
        let content = render_source(&file.content, &vars, config, expand)
            .map(|r| r.text)
            .map_err(field(format!("write_files[{}].content", i)))?;
        write_files.push(WriteFile { target, content });
    }

    let mut bind_mounts = Vec::with_capacity(template.bind_mounts.len());
    for (i, mount) in template.bind_mounts.iter().enumerate() {
        let host = render_text(format!("bind_mounts[{}].host", i), &mount.host)?;
        let container = mount
            .container
            .as_deref()
            .map(|c| render_text(format!("bind_mounts[{}].container", i), c))
            .transpose()?;
        bind_mounts.push(BindMount {
            host,
            container,
            read_only: mount.read_only,
        });
    }
    let bind_mounts = filter_bind_mounts(bind_mounts, probe);

    Ok(LaunchPlan {
        template: template.id.clone(),
        command: chain.join(),
        steps: chain.steps,
        working_directory,
        image: template.image.clone(),
        env_vars,
        write_files,
        bind_mounts,
        links: resolve_links(&template.links, &vars, request.session_active),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Parameter;
    use pretty_assertions::assert_eq;

    fn parameter(name: &str, default: Option<&str>) -> Parameter {
        Parameter {
            name: name.to_string(),
            label: None,
            kind: Default::default(),
            default: default.map(Value::from),
            options: None,
            options_source: None,
            options_forge_key: None,
        }
    }

    #[test]
    fn test_variables_layering() {
        let template = ResolvedTemplate {
            id: "t".into(),
            parameters: vec![parameter("branch", Some("main")), parameter("task", None)],
            ..Default::default()
        };
        let request = LaunchRequest::new("s-1")
            .with_parameter("task", "fix")
            .with_variable("branch", "override");

        let vars = launch_variables(&template, &request);
        assert_eq!(vars.render("session_id"), "s-1");
        assert_eq!(vars.render("task"), "fix");
        assert_eq!(vars.render("branch"), "override");
    }

    #[test]
    fn test_missing_parameter_is_declared_but_blank() {
        let template = ResolvedTemplate {
            id: "t".into(),
            parameters: vec![parameter("task", None)],
            ..Default::default()
        };
        let vars = launch_variables(&template, &LaunchRequest::new("s"));
        assert!(vars.contains("task"));
        assert!(vars.is_blank("task"));
    }

    #[test]
    fn test_write_file_includes_only_for_listed_targets() {
        let template = ResolvedTemplate {
            id: "t".into(),
            write_files: vec![
                WriteFile {
                    target: "/a".into(),
                    content: "{file:/nonexistent/x} {session_id}".into(),
                },
            ],
            ..Default::default()
        };
        let plan = prepare_launch(
            &template,
            &LaunchRequest::new("s"),
            &RenderConfig::default(),
            &LocalFileProbe,
        )
        .unwrap();
        assert_eq!(plan.write_files[0].content, "{file:/nonexistent/x} s");

        let mut expanding = template.clone();
        expanding.expand_file_includes = vec!["/a".into()];
        let err = prepare_launch(
            &expanding,
            &LaunchRequest::new("s"),
            &RenderConfig::default(),
            &LocalFileProbe,
        )
        .expect_err("Include should be attempted");
        assert_eq!(err.field, "write_files[0].content");
    }

    #[test]
    fn test_env_and_working_directory_render() {
        let template = ResolvedTemplate {
            id: "t".into(),
            working_directory: Some("/work/{session_id}".into()),
            env_vars: [("SESSION".to_string(), "{session_id}".to_string())].into(),
            ..Default::default()
        };
        let plan = prepare_launch(
            &template,
            &LaunchRequest::new("abc"),
            &RenderConfig::default(),
            &LocalFileProbe,
        )
        .unwrap();
        assert_eq!(plan.working_directory.as_deref(), Some("/work/abc"));
        assert_eq!(plan.env_vars["SESSION"], "abc");
    }
}
