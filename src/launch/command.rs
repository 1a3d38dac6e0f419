//! Command chain assembly

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::renderer::{render_with_config, FieldRenderError, RenderConfig, Variables};
use crate::template::ResolvedTemplate;

/// How chained steps react to a failing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPolicy {
    /// Stop at the first failing step (`&&`)
    #[default]
    FailFast,
    /// Run every step regardless (`;`)
    Tolerant,
}

impl ChainPolicy {
    pub fn separator(self) -> &'static str {
        match self {
            ChainPolicy::FailFast => " && ",
            ChainPolicy::Tolerant => "; ",
        }
    }
}

/// The unrendered steps a launch runs, with the field each came from
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSteps<'a> {
    /// `(field path, template)` in execution order: pre, command, post
    pub steps: Vec<(String, &'a str)>,
}

/// Pick the command fields for a fresh launch or a fork
///
/// When forking, each `fork_*` field that is present replaces its regular
/// counterpart on its own.
pub fn assemble(template: &ResolvedTemplate, fork: bool) -> CommandSteps<'_> {
    let (pre_field, pre) = match (&template.fork_pre_commands, fork) {
        (Some(fork_pre), true) => ("fork_pre_commands", fork_pre),
        _ => ("pre_commands", &template.pre_commands),
    };
    let (command_field, command) = match (&template.fork_command, fork) {
        (Some(fork_command), true) => ("fork_command", Some(fork_command)),
        _ => ("command", template.command.as_ref()),
    };
    let (post_field, post) = match (&template.fork_post_commands, fork) {
        (Some(fork_post), true) => ("fork_post_commands", fork_post),
        _ => ("post_commands", &template.post_commands),
    };

    let mut steps = Vec::new();
    steps.extend(
        pre.iter()
            .enumerate()
            .map(|(i, step)| (format!("{}[{}]", pre_field, i), step.as_str())),
    );
    if let Some(command) = command {
        steps.push((command_field.to_string(), command.as_str()));
    }
    steps.extend(
        post.iter()
            .enumerate()
            .map(|(i, step)| (format!("{}[{}]", post_field, i), step.as_str())),
    );
    CommandSteps { steps }
}

/// Rendered steps joined under a policy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CommandChain {
    pub steps: Vec<String>,
    pub policy: ChainPolicy,
}

impl CommandChain {
    /// The single shell command line
    pub fn join(&self) -> String {
        self.steps.join(self.policy.separator())
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for CommandChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}

/// Render the launch command; steps that render empty are dropped
pub fn render_chain(
    template: &ResolvedTemplate,
    fork: bool,
    vars: &Variables,
    config: &RenderConfig,
    policy: ChainPolicy,
) -> Result<CommandChain, FieldRenderError> {
    let mut steps = Vec::new();
    for (field, source) in assemble(template, fork).steps {
        let rendered = render_with_config(source, vars, config).map_err(|e| FieldRenderError {
            template: template.id.clone(),
            field,
            source: e,
        })?;
        let text = rendered.text.trim();
        if !text.is_empty() {
            steps.push(text.to_string());
        }
    }
    Ok(CommandChain { steps, policy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template() -> ResolvedTemplate {
        ResolvedTemplate {
            id: "shell".into(),
            command: Some("bash -l".into()),
            fork_command: Some("bash -l --resume {session_id}".into()),
            pre_commands: vec!["cd {dir}".into(), "{% if venv nonempty %}source {venv}{% endif %}".into()],
            post_commands: vec!["echo done".into()],
            fork_pre_commands: Some(vec![]),
            ..Default::default()
        }
    }

    #[test]
    fn test_assemble_order_and_fields() {
        let t = template();
        let fields: Vec<String> = assemble(&t, false).steps.into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec!["pre_commands[0]", "pre_commands[1]", "command", "post_commands[0]"]
        );
    }

    #[test]
    fn test_fork_fields_replace_independently() {
        let t = template();
        let steps = assemble(&t, true).steps;
        assert_eq!(
            steps,
            vec![
                ("fork_command".to_string(), "bash -l --resume {session_id}"),
                ("post_commands[0]".to_string(), "echo done"),
            ]
        );
    }

    #[test]
    fn test_render_drops_empty_steps() {
        let vars = Variables::new().with("dir", "/work");
        let chain =
            render_chain(&template(), false, &vars, &RenderConfig::default(), ChainPolicy::FailFast)
                .unwrap();
        assert_eq!(chain.join(), "cd /work && bash -l && echo done");
    }

    #[test]
    fn test_tolerant_policy() {
        let vars = Variables::new().with("dir", "/w").with("venv", ".venv/bin/activate");
        let chain =
            render_chain(&template(), false, &vars, &RenderConfig::default(), ChainPolicy::Tolerant)
                .unwrap();
        assert_eq!(
            chain.to_string(),
            "cd /w; source .venv/bin/activate; bash -l; echo done"
        );
    }

    #[test]
    fn test_render_error_names_field() {
        let mut t = template();
        t.post_commands.push("{% if x nonempty %}".into());
        let err = render_chain(&t, false, &Variables::new(), &RenderConfig::default(), ChainPolicy::FailFast)
            .expect_err("Should fail");
        assert_eq!(err.template, "shell");
        assert_eq!(err.field, "post_commands[1]");
    }
}
