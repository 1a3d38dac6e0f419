//! Template interpreter
//!
//! A single pass over the AST. Conditionals render into a scratch buffer so an
//! empty block can tidy the spacing around it, and includes are parsed and
//! rendered recursively against the same variables.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::parser::{parse, Condition, Conditional, Include, Node, Template};
use crate::renderer::config::RenderConfig;
use crate::renderer::include::{expand_path, locate};
use crate::renderer::value::Variables;
use crate::renderer::RenderError;

/// Output of a render along with what it referenced
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    pub text: String,
    /// Every `{name}` rendered, in order, without duplicates
    pub placeholders: Vec<String>,
    /// The subset of `placeholders` whose value was missing or blank
    pub unresolved: Vec<String>,
}

impl Rendered {
    /// Whether every rendered placeholder had a value
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

pub(crate) struct Interpreter<'a> {
    config: &'a RenderConfig,
    vars: &'a Variables,
    expand_includes: bool,
    /// Shell-quote substituted values
    quote_values: bool,
    /// Files currently being rendered, outermost first
    include_stack: Vec<PathBuf>,
    placeholders: Vec<String>,
    unresolved: Vec<String>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(config: &'a RenderConfig, vars: &'a Variables, expand_includes: bool) -> Self {
        Self {
            config,
            vars,
            expand_includes,
            quote_values: false,
            include_stack: Vec::new(),
            placeholders: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Quote every non-empty substituted value for `sh`
    pub(crate) fn quoting_values(mut self) -> Self {
        self.quote_values = true;
        self
    }

    /// Render a parsed template
    ///
    /// `origin` is the file the template came from, used as the last base
    /// directory for relative includes.
    pub(crate) fn run(
        mut self,
        template: &Template,
        origin: Option<&Path>,
    ) -> Result<Rendered, RenderError> {
        if let Some(path) = origin {
            self.include_stack.push(path.to_path_buf());
        }
        let dir = origin.and_then(Path::parent);

        let mut text = String::new();
        self.render_nodes(&template.nodes, &mut text, None, dir, true)?;

        Ok(Rendered {
            text,
            placeholders: self.placeholders,
            unresolved: self.unresolved,
        })
    }

    /// Render `nodes` onto `out`
    ///
    /// `before` is the last character emitted ahead of `out` by an enclosing
    /// conditional, so spacing decisions inside a branch see the real output.
    fn render_nodes(
        &mut self,
        nodes: &[Node],
        out: &mut String,
        before: Option<char>,
        dir: Option<&Path>,
        top_level: bool,
    ) -> Result<(), RenderError> {
        // Set after an empty conditional: drop one leading space of the next literal
        let mut trim_next = false;

        for (index, node) in nodes.iter().enumerate() {
            match node {
                Node::Literal(text) => {
                    let text = match text.strip_prefix(' ') {
                        Some(rest) if trim_next => rest,
                        _ => text.as_str(),
                    };
                    out.push_str(text);
                    trim_next = false;
                }
                Node::Var(name) => {
                    self.record(name);
                    let value = self.vars.render(name);
                    if self.quote_values && !value.is_empty() {
                        out.push_str(&shell_escape::unix::escape(Cow::from(value)));
                    } else {
                        out.push_str(&value);
                    }
                    trim_next = false;
                }
                Node::Conditional(cond) => {
                    let mut body = String::new();
                    let last = out.chars().last().or(before);
                    self.render_conditional(cond, &mut body, last, dir)?;
                    if body.is_empty() {
                        let at_end = top_level && index + 1 == nodes.len();
                        if at_end && out.ends_with(' ') {
                            out.pop();
                        }
                        trim_next = matches!(out.chars().last().or(before), None | Some(' '));
                    } else {
                        out.push_str(&body);
                        trim_next = false;
                    }
                }
                Node::Include(include) => {
                    self.render_include(include, out, before, dir)?;
                    trim_next = false;
                }
            }
        }
        Ok(())
    }

    fn render_conditional(
        &mut self,
        cond: &Conditional,
        out: &mut String,
        before: Option<char>,
        dir: Option<&Path>,
    ) -> Result<(), RenderError> {
        for branch in &cond.branches {
            if self.holds(&branch.condition) {
                return self.render_nodes(&branch.body, out, before, dir, false);
            }
        }
        match &cond.otherwise {
            Some(body) => self.render_nodes(body, out, before, dir, false),
            None => Ok(()),
        }
    }

    fn holds(&self, condition: &Condition) -> bool {
        match condition {
            Condition::NonEmpty(name) => !self.vars.is_blank(name),
            Condition::Equals { name, literal } => self
                .vars
                .get(name)
                .map(|v| v.as_text())
                .unwrap_or_default()
                == *literal,
        }
    }

    fn render_include(
        &mut self,
        include: &Include,
        out: &mut String,
        before: Option<char>,
        dir: Option<&Path>,
    ) -> Result<(), RenderError> {
        if !self.expand_includes {
            out.push_str(&include.raw);
            return Ok(());
        }

        let requested = expand_path(&include.path, self.vars);
        let path = locate(&requested, self.config, dir).map_err(|searched| {
            RenderError::IncludeNotFound {
                path: requested.clone(),
                searched,
            }
        })?;

        if self.include_stack.contains(&path) {
            let mut chain: Vec<String> = self
                .include_stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(path.display().to_string());
            return Err(RenderError::CircularInclude {
                chain: chain.join(" -> "),
            });
        }
        if self.include_stack.len() >= self.config.max_include_depth {
            return Err(RenderError::IncludeDepth {
                path: path.display().to_string(),
                limit: self.config.max_include_depth,
            });
        }

        debug!(path = %path.display(), depth = self.include_stack.len(), "including file");
        let source = fs::read_to_string(&path).map_err(|e| RenderError::IncludeRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let template = parse(&source).map_err(|errors| RenderError::Syntax {
            origin: Some(path.display().to_string()),
            errors,
        })?;

        self.include_stack.push(path.clone());
        let included_dir = path.parent().map(Path::to_path_buf);
        let result =
            self.render_nodes(&template.nodes, out, before, included_dir.as_deref(), false);
        self.include_stack.pop();
        result
    }

    fn record(&mut self, name: &str) {
        if !self.placeholders.iter().any(|p| p == name) {
            self.placeholders.push(name.to_string());
        }
        if !self.vars.is_resolved(name) && !self.unresolved.iter().any(|p| p == name) {
            trace!(name, "unresolved placeholder");
            self.unresolved.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, vars: &Variables) -> Rendered {
        let template = parse(source).expect("Should parse");
        Interpreter::new(&RenderConfig::default(), vars, true)
            .run(&template, None)
            .expect("Should render")
    }

    #[test]
    fn test_empty_conditional_collapses_leading_space() {
        let vars = Variables::new().with("x", "").with("y", "hello");
        let rendered = run(r#"{% if x nonempty %} --flag={x}{% endif %} "{y}""#, &vars);
        assert_eq!(rendered.text, r#""hello""#);
    }

    #[test]
    fn test_empty_conditional_between_words() {
        let vars = Variables::new();
        let rendered = run("run {% if v nonempty %}--v={v} {% endif %}now", &vars);
        assert_eq!(rendered.text, "run now");

        let rendered = run("run {% if v nonempty %}--v{% endif %} now", &vars);
        assert_eq!(rendered.text, "run now");
    }

    #[test]
    fn test_empty_conditional_at_end_drops_trailing_space() {
        let rendered = run("cmd {% if v nonempty %}--v={v}{% endif %}", &Variables::new());
        assert_eq!(rendered.text, "cmd");
    }

    #[test]
    fn test_nested_conditional_inside_taken_branch() {
        let vars = Variables::new().with("a", "1");
        let rendered = run(
            "{% if a nonempty %}[{% if b nonempty %}{b}{% else %}none{% endif %}]{% endif %}",
            &vars,
        );
        assert_eq!(rendered.text, "[none]");
    }

    #[test]
    fn test_nested_empty_conditional_keeps_word_spacing() {
        let vars = Variables::new().with("x", "1");
        let rendered = run(
            "a{% if x nonempty %}{% if y nonempty %}Y{% endif %} b{% endif %}",
            &vars,
        );
        assert_eq!(rendered.text, "a b");
    }

    #[test]
    fn test_nested_empty_conditional_after_space_still_tidies() {
        let vars = Variables::new().with("x", "1");
        let rendered = run(
            "a {% if x nonempty %}{% if y nonempty %}--y{% endif %} b{% endif %}",
            &vars,
        );
        assert_eq!(rendered.text, "a b");
    }

    #[test]
    fn test_records_placeholders_once() {
        let vars = Variables::new().with("a", "x");
        let rendered = run("{a}{b}{a}{b}", &vars);
        assert_eq!(rendered.placeholders, vec!["a", "b"]);
        assert_eq!(rendered.unresolved, vec!["b"]);
        assert!(!rendered.is_resolved());
    }

    #[test]
    fn test_untaken_branch_placeholders_not_recorded() {
        let rendered = run("{% if a nonempty %}{b}{% endif %}", &Variables::new());
        assert!(rendered.placeholders.is_empty());
    }

    #[test]
    fn test_includes_left_verbatim_when_disabled() {
        let template = parse("x {file:{BASE}/notes.md} y").unwrap();
        let rendered = Interpreter::new(&RenderConfig::default(), &Variables::new(), false)
            .run(&template, None)
            .unwrap();
        assert_eq!(rendered.text, "x {file:{BASE}/notes.md} y");
    }
}
