//! Abstract Syntax Tree types for the template language

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A condition in an `if` or `elif` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `{% if name nonempty %}`
    NonEmpty(String),
    /// `{% if name eq "literal" %}`
    Equals { name: String, literal: String },
}

impl Condition {
    /// The variable the condition reads
    pub fn variable(&self) -> &str {
        match self {
            Condition::NonEmpty(name) | Condition::Equals { name, .. } => name,
        }
    }
}

/// One `if`/`elif` arm
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Condition,
    pub body: Vec<Node>,
}

/// An `if ... endif` block
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// The `if` arm followed by any `elif` arms
    pub branches: Vec<Branch>,
    /// The `else` arm
    pub otherwise: Option<Vec<Node>>,
}

/// A piece of an include path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Literal(String),
    Var(String),
}

/// A `{file:...}` include
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: Vec<PathPart>,
    /// Source text of the whole construct, emitted as-is when includes are off
    pub raw: String,
}

/// Template AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Text copied to the output
    Literal(String),
    /// `{name}`
    Var(String),
    Conditional(Conditional),
    Include(Include),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

impl Template {
    /// Names of every `{name}` reference, in order of appearance, across all branches
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_placeholders(&self.nodes, &mut names);
        names
    }

    /// Check if the template has no constructs at all
    pub fn is_plain(&self) -> bool {
        self.nodes.iter().all(|n| matches!(n, Node::Literal(_)))
    }
}

fn collect_placeholders<'a>(nodes: &'a [Node], names: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            Node::Literal(_) => {}
            Node::Var(name) => names.push(name),
            Node::Conditional(cond) => {
                for branch in &cond.branches {
                    collect_placeholders(&branch.body, names);
                }
                if let Some(otherwise) = &cond.otherwise {
                    collect_placeholders(otherwise, names);
                }
            }
            Node::Include(include) => {
                for part in &include.path {
                    if let PathPart::Var(name) = part {
                        names.push(name);
                    }
                }
            }
        }
    }
}

/// Join adjacent literals so each literal run is a single node
pub fn coalesce(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Node::Literal(text) = &node {
            if let Some(Node::Literal(prev)) = out.last_mut() {
                prev.push_str(text);
                continue;
            }
        }
        out.push(node);
    }
    out
}
