//! Template system for composable session launch definitions
//!
//! Templates inherit from any number of parents through `extends`. Resolution
//! linearizes the ancestor graph and merges each field according to its kind:
//! scalars take the rightmost value, list fields replace or concatenate per
//! their `merge_*` flag, keyed lists merge by key, and maps overlay.
//!
//! # Example
//!
//! ```text
//! [templates.base]
//! command = "bash -l"
//! pre_commands = ["echo preA"]
//!
//! [templates.child]
//! extends = ["base"]
//! merge_pre_commands = true
//! pre_commands = ["echo preB"]     # resolves to ["echo preA", "echo preB"]
//! ```

mod cache;
mod definition;
mod fields;
mod graph;
mod merge;
mod registry;
mod resolved;
mod resolver;

pub use cache::{CacheStamp, ResolutionCache, TemplateResolver};
pub use definition::TemplateDefinition;
pub use fields::{is_merge_flag, kind_of, FieldKind, FieldSpec, MergeMode, FIELDS};
pub use graph::linearize;
pub use merge::{apply_list, merge_by_key, rightmost_wins};
pub use registry::{TemplateError, TemplateRegistry, TemplateStore};
pub use resolved::{
    BindMount, Link, OptionsSource, OverlayBlock, Parameter, ParameterKind, ResolvedTemplate,
    WriteFile,
};
pub use resolver::resolve_template;
