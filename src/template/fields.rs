//! Field descriptor table
//!
//! Every template field has a kind, and the kind decides how values from the
//! inheritance chain combine. Fields not listed here are scalars.

/// How a list field combines with what it inherits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Drop the inherited list and use this node's list (an empty list clears)
    #[default]
    Replace,
    /// Append this node's list to the inherited one
    Concatenate,
}

impl MergeMode {
    /// Map a `merge_*` flag value to a mode
    pub fn from_flag(concatenate: bool) -> Self {
        if concatenate {
            Self::Concatenate
        } else {
            Self::Replace
        }
    }
}

/// The merge behavior of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Rightmost declaration wins
    Scalar,
    /// Ordered list governed by a sibling merge flag
    List { flag: &'static str },
    /// Ordered list deduplicated by `key`, always merged
    KeyedList { key: &'static str },
    /// Shallow key overlay, always merged
    Map,
    /// Nested fragment composed after primary resolution
    Overlay,
}

/// A named field and its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn list(name: &'static str, flag: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::List { flag },
        }
    }

    const fn keyed(name: &'static str, key: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::KeyedList { key },
        }
    }

    const fn map(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Map,
        }
    }

    const fn overlay(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Overlay,
        }
    }
}

/// Fields with non-scalar merge behavior
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::list("pre_commands", "merge_pre_commands"),
    FieldSpec::list("post_commands", "merge_post_commands"),
    FieldSpec::list("fork_pre_commands", "merge_fork_pre_commands"),
    FieldSpec::list("fork_post_commands", "merge_fork_post_commands"),
    FieldSpec::list("write_files", "merge_write_files"),
    FieldSpec::list("expand_file_includes", "merge_expand_file_includes"),
    FieldSpec::list("bind_mounts", "merge_bind_mounts"),
    FieldSpec::keyed("parameters", "name"),
    FieldSpec::keyed("links", "name"),
    FieldSpec::map("env_vars"),
    FieldSpec::overlay("sandbox_overrides"),
];

/// Look up the kind of a field by name
pub fn kind_of(name: &str) -> FieldKind {
    FIELDS
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.kind)
        .unwrap_or(FieldKind::Scalar)
}

/// Check if a field name is the merge flag of some list field
pub fn is_merge_flag(name: &str) -> bool {
    FIELDS
        .iter()
        .any(|spec| matches!(spec.kind, FieldKind::List { flag } if flag == name))
}
