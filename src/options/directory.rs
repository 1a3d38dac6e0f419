//! Per-user and per-group option values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Values one user or group may pick, by parameter name
pub type OptionValues = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub options: OptionValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub options: OptionValues,
}

/// Users, the groups they belong to, and the values each may pick
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserDirectory {
    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupEntry>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: impl Into<String>, entry: UserEntry) -> Self {
        self.users.insert(name.into(), entry);
        self
    }

    pub fn with_group(mut self, name: impl Into<String>, entry: GroupEntry) -> Self {
        self.groups.insert(name.into(), entry);
        self
    }

    /// The viewer's own values followed by those of each of their groups
    ///
    /// De-duplicated in first-seen order. An unknown viewer has no values.
    pub fn options_for(&self, viewer: &str, parameter: &str) -> Vec<String> {
        let Some(user) = self.users.get(viewer) else {
            return Vec::new();
        };

        let group_values = user
            .groups
            .iter()
            .filter_map(|group| self.groups.get(group))
            .filter_map(|group| group.options.get(parameter));

        let mut values: Vec<String> = Vec::new();
        for value in user.options.get(parameter).into_iter().chain(group_values).flatten() {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        values
    }
}
