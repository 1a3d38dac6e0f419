//! Configured forges (remote source-control integrations)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::renderer::Variables;

/// Variable that names the forge a session works against
pub const FORGE_VARIABLE: &str = "forge";

/// One remote source-control integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeConfig {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Used when no `forge` variable picks another one
    #[serde(default)]
    pub default: bool,
    /// SSH key handed to forge commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    /// Extra environment for forge commands
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Named shell commands (templates) that list values, one per line
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl ForgeConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            default: false,
            identity_file: None,
            env: BTreeMap::new(),
            commands: BTreeMap::new(),
        }
    }

    pub fn with_command(mut self, key: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.insert(key.into(), command.into());
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<String>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Environment injected into this forge's commands
    pub fn command_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("FORGE_NAME".to_string(), self.name.clone());
        env.insert("FORGE_URL".to_string(), self.url.clone());
        if let Some(identity) = &self.identity_file {
            env.insert("FORGE_IDENTITY_FILE".to_string(), identity.clone());
            env.insert(
                "GIT_SSH_COMMAND".to_string(),
                format!("ssh -i {} -o IdentitiesOnly=yes", identity),
            );
        }
        for (key, value) in &self.env {
            env.insert(key.clone(), value.clone());
        }
        env
    }
}

/// Pick the forge a lookup runs against
///
/// The `forge` variable wins when it names an enabled forge; otherwise the
/// enabled forge marked `default`, otherwise the first enabled one.
pub fn active_forge<'a>(forges: &'a [ForgeConfig], vars: &Variables) -> Option<&'a ForgeConfig> {
    let enabled = || forges.iter().filter(|f| f.enabled);
    let requested = vars.get(FORGE_VARIABLE).map(|v| v.as_text());

    requested
        .and_then(|name| enabled().find(|f| f.name == name))
        .or_else(|| enabled().find(|f| f.default))
        .or_else(|| enabled().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forges() -> Vec<ForgeConfig> {
        vec![
            ForgeConfig::new("gitea", "https://gitea.local").disabled(),
            ForgeConfig::new("github", "https://github.com"),
            ForgeConfig::new("gitlab", "https://gitlab.com").as_default(),
        ]
    }

    #[test]
    fn test_variable_selects_forge() {
        let vars = Variables::new().with("forge", "github");
        assert_eq!(active_forge(&forges(), &vars).unwrap().name, "github");
    }

    #[test]
    fn test_disabled_forge_is_never_selected() {
        let vars = Variables::new().with("forge", "gitea");
        assert_eq!(active_forge(&forges(), &vars).unwrap().name, "gitlab");
    }

    #[test]
    fn test_first_enabled_without_default() {
        let list = vec![
            ForgeConfig::new("a", "").disabled(),
            ForgeConfig::new("b", ""),
            ForgeConfig::new("c", ""),
        ];
        assert_eq!(active_forge(&list, &Variables::new()).unwrap().name, "b");
        assert!(active_forge(&[], &Variables::new()).is_none());
    }

    #[test]
    fn test_command_env() {
        let forge = ForgeConfig::new("github", "https://github.com")
            .with_identity_file("/keys/id")
            .with_env("GH_HOST", "github.com");
        let env = forge.command_env();
        assert_eq!(env["FORGE_NAME"], "github");
        assert_eq!(env["FORGE_IDENTITY_FILE"], "/keys/id");
        assert_eq!(env["GIT_SSH_COMMAND"], "ssh -i /keys/id -o IdentitiesOnly=yes");
        assert_eq!(env["GH_HOST"], "github.com");
    }

    #[test]
    fn test_deserialize_defaults() {
        let forge: ForgeConfig = toml::from_str("name = \"x\"").unwrap();
        assert!(forge.enabled);
        assert!(!forge.default);
        assert!(forge.commands.is_empty());
    }
}
