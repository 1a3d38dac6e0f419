//! Include path expansion and lookup

use std::path::{Path, PathBuf};

use crate::parser::PathPart;
use crate::renderer::config::RenderConfig;
use crate::renderer::value::Variables;

/// Expand an include path: `{name}` references first, then `$VAR` / `${VAR}`
///
/// Shell-style references look in `vars` first, then the process environment.
/// References found in neither are left as written.
pub fn expand_path(parts: &[PathPart], vars: &Variables) -> String {
    let mut macro_expanded = String::new();
    for part in parts {
        match part {
            PathPart::Literal(text) => macro_expanded.push_str(text),
            PathPart::Var(name) => macro_expanded.push_str(&vars.render(name)),
        }
    }

    expand_env(&macro_expanded, |name| {
        vars.get(name)
            .filter(|v| v.is_resolved())
            .map(|v| v.as_text())
            .or_else(|| std::env::var(name).ok())
    })
}

/// Replace `$NAME` and `${NAME}` using `lookup`
pub fn expand_env(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_identifier(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if is_identifier(&after[..end]) {
                (&after[..end], end)
            } else {
                ("", 0)
            }
        };

        let reference = &rest[pos..pos + 1 + consumed];
        match (consumed, lookup(name)) {
            (0, _) => out.push('$'),
            (_, Some(value)) => out.push_str(&value),
            (_, None) => out.push_str(reference),
        }
        rest = &rest[pos + 1 + consumed..];
    }

    out.push_str(rest);
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Find the file an include path refers to
///
/// Absolute paths are used as is. Relative paths are tried against each base
/// directory in order; the first existing file wins. On failure the list of
/// candidates that were tried is returned.
pub fn locate(
    path: &str,
    config: &RenderConfig,
    current_dir: Option<&Path>,
) -> Result<PathBuf, Vec<PathBuf>> {
    let requested = Path::new(path);
    let candidates: Vec<PathBuf> = if requested.is_absolute() {
        vec![requested.to_path_buf()]
    } else {
        let dirs = config.search_dirs(current_dir);
        if dirs.is_empty() {
            vec![requested.to_path_buf()]
        } else {
            dirs.iter().map(|dir| dir.join(requested)).collect()
        }
    };

    match candidates.iter().find(|candidate| candidate.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "ENV" => Some("prod".to_string()),
            "HOME_DIR" => Some("/home/me".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_env_forms() {
        assert_eq!(expand_env("$ENV/a", lookup), "prod/a");
        assert_eq!(expand_env("${HOME_DIR}/x", lookup), "/home/me/x");
        assert_eq!(expand_env("a${ENV}b", lookup), "aprodb");
    }

    #[test]
    fn test_unknown_references_are_kept() {
        assert_eq!(expand_env("$NOPE/${ALSO_NOPE}", lookup), "$NOPE/${ALSO_NOPE}");
        assert_eq!(expand_env("cost: $5 and $", lookup), "cost: $5 and $");
        assert_eq!(expand_env("${unterminated", lookup), "${unterminated");
    }

    #[test]
    fn test_expand_path_combines_macros_and_env() {
        let vars = Variables::new().with("BASE", "/srv").with("ENV", "staging");
        let parts = vec![
            PathPart::Var("BASE".into()),
            PathPart::Literal("/$ENV/file.txt".into()),
        ];
        assert_eq!(expand_path(&parts, &vars), "/srv/staging/file.txt");
    }

    #[test]
    fn test_locate_first_match_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("a.txt"), "first").unwrap();
        fs::write(second.path().join("a.txt"), "second").unwrap();
        fs::write(second.path().join("b.txt"), "only second").unwrap();

        let config = RenderConfig::new()
            .with_include_dir(first.path())
            .with_root_dir(second.path());

        assert_eq!(
            locate("a.txt", &config, None).unwrap(),
            first.path().join("a.txt")
        );
        assert_eq!(
            locate("b.txt", &config, None).unwrap(),
            second.path().join("b.txt")
        );
    }

    #[test]
    fn test_locate_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::new().with_root_dir(dir.path());
        let searched = locate("missing.txt", &config, None).expect_err("Should not find");
        assert_eq!(searched, vec![dir.path().join("missing.txt")]);
    }

    #[test]
    fn test_locate_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abs.txt");
        fs::write(&file, "x").unwrap();
        let path = file.to_string_lossy().into_owned();
        assert_eq!(locate(&path, &RenderConfig::new(), None).unwrap(), file);
    }
}
