//! Integration tests for the template language
//!
//! Covers variable rendering, conditionals with tidy spacing, and file
//! includes resolved from real directories.

use std::fs;
use std::path::Path;

use insta::assert_snapshot;
use session_templates::renderer::{render_file, render_source, render_without_includes};
use session_templates::{render, render_with_config, RenderConfig, RenderError, Variables};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_tidy_spacing_example() {
    let vars = Variables::new().with("x", "").with("y", "hello");
    let text = render(r#"{% if x nonempty %} --flag={x}{% endif %} "{y}""#, &vars).unwrap();
    assert_eq!(text, r#""hello""#);
}

#[test]
fn test_taken_conditional_keeps_spacing() {
    let vars = Variables::new().with("x", "on").with("y", "hello");
    let text = render(r#"{% if x nonempty %} --flag={x}{% endif %} "{y}""#, &vars).unwrap();
    assert_eq!(text, r#" --flag=on "hello""#);
}

#[test]
fn test_zero_renders_as_zero() {
    let vars = Variables::new().with("n", 0i64);
    assert_eq!(render("{n}", &vars).unwrap(), "0");
}

#[test]
fn test_blank_values_render_empty() {
    let vars = Variables::new()
        .with("flag", true)
        .with("space", "   ")
        .with("none", session_templates::Value::Null);
    assert_eq!(render("[{flag}][{space}][{none}][{missing}]", &vars).unwrap(), "[][][][]");
}

#[test]
fn test_agent_command_line() {
    let vars = Variables::new()
        .with("model", "large")
        .with("prompt", "")
        .with("resume", "abc123");
    let source = concat!(
        "agent {% if model nonempty %}--model {model} {% endif %}",
        "{% if prompt nonempty %}--prompt \"{prompt}\" {% endif %}",
        "{% if resume nonempty %}--resume {resume}{% else %}--new{% endif %}"
    );
    assert_snapshot!(render(source, &vars).unwrap(), @"agent --model large --resume abc123");
}

#[test]
fn test_eq_chain_selects_branch() {
    let source = r#"{% if tier eq "gold" %}8{% elif tier eq "silver" %}4{% else %}1{% endif %} cpus"#;
    let silver = Variables::new().with("tier", "silver");
    assert_eq!(render(source, &silver).unwrap(), "4 cpus");
    assert_eq!(render(source, &Variables::new()).unwrap(), "1 cpus");
}

#[test]
fn test_placeholders_and_unresolved() {
    let vars = Variables::new().with("a", "1").with("n", 0i64);
    let rendered =
        render_with_config("{a}/{b}/{n}/{c}", &vars, &RenderConfig::default()).unwrap();
    assert_eq!(rendered.text, "1//0/");
    assert_eq!(rendered.placeholders, vec!["a", "b", "n", "c"]);
    assert_eq!(rendered.unresolved, vec!["b", "c"]);
}

#[test]
fn test_unterminated_conditional_report() {
    let source = "echo {% if x nonempty %}hi";
    let err = render(source, &Variables::new()).unwrap_err();
    assert!(err.to_string().contains("unterminated conditional"));

    let report = err.report(source, "command");
    assert!(report.contains("unterminated conditional"));
    assert!(report.contains("command"));
}

#[test]
fn test_nested_include_with_macro_and_env_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "snippets/prod/banner.txt", "Welcome {user}! {file:footer.txt}");
    write(dir.path(), "snippets/prod/footer.txt", "(session {session_id})");

    let config = RenderConfig::new().with_root_dir(dir.path());
    let vars = Variables::new()
        .with("BASE", "snippets")
        .with("ENV", "prod")
        .with("user", "ada")
        .with("session_id", "s-42");

    let rendered = render_with_config("{file:{BASE}/$ENV/banner.txt}", &vars, &config).unwrap();
    assert_snapshot!(rendered.text, @"Welcome ada! (session s-42)");
}

#[test]
fn test_include_path_braced_shell_reference() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "prod/x.txt", "INCLUDED");

    let config = RenderConfig::new().with_root_dir(dir.path());
    let vars = Variables::new().with("STAGE", "prod");
    let braced = render_with_config("{file:${STAGE}/x.txt}", &vars, &config).unwrap();
    let bare = render_with_config("{file:$STAGE/x.txt}", &vars, &config).unwrap();
    assert_eq!(braced.text, "INCLUDED");
    assert_eq!(bare.text, "INCLUDED");
}

#[test]
fn test_include_path_braced_reference_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "x.txt", "FROM ENV");

    std::env::set_var("SESSION_TEMPLATES_TEST_DIR", dir.path());
    let rendered = render_with_config(
        "{file:${SESSION_TEMPLATES_TEST_DIR}/x.txt}",
        &Variables::new(),
        &RenderConfig::new(),
    )
    .unwrap();
    assert_eq!(rendered.text, "FROM ENV");
}

#[test]
fn test_braced_shell_reference_outside_include_is_literal() {
    let vars = Variables::new().with("HOME", "/ignored");
    let text = render("echo ${HOME} {HOME}", &vars).unwrap();
    assert_eq!(text, "echo ${HOME} /ignored");
}

#[test]
fn test_include_dirs_take_precedence_over_root() {
    let overrides = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    write(overrides.path(), "motd.txt", "override");
    write(root.path(), "motd.txt", "root");

    let config = RenderConfig::new()
        .with_include_dir(overrides.path())
        .with_root_dir(root.path());
    let rendered = render_with_config("{file:motd.txt}", &Variables::new(), &config).unwrap();
    assert_eq!(rendered.text, "override");
}

#[test]
fn test_render_file_searches_its_own_directory_last() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "main.tpl", "[{file:part.tpl}]");
    write(dir.path(), "part.tpl", "part");

    let rendered =
        render_file(&dir.path().join("main.tpl"), &Variables::new(), &RenderConfig::new())
            .unwrap();
    assert_eq!(rendered.text, "[part]");
}

#[test]
fn test_missing_include_lists_searched_paths() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let config = RenderConfig::new()
        .with_include_dir(a.path())
        .with_root_dir(b.path());

    let err = render_with_config("{file:gone.txt}", &Variables::new(), &config).unwrap_err();
    assert_eq!(
        err,
        RenderError::IncludeNotFound {
            path: "gone.txt".to_string(),
            searched: vec![a.path().join("gone.txt"), b.path().join("gone.txt")],
        }
    );
}

#[test]
fn test_circular_include_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.txt", "A{file:b.txt}");
    write(dir.path(), "b.txt", "B{file:a.txt}");

    let config = RenderConfig::new().with_root_dir(dir.path());
    let err = render_with_config("{file:a.txt}", &Variables::new(), &config).unwrap_err();
    assert!(matches!(err, RenderError::CircularInclude { .. }));
}

#[test]
fn test_include_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "0.txt", "{file:1.txt}");
    write(dir.path(), "1.txt", "{file:2.txt}");
    write(dir.path(), "2.txt", "{file:3.txt}");
    write(dir.path(), "3.txt", "bottom");

    let config = RenderConfig::new()
        .with_root_dir(dir.path())
        .with_max_include_depth(2);
    let err = render_with_config("{file:0.txt}", &Variables::new(), &config).unwrap_err();
    assert!(matches!(err, RenderError::IncludeDepth { limit: 2, .. }));

    let deep_enough = config.with_max_include_depth(4);
    let rendered = render_with_config("{file:0.txt}", &Variables::new(), &deep_enough).unwrap();
    assert_eq!(rendered.text, "bottom");
}

#[test]
fn test_syntax_error_in_included_file_names_it() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "bad.txt", "{% if x nonempty %}never closed");

    let config = RenderConfig::new().with_root_dir(dir.path());
    let err = render_with_config("{file:bad.txt}", &Variables::new(), &config).unwrap_err();
    match &err {
        RenderError::Syntax { origin: Some(path), .. } => assert!(path.ends_with("bad.txt")),
        other => panic!("Expected syntax error in include, got {:?}", other),
    }
    assert!(err.report("", "ignored").contains("bad.txt"));
}

#[test]
fn test_includes_can_be_disabled() {
    let vars = Variables::new().with("who", "me");
    let rendered = render_without_includes("{file:/etc/{who}.txt} for {who}", &vars).unwrap();
    assert_eq!(rendered.text, "{file:/etc/{who}.txt} for me");

    let enabled =
        render_source("{file:/definitely/missing}", &vars, &RenderConfig::default(), true);
    assert!(enabled.is_err());
}

#[test]
fn test_json_braces_pass_through() {
    let vars = Variables::new().with("port", 8080i64);
    let text = render(r#"{"listen": {port}, "tags": {}}"#, &vars).unwrap();
    assert_eq!(text, r#"{"listen": 8080, "tags": {}}"#);
}
