//! Session Templates CLI
//!
//! Usage:
//!   session-templates --catalog <FILE> <COMMAND>
//!
//! Commands:
//!   check                  Resolve every template and report errors
//!   resolve <ID>           Print a resolved template as TOML
//!   render <ID>            Print the launch plan for a session as TOML
//!   options <ID> <PARAM>   Print the options of a parameter, one per line

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use session_templates::{
    plan_launch, Catalog, ChainPolicy, LaunchError, LaunchRequest, LocalFileProbe,
    RenderError, ResolvedTemplate, Variables,
};

#[derive(Parser)]
#[command(name = "session-templates")]
#[command(about = "Resolve and render composable session launch templates")]
struct Cli {
    /// Catalog file (TOML format)
    #[arg(short, long)]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every template and report configuration errors
    Check,

    /// Print a resolved template as TOML
    Resolve {
        /// Template id
        id: String,
    },

    /// Print the launch plan for a session as TOML
    Render {
        /// Template id
        id: String,

        /// Variable or parameter value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Session id
        #[arg(long, default_value = "preview")]
        session_id: String,

        /// Use the fork command set
        #[arg(long)]
        fork: bool,

        /// Apply sandbox overrides
        #[arg(long)]
        sandboxed: bool,

        /// Render links for a stopped session
        #[arg(long)]
        inactive: bool,

        /// Join steps with `;` instead of `&&`
        #[arg(long)]
        tolerant: bool,
    },

    /// Print the selectable values of a parameter, one per line
    Options {
        /// Template id
        id: String,

        /// Parameter name
        parameter: String,

        /// User asking for the options
        #[arg(long)]
        viewer: Option<String>,

        /// Variable value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = match Catalog::from_file(&cli.catalog) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading catalog '{}': {}", cli.catalog.display(), e);
            process::exit(1);
        }
    };

    let ok = match cli.command {
        Command::Check => check(&catalog),
        Command::Resolve { id } => resolve(&catalog, &id),
        Command::Render {
            id,
            vars,
            session_id,
            fork,
            sandboxed,
            inactive,
            tolerant,
        } => {
            let mut request = LaunchRequest::new(session_id)
                .forking(fork)
                .sandboxed(sandboxed)
                .active(!inactive);
            if tolerant {
                request = request.with_policy(ChainPolicy::Tolerant);
            }
            for (name, value) in vars {
                request = request.with_variable(name, value);
            }
            render(&catalog, &id, &request)
        }
        Command::Options {
            id,
            parameter,
            viewer,
            vars,
        } => options(&catalog, &id, &parameter, viewer.as_deref(), vars.into_iter().collect()),
    };

    if !ok {
        process::exit(1);
    }
}

fn check(catalog: &Catalog) -> bool {
    let mut results = catalog.resolver().resolve_all();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut ok = true;
    for (id, result) in results {
        match result {
            Ok(_) => println!("ok    {}", id),
            Err(e) => {
                println!("error {}: {}", id, e);
                ok = false;
            }
        }
    }
    ok
}

fn resolve(catalog: &Catalog, id: &str) -> bool {
    let resolved = match catalog.resolver().resolve(id) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };
    print_toml(&*resolved)
}

fn render(catalog: &Catalog, id: &str, request: &LaunchRequest) -> bool {
    let resolver = catalog.resolver();
    match plan_launch(&resolver, id, request, &catalog.render, &LocalFileProbe) {
        Ok(plan) => print_toml(&plan),
        Err(LaunchError::Render(e)) => {
            eprintln!("Error: {}", e);
            if let RenderError::Syntax { origin: None, .. } = &e.source {
                let source = resolver.resolve(id).ok().and_then(|t| {
                    let t = if request.sandboxed {
                        t.with_sandbox_overrides()
                    } else {
                        (*t).clone()
                    };
                    field_text(&t, &e.field)
                });
                if let Some(source) = source {
                    eprintln!("{}", e.source.report(&source, &e.field));
                }
            } else if let RenderError::Syntax { origin: Some(_), .. } = &e.source {
                eprintln!("{}", e.source.report("", &e.field));
            }
            false
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}

fn options(
    catalog: &Catalog,
    id: &str,
    parameter: &str,
    viewer: Option<&str>,
    vars: Variables,
) -> bool {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return false;
        }
    };

    let resolver = catalog.resolver();
    let outcome = runtime.block_on(catalog.options_resolver().options_for(
        &resolver, id, parameter, &vars, viewer,
    ));

    for option in &outcome.options {
        println!("{}", option);
    }
    if let Some(e) = &outcome.error {
        eprintln!("Warning: {}", e);
    }
    true
}

fn print_toml<T: serde::Serialize>(value: &T) -> bool {
    match toml::to_string_pretty(value) {
        Ok(text) => {
            print!("{}", text);
            true
        }
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            false
        }
    }
}

/// Source text of a field path such as `pre_commands[1]` or `write_files[0].content`
fn field_text(template: &ResolvedTemplate, field: &str) -> Option<String> {
    let (name, rest) = match field.split_once('[') {
        Some((name, rest)) => (name, Some(rest)),
        None => (field, None),
    };
    let index = |rest: Option<&str>| -> Option<(usize, String)> {
        let (index, tail) = rest?.split_once(']')?;
        Some((index.parse().ok()?, tail.trim_start_matches('.').to_string()))
    };

    match name {
        "command" => template.command.clone(),
        "fork_command" => template.fork_command.clone(),
        "working_directory" => template.working_directory.clone(),
        "pre_commands" => template.pre_commands.get(index(rest)?.0).cloned(),
        "post_commands" => template.post_commands.get(index(rest)?.0).cloned(),
        "fork_pre_commands" => template.fork_pre_commands.as_ref()?.get(index(rest)?.0).cloned(),
        "fork_post_commands" => template.fork_post_commands.as_ref()?.get(index(rest)?.0).cloned(),
        "write_files" => {
            let (i, part) = index(rest)?;
            let file = template.write_files.get(i)?;
            match part.as_str() {
                "target" => Some(file.target.clone()),
                _ => Some(file.content.clone()),
            }
        }
        "bind_mounts" => {
            let (i, part) = index(rest)?;
            let mount = template.bind_mounts.get(i)?;
            match part.as_str() {
                "container" => mount.container.clone(),
                _ => Some(mount.host.clone()),
            }
        }
        other => other
            .strip_prefix("env_vars.")
            .and_then(|key| template.env_vars.get(key).cloned()),
    }
}
