//! Grammar and help generation.
//!
//! Nothing here is hand-written per command: the `clap::Command` of every
//! level is derived from what the [`Registry`] holds.
//!
//! # Containers
//!
//! ```text
//! My CLI.
//!
//! Usage: mycli [OPTIONS] <COMMAND> [ARGS]...
//!
//! Options:
//!   -d, --debug            Enable debug logging
//!       --dryrun           Log modifying commands instead of running them
//!       --config <CONFIG>  Config file [default: ~/.mycli/mycli.yaml]
//!   -h, --help             Print help
//!   -V, --version          Print version
//!
//! Commands:
//!   greeting                      Prints "Hello {name}!"
//!   myhandler                     My handler.
//! ```
//!
//! The `Commands:` section lists every name bound under the container's key,
//! aliases included, with summaries aligned at the container's column padding.
//!
//! # Commands
//!
//! Every parameter a user can supply is accepted both positionally (in
//! declaration order) and as `--name <NAME>`. Parameters with a boolean
//! default are flags only: `--name` for a `false` default, `--no-name` for a
//! `true` one. Fixture-named parameters are left out entirely.

use clap::{Arg, ArgAction};
use serde_json::Value;

use crate::command::{Command, Param, ParamDefault};
use crate::container::{Container, OptionDecl};
use crate::invocation::command_spec;
use crate::key::Key;
use crate::registry::Registry;

/// Builds the grammar of a CLI or handler level.
///
/// `fallback_version` is used when the container declares none, so every
/// level answers `--version`.
pub fn container_grammar(
    registry: &Registry,
    container: &dyn Container,
    key: &Key,
    fallback_version: Option<&str>,
) -> clap::Command {
    let bin_name = key.segments().join(" ");
    let mut cmd = clap::Command::new(container.name().to_string())
        .bin_name(bin_name.clone())
        .no_binary_name(true)
        .allow_external_subcommands(true)
        .external_subcommand_value_parser(clap::value_parser!(String))
        .override_usage(format!("{} [OPTIONS] <COMMAND> [ARGS]...", bin_name));

    if let Some(about) = container.about_text() {
        cmd = cmd.about(about.trim().to_string());
    }
    if let Some(version) = container.version_text().or(fallback_version) {
        cmd = cmd.version(version.to_string());
    }

    if container.is_cli() {
        cmd = cmd
            .arg(
                Arg::new("--debug")
                    .short('d')
                    .long("debug")
                    .action(ArgAction::SetTrue)
                    .help("Enable debug logging"),
            )
            .arg(
                Arg::new("--dryrun")
                    .long("dryrun")
                    .action(ArgAction::SetTrue)
                    .help("Log modifying commands instead of running them"),
            );
    }
    if let Some(config) = container.config_option() {
        cmd = cmd.arg(
            Arg::new("--config")
                .long("config")
                .value_name("CONFIG")
                .default_value(config)
                .help("Config file"),
        );
    }

    for option in container.options() {
        cmd = cmd.arg(option_arg(option));
    }

    let commands = commands_section(registry, key, container.padding());
    if !commands.is_empty() {
        cmd = cmd.after_help(commands);
    }
    cmd
}

/// Builds the grammar of a leaf command bound at `key`.
pub fn command_grammar(registry: &Registry, command: &Command, key: &Key) -> clap::Command {
    let mut cmd = clap::Command::new(command.name().to_string())
        .bin_name(key.segments().join(" "))
        .no_binary_name(true)
        .disable_version_flag(true);

    if let Some(about) = command.about_text() {
        cmd = cmd.about(about.trim().to_string());
    }

    let mut index = 1;
    for param in command_spec(command, registry) {
        if !param.is_flag() {
            cmd = cmd.arg(
                Arg::new(format!("<{}>", param.name))
                    .value_name(param.name.to_uppercase())
                    .index(index)
                    .required(false),
            );
            index += 1;
        }
        cmd = cmd.arg(param_arg(param));
    }
    cmd
}

/// The `Commands:` section of the container at `key`, or `""` if nothing
/// is bound there.
pub fn commands_section(registry: &Registry, key: &Key, padding: usize) -> String {
    let lines: Vec<String> = registry
        .entries(key)
        .map(|(name, target)| {
            let summary = target.summary();
            if summary.is_empty() {
                format!("  {}", name)
            } else if name.len() >= padding {
                format!("  {} {}", name, summary)
            } else {
                format!("  {:<width$}{}", name, summary, width = padding)
            }
        })
        .collect();

    if lines.is_empty() {
        String::new()
    } else {
        format!("Commands:\n{}", lines.join("\n"))
    }
}

fn param_arg(param: &Param) -> Arg {
    let default = match &param.default {
        ParamDefault::Required => None,
        ParamDefault::Value(v) => Some(v),
    };
    let mut arg = valued_or_flag(&param.name, default);
    if param.default.is_required() {
        arg = arg.help("Required");
    }
    arg
}

fn option_arg(option: &OptionDecl) -> Arg {
    let mut arg = valued_or_flag(option.name(), Some(option.default_value()));
    if let Some(short) = option.short_flag() {
        arg = arg.short(short);
    }
    if let Some(help) = option.help_text() {
        arg = arg.help(help.to_string());
    }
    arg
}

/// `--name` option with id `--name`, shaped by its default.
fn valued_or_flag(name: &str, default: Option<&Value>) -> Arg {
    let long = name.replace('_', "-");
    let arg = Arg::new(format!("--{}", name));

    match default {
        Some(Value::Bool(false)) => arg.long(long).action(ArgAction::SetTrue),
        Some(Value::Bool(true)) => arg.long(format!("no-{}", long)).action(ArgAction::SetFalse),
        Some(Value::Null) | None => arg
            .long(long)
            .value_name(name.to_uppercase())
            .action(ArgAction::Set),
        Some(Value::String(s)) => arg
            .long(long)
            .value_name(name.to_uppercase())
            .action(ArgAction::Set)
            .default_value(s.clone()),
        Some(other) => arg
            .long(long)
            .value_name(name.to_uppercase())
            .action(ArgAction::Set)
            .default_value(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Args;
    use crate::container::{CliDef, HandlerDef};
    use crate::context::Context;
    use crate::fixture::Fixture;
    use crate::grammar::{self, command_token};
    use crate::state::State;
    use serde_json::json;
    use std::rc::Rc;

    fn noop(name: &str) -> Command {
        Command::new(name, |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>(()))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_fixture(Fixture::new("db", |_s: &State| Ok(())))
            .unwrap();
        let greeting = registry.command(
            noop("greeting")
                .about("Prints \"Hello {name}!\"\n\nMore.")
                .arg("greeting", "Hello")
                .required("name")
                .alias("greet"),
        );
        registry
            .define_cli(
                CliDef::new("mycli")
                    .about("My CLI.")
                    .version("0.0.1")
                    .command(Rc::clone(&greeting)),
            )
            .unwrap();
        registry
            .define_handler(HandlerDef::new("myhandler", "mycli").about("My handler."))
            .unwrap();
        registry
    }

    #[test]
    fn test_commands_section_lists_aliases_and_handlers() {
        let registry = registry();
        let section = commands_section(&registry, &Key::cli("mycli"), 30);
        let lines: Vec<&str> = section.lines().collect();

        assert_eq!(lines[0], "Commands:");
        assert_eq!(lines[1], format!("  {:<30}{}", "greet", "Prints \"Hello {name}!\""));
        assert_eq!(lines[2], format!("  {:<30}{}", "greeting", "Prints \"Hello {name}!\""));
        assert_eq!(lines[3], format!("  {:<30}{}", "myhandler", "My handler."));
    }

    #[test]
    fn test_commands_section_empty_key() {
        let registry = registry();
        assert_eq!(commands_section(&registry, &Key::handler("mycli", "myhandler"), 30), "");
    }

    #[test]
    fn test_container_help_contains_sections() {
        let registry = registry();
        let cli = registry.cli("mycli").unwrap();
        let mut cmd = container_grammar(&registry, cli.as_ref(), &Key::cli("mycli"), None);
        let help = cmd.render_help().to_string();

        assert!(help.contains("My CLI."));
        assert!(help.contains("--debug"));
        assert!(help.contains("--dryrun"));
        assert!(help.contains("~/.mycli/mycli.yaml"));
        assert!(help.contains("Commands:"));
        assert!(help.contains("myhandler"));
    }

    #[test]
    fn test_handler_uses_fallback_version() {
        let registry = registry();
        let key = Key::handler("mycli", "myhandler");
        let handler = match registry.get(&key) {
            Some(crate::registry::Target::Handler(h)) => Rc::clone(h),
            other => panic!("unexpected target: {other:?}"),
        };
        let mut cmd = container_grammar(&registry, handler.as_ref(), &key, Some("0.0.1"));
        let err = grammar::parse(&mut cmd, ["--version"]).unwrap_err();
        assert!(matches!(err, crate::error::DispatchError::Exit { code: 0, .. }));
    }

    #[test]
    fn test_container_grammar_parses_command() {
        let registry = registry();
        let cli = registry.cli("mycli").unwrap();
        let mut cmd = container_grammar(&registry, cli.as_ref(), &Key::cli("mycli"), None);
        let raw = grammar::parse(&mut cmd, ["--dryrun", "greeting", "Kyle"]).unwrap();

        assert_eq!(command_token(&raw), Some("greeting"));
        assert_eq!(raw.get("--dryrun"), Some(&Some(json!(true))));
    }

    #[test]
    fn test_command_grammar_positional_and_option_forms() {
        let registry = registry();
        let cmd = noop("hello")
            .arg("msg", Value::Null)
            .arg("count", 1)
            .arg("force", false)
            .arg("color", true)
            .required("db");
        let key = Key::new(["mycli", "myhandler", "hello"]);

        let mut grammar_cmd = command_grammar(&registry, &cmd, &key);
        let raw = grammar::parse(&mut grammar_cmd, ["Kyle", "--force", "--no-color"]).unwrap();
        assert_eq!(raw.get("<msg>"), Some(&Some(json!("Kyle"))));
        assert_eq!(raw.get("--msg"), Some(&None));
        assert_eq!(raw.get("--count"), Some(&None));
        assert_eq!(raw.get("--force"), Some(&Some(json!(true))));
        assert_eq!(raw.get("--color"), Some(&Some(json!(false))));
        assert!(!raw.contains_key("<db>"));
        assert!(!raw.contains_key("--db"));
    }

    #[test]
    fn test_command_grammar_rejects_extra_positionals() {
        let registry = registry();
        let cmd = noop("hello").arg("msg", Value::Null);
        let mut grammar_cmd = command_grammar(&registry, &cmd, &Key::new(["mycli", "hello"]));
        let err = grammar::parse(&mut grammar_cmd, ["a", "b"]).unwrap_err();
        assert!(matches!(err, crate::error::DispatchError::Grammar { .. }));
    }
}
