use std::io::Write;
use std::rc::Rc;

use battalion::{Args, Cli, CliDef, Command, Context, HandlerDef, OptionDecl, Registry};
use serde_json::json;

fn cli() -> Cli {
    let mut registry = Registry::new();
    let show = registry.command(Command::new("show", |ctx: &mut Context, _args: &Args| {
        Ok::<_, anyhow::Error>(ctx.state().clone())
    }));
    registry
        .define_cli(
            CliDef::new("mycli")
                .version("1.2.3")
                .state("level", "cli")
                .state("shared", "cli")
                .option(OptionDecl::new("level", "cli").short('l'))
                .command(Rc::clone(&show)),
        )
        .unwrap();
    registry
        .define_handler(
            HandlerDef::new("inner", "mycli")
                .state("shared", "handler")
                .option(OptionDecl::new("quiet", false))
                .command(show),
        )
        .unwrap();
    Cli::new(Rc::new(registry), "mycli").unwrap()
}

#[test]
fn test_handler_snapshot_overrides_cli() {
    let outcome = cli().call(["inner", "show"]);
    assert_eq!(outcome.value["shared"], json!("handler"));
    assert_eq!(outcome.value["cli"], json!("mycli"));
    assert_eq!(outcome.value["version"], json!("1.2.3"));
}

#[test]
fn test_cli_level_option() {
    let outcome = cli().call(["-l", "flag", "inner", "show"]);
    assert_eq!(outcome.value["level"], json!("flag"));
}

#[test]
fn test_unset_handler_flag_keeps_declared_default() {
    let outcome = cli().call(["inner", "show"]);
    assert_eq!(outcome.value["quiet"], json!(false));

    let outcome = cli().call(["inner", "--quiet", "show"]);
    assert_eq!(outcome.value["quiet"], json!(true));
}

#[test]
fn test_debug_flag_sets_state() {
    let outcome = cli().call(["-d", "show"]);
    assert_eq!(outcome.status, 0);
    assert_eq!(outcome.value["debug"], json!(true));
}

#[test]
fn test_each_call_starts_clean() {
    let cli = cli();
    let first = cli.call(["--dryrun", "show"]);
    let second = cli.call(["show"]);
    assert_eq!(first.value["dryrun"], json!(true));
    assert_eq!(second.value["dryrun"], json!(false));
}

fn regional_cli() -> Cli {
    let mut registry = Registry::new();
    registry.define_cli(CliDef::new("mycli")).unwrap();
    registry
        .define_handler(
            HandlerDef::new("inner", "mycli")
                .option(OptionDecl::new("region", "us"))
                .command(
                    Command::new("show", |ctx: &mut Context, args: &Args| {
                        Ok::<_, anyhow::Error>(json!({
                            "region": ctx.state().get("region"),
                            "state_name": ctx.state().get("name"),
                            "arg_name": args.get("name"),
                        }))
                    })
                    .arg("name", "World"),
                ),
        )
        .unwrap();
    Cli::new(Rc::new(registry), "mycli").unwrap()
}

fn config_file(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", text).unwrap();
    file
}

#[test]
fn test_config_overrides_option_and_param_defaults() {
    let file = config_file("mycli:\n  inner:\n    region: eu\n    show:\n      name: Bob\n");
    let path = file.path().to_string_lossy().into_owned();

    let outcome = regional_cli().call(["--config", path.as_str(), "inner", "show"]);
    assert_eq!(outcome.status, 0, "{}", outcome.stderr);
    assert_eq!(outcome.value["region"], json!("eu"));
    assert_eq!(outcome.value["state_name"], json!("Bob"));
    assert_eq!(outcome.value["arg_name"], json!("Bob"));
}

#[test]
fn test_typed_options_override_config() {
    let file = config_file("mycli:\n  inner:\n    region: eu\n    show:\n      name: Bob\n");
    let path = file.path().to_string_lossy().into_owned();

    let outcome = regional_cli().call([
        "--config",
        path.as_str(),
        "inner",
        "--region",
        "ap",
        "show",
        "Kyle",
    ]);
    assert_eq!(outcome.value["region"], json!("ap"));
    assert_eq!(outcome.value["state_name"], json!("Kyle"));
    assert_eq!(outcome.value["arg_name"], json!("Kyle"));
}

#[test]
fn test_defaults_apply_without_config() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    let outcome = regional_cli().call(["--config", missing.to_str().unwrap(), "inner", "show"]);
    assert_eq!(outcome.value["region"], json!("us"));
    assert_eq!(outcome.value["arg_name"], json!("World"));
    assert!(outcome.value["state_name"].is_null());
}
