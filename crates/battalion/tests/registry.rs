use std::cell::Cell;
use std::rc::Rc;

use battalion::{
    Args, Cli, CliDef, Command, Context, Fixture, HandlerDef, Key, Registry, RegistryError,
    State, Target,
};
use serde_json::{json, Value};

fn noop(name: &str) -> Command {
    Command::new(name, |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>(()))
}

#[test]
fn test_duplicate_command_under_cli_fails_at_declaration() {
    let mut registry = Registry::new();
    let err = registry
        .define_cli(CliDef::new("mycli").command(noop("hello")).command(noop("hello")))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate { ref name, .. } if name == "hello"));
}

#[test]
fn test_same_name_under_cli_and_handler() {
    let mut registry = Registry::new();
    registry
        .define_cli(CliDef::new("mycli").command(noop("hello")))
        .unwrap();
    registry
        .define_handler(HandlerDef::new("myhandler", "mycli").command(noop("hello")))
        .unwrap();

    let top = registry.get(&Key::new(["mycli", "hello"])).unwrap();
    let nested = registry.get(&Key::new(["mycli", "myhandler", "hello"])).unwrap();
    assert!(!top.same(nested));
}

#[test]
fn test_handler_alias_dispatches() {
    let mut registry = Registry::new();
    registry.define_cli(CliDef::new("mycli")).unwrap();
    registry
        .define_handler(
            HandlerDef::new("database", "mycli").alias("db").command(
                Command::new("ping", |_ctx: &mut Context, _args: &Args| {
                    Ok::<_, anyhow::Error>("pong")
                }),
            ),
        )
        .unwrap();

    let alias = registry.get(&Key::handler("mycli", "db")).unwrap();
    let primary = registry.get(&Key::handler("mycli", "database")).unwrap();
    assert!(alias.same(primary));
    assert!(matches!(alias, Target::Handler(_)));

    let cli = Cli::new(Rc::new(registry), "mycli").unwrap();
    assert_eq!(cli.call(["db", "ping"]).value, json!("pong"));
    assert_eq!(cli.call(["database", "ping"]).value, json!("pong"));
}

#[test]
fn test_memoized_fixture_shared_across_commands_of_a_run() {
    let builds = Rc::new(Cell::new(0));
    let counter = Rc::clone(&builds);

    let mut registry = Registry::new();
    registry
        .register_fixture(Fixture::memoized("token", move |_s: &State| {
            counter.set(counter.get() + 1);
            Ok(format!("token-{}", counter.get()))
        }))
        .unwrap();

    let inner = registry.command(
        Command::new("inner", |_ctx: &mut Context, args: &Args| {
            Ok::<_, anyhow::Error>(args.fixture::<String>("token")?.as_str().to_string())
        })
        .required("token"),
    );
    let outer = Command::new("outer", |ctx: &mut Context, args: &Args| {
        let mine = args.fixture::<String>("token")?;
        let theirs = ctx.call("inner", Vec::<(String, Value)>::new())?;
        Ok::<_, anyhow::Error>(json!([mine.as_str(), theirs]))
    })
    .required("token");

    registry
        .define_cli(CliDef::new("mycli").command(inner).command(outer))
        .unwrap();
    let cli = Cli::new(Rc::new(registry), "mycli").unwrap();

    assert_eq!(cli.call(["outer"]).value, json!(["token-1", "token-1"]));
    assert_eq!(cli.call(["inner"]).value, json!("token-1"));
    assert_eq!(builds.get(), 1);
}

#[test]
fn test_plain_fixture_rebuilt_per_use() {
    let builds = Rc::new(Cell::new(0));
    let counter = Rc::clone(&builds);

    let mut registry = Registry::new();
    registry
        .register_fixture(Fixture::new("token", move |_s: &State| {
            counter.set(counter.get() + 1);
            Ok(counter.get())
        }))
        .unwrap();
    registry
        .define_cli(CliDef::new("mycli").command(
            Command::new("show", |_ctx: &mut Context, args: &Args| {
                Ok::<_, anyhow::Error>(*args.fixture::<i32>("token")?)
            })
            .required("token"),
        ))
        .unwrap();
    let cli = Cli::new(Rc::new(registry), "mycli").unwrap();

    assert_eq!(cli.call(["show"]).value, json!(1));
    assert_eq!(cli.call(["show"]).value, json!(2));
    assert_eq!(builds.get(), 2);
}

#[test]
fn test_fixture_failure_is_reported() {
    let mut registry = Registry::new();
    registry
        .register_fixture(Fixture::new("db", |_s: &State| {
            Err::<(), _>(anyhow::anyhow!("cannot connect"))
        }))
        .unwrap();
    registry
        .define_cli(CliDef::new("mycli").command(noop("sync").required("db")))
        .unwrap();
    let cli = Cli::new(Rc::new(registry), "mycli").unwrap();

    let outcome = cli.call(["sync"]);
    assert_eq!(outcome.status, 1);
    assert!(outcome.stderr.contains("cannot connect"));
}

#[test]
fn test_state_is_shared_between_called_commands() {
    let mut registry = Registry::new();
    let set = registry.command(Command::new("set", |ctx: &mut Context, _args: &Args| {
        ctx.state_mut().set("seen", true);
        Ok::<_, anyhow::Error>(())
    }));
    let check = Command::new("check", |ctx: &mut Context, _args: &Args| {
        ctx.call("set", Vec::<(String, Value)>::new())?;
        Ok::<_, anyhow::Error>(ctx.state().get_bool("seen"))
    });
    registry
        .define_cli(CliDef::new("mycli").command(set).command(check))
        .unwrap();
    let cli = Cli::new(Rc::new(registry), "mycli").unwrap();

    assert_eq!(cli.call(["check"]).value, json!(true));
}
