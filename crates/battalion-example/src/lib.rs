//! The `mycli` example application.
//!
//! Declares one CLI with a handler, a memoized fixture, an aliased command, a
//! command bound under two parents, and a command that honors `--dryrun`.
//!
//! ```text
//! mycli [-d] [--dryrun] [--config <CONFIG>] <COMMAND> [ARGS]...
//!
//!   greet | greeting [<name>] [--greeting <G>]
//!   normal_function [<data>]
//!   delete <name>
//!   test
//!   myhandler [--loud] <COMMAND>
//!       hello [<msg>]
//!       validate [<data>]
//!       test
//! ```

use std::rc::Rc;

use battalion::{
    Args, Cli, CliDef, Command, Context, Fixture, HandlerDef, OptionDecl, Registry,
    RegistryError, State,
};
use serde_json::{json, Value};

/// A stand-in for an expensive resource, built once per process.
#[derive(Debug)]
pub struct Db {
    pub msg: String,
}

/// Declares every command, handler and fixture of `mycli`.
pub fn registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();

    registry.register_fixture(Fixture::memoized("db", |state: &State| {
        Ok(Db {
            msg: state.get_str("msg").unwrap_or_default().to_string(),
        })
    }))?;

    let greeting = registry.command(
        Command::new("greeting", |ctx: &mut Context, args: &Args| {
            let line = format!(
                "{} {}!",
                args.str("greeting").unwrap_or("Hello"),
                args.str("name").unwrap_or("World")
            );
            if ctx.state().get_bool("loud") {
                ctx.echo(line.to_uppercase());
            } else {
                ctx.echo(line);
            }
            Ok::<_, anyhow::Error>(())
        })
        .about("Prints \"{greeting} {name}!\"")
        .arg("greeting", "Hello")
        .arg("name", "World")
        .alias("greet"),
    );

    let normal_function = Command::new("normal_function", |ctx: &mut Context, args: &Args| {
        let db = args.fixture::<Db>("db")?;
        let data = match args.str("data") {
            Some(data) => data,
            None => {
                ctx.echo_err("no data given");
                "nothing"
            }
        };
        ctx.echo(format!("{}: {}", db.msg, data));
        Ok::<_, anyhow::Error>(())
    })
    .about("Prints the db message and the given data")
    .required("db")
    .arg("data", Value::Null);

    let delete = Command::new("delete", |ctx: &mut Context, args: &Args| {
        let name = args.str("name").unwrap_or_default().to_string();
        ctx.echo(format!("Deleted {}", name));
        Ok::<_, anyhow::Error>(true)
    })
    .about("Deletes a thing (skipped under --dryrun)")
    .required("name")
    .dryrun(false);

    let test = registry.command(
        Command::new("test", |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>("Boom"))
            .about("Returns Boom"),
    );

    let hello = Command::new("hello", |ctx: &mut Context, _args: &Args| {
        let msg = ctx.state().get_str("msg").unwrap_or_default().to_string();
        ctx.call("greeting", [("name", msg)])
    })
    .about("Greets whoever the state's msg names")
    .arg("msg", Value::Null);

    let validate = Command::new("validate", |_ctx: &mut Context, args: &Args| {
        let db = args.fixture::<Db>("db")?;
        Ok::<_, anyhow::Error>(json!({
            "db": db.msg,
            "data": args.get("data"),
        }))
    })
    .about("Echoes the db message with the given data")
    .required("db")
    .arg("data", Value::Null);

    registry.define_cli(
        CliDef::new("mycli")
            .about("An example battalion CLI.")
            .version("0.0.1")
            .state("msg", "")
            .command(greeting)
            .command(normal_function)
            .command(delete),
    )?;

    registry.define_handler(
        HandlerDef::new("myhandler", "mycli")
            .about("Commands that greet.")
            .version("0.0.2")
            .state("msg", "World")
            .option(OptionDecl::new("loud", false).help("Shout the greeting"))
            .command(hello)
            .command(validate),
    )?;

    registry.bind(&test, "mycli", None, &[])?;
    registry.bind(&test, "mycli", Some("myhandler"), &[])?;

    Ok(registry)
}

/// Builds a runnable `mycli`.
pub fn cli() -> anyhow::Result<Cli> {
    Ok(Cli::new(Rc::new(registry()?), "mycli")?)
}
