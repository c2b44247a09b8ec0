//! Command registration, layered state and dispatch for hierarchical CLIs.
//!
//! `battalion` lets a program declare a top-level CLI, group commands under
//! named handlers, and expose plain functions as commands. Help text and
//! argument grammars are generated from the declarations; argv is resolved
//! one path segment at a time (`mycli myhandler hello`); configuration is
//! layered from declared defaults, a YAML config file and command-line
//! options into one state shared by every command of a run.
//!
//! # Features
//!
//! - **Registry**: two-phase registration, aliases, multi-binding, fixtures
//! - **State layering**: explicit default chains, config fragments, options
//! - **Invocation**: argument normalization and coercion, fixture injection
//! - **Dispatch**: recursive resolution with a single reporting boundary
//! - **AutoDoc**: clap grammars and `Commands:` listings from the registry
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use battalion::{Args, Cli, CliDef, Command, Context, HandlerDef, Registry};
//!
//! let mut registry = Registry::new();
//!
//! let greeting = registry.command(
//!     Command::new("greeting", |ctx: &mut Context, args: &Args| {
//!         ctx.echo(format!("Hello {}!", args.str("name").unwrap_or("World")));
//!         Ok::<_, anyhow::Error>(())
//!     })
//!     .about("Prints \"Hello {name}!\"")
//!     .arg("name", "World"),
//! );
//!
//! let hello = Command::new("hello", |ctx: &mut Context, _args: &Args| {
//!     let msg = ctx.state().get_str("msg").unwrap_or("").to_string();
//!     ctx.call("greeting", [("name", msg)])
//! })
//! .arg("msg", serde_json::Value::Null);
//!
//! registry.define_cli(CliDef::new("mycli").version("0.0.1").command(greeting)).unwrap();
//! registry
//!     .define_handler(HandlerDef::new("myhandler", "mycli").state("msg", "World").command(hello))
//!     .unwrap();
//!
//! let cli = Cli::new(Rc::new(registry), "mycli").unwrap();
//! assert_eq!(cli.call(["myhandler", "hello", "Kyle"]).stdout, "Hello Kyle!\n");
//! assert_eq!(cli.call(["myhandler", "hello"]).stdout, "Hello World!\n");
//! ```

pub mod autodoc;
mod command;
mod config;
mod container;
mod context;
mod dispatch;
mod error;
mod fixture;
pub mod grammar;
pub mod invocation;
mod key;
pub mod log;
mod output;
mod registry;
mod state;

pub use command::{
    Args, Command, CommandFn, CommandResult, FnCommand, IntoCommandResult, Param, ParamDefault,
};
pub use config::{expand_path, Config};
pub use container::{
    default_config_path, CliDef, Container, HandlerDef, OptionDecl, DEFAULT_COLUMN_PADDING,
};
pub use context::Context;
pub use dispatch::Cli;
pub use error::{exit, ConfigError, DispatchError, InvocationError, RegistryError};
pub use fixture::{Fixture, FixtureSet, FixtureValue};
pub use key::{Key, MAX_DEPTH};
pub use output::{render_value, Console, Outcome};
pub use registry::{Registry, Target};
pub use state::{DefaultLayer, Defaults, OptionFragment, State, StateCompiler};
