//! The command registry.
//!
//! The registry maps hierarchical [`Key`]s to [`Target`]s: CLIs at the root,
//! handlers under their CLI, commands under a CLI or a handler. It is filled
//! once while the program declares its commands and is read-only during
//! dispatch.
//!
//! # Two-phase registration
//!
//! A command is usually declared before the container it ends up in. The
//! registry therefore accepts registrations without a key: the target (and
//! any aliases) are cached as *pending*, and bound for real once a container
//! that lists the command is defined. Binding the same command under several
//! parents is allowed; binding two targets with the same name under the same
//! parent is a [`RegistryError::Duplicate`].
//!
//! ```rust
//! use std::rc::Rc;
//! use battalion::{Args, CliDef, Command, Context, HandlerDef, Key, Registry};
//!
//! let mut registry = Registry::new();
//! let hello = registry.command(
//!     Command::new("hello", |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>("hi"))
//!         .alias("hi"),
//! );
//! assert!(registry.is_cached(&hello.clone().into()));
//!
//! registry.define_cli(CliDef::new("app").command(Rc::clone(&hello))).unwrap();
//! registry.define_handler(HandlerDef::new("greet", "app").command(Rc::clone(&hello))).unwrap();
//!
//! assert!(registry.get(&Key::new(["app", "hello"])).is_some());
//! assert!(registry.get(&Key::new(["app", "greet", "hi"])).is_some());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::command::{Command, Param, ParamDefault};
use crate::container::{
    CliDef, Container, HandlerDef, OptionDecl, CLI_LONGS, CLI_SHORTS, COMMAND_LONGS,
    HANDLER_LONGS, HANDLER_SHORTS,
};
use crate::error::RegistryError;
use crate::fixture::{Fixture, FixtureSet, FixtureValue};
use crate::key::{Key, MAX_DEPTH};
use crate::state::State;

/// Something bound at a registry key.
#[derive(Clone)]
pub enum Target {
    Cli(Rc<CliDef>),
    Handler(Rc<HandlerDef>),
    Command(Rc<Command>),
}

impl Target {
    /// Identity comparison: true if both point at the same declaration.
    pub fn same(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Cli(a), Target::Cli(b)) => Rc::ptr_eq(a, b),
            (Target::Handler(a), Target::Handler(b)) => Rc::ptr_eq(a, b),
            (Target::Command(a), Target::Command(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The declared name (not the alias it may be bound under).
    pub fn name(&self) -> &str {
        match self {
            Target::Cli(c) => c.name(),
            Target::Handler(h) => h.name(),
            Target::Command(c) => c.name(),
        }
    }

    /// First line of the target's help text.
    pub fn summary(&self) -> &str {
        match self {
            Target::Cli(c) => c.summary(),
            Target::Handler(h) => h.summary(),
            Target::Command(c) => c.summary(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Target::Cli(_) => "cli",
            Target::Handler(_) => "handler",
            Target::Command(_) => "command",
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}

impl From<Rc<Command>> for Target {
    fn from(c: Rc<Command>) -> Self {
        Target::Command(c)
    }
}

impl From<Rc<HandlerDef>> for Target {
    fn from(h: Rc<HandlerDef>) -> Self {
        Target::Handler(h)
    }
}

impl From<Rc<CliDef>> for Target {
    fn from(c: Rc<CliDef>) -> Self {
        Target::Cli(c)
    }
}

/// Process-wide store of commands, handlers, CLIs and fixtures.
#[derive(Default)]
pub struct Registry {
    /// Parent key → name → target.
    entries: HashMap<Key, BTreeMap<String, Target>>,
    /// Targets seen without a full key.
    pending: Vec<Target>,
    /// Aliases declared before their target's key was known.
    pending_aliases: Vec<(String, Target)>,
    fixtures: FixtureSet,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a command whose parent is not known yet.
    ///
    /// The command and its aliases are cached; they are bound when a
    /// container listing the returned handle is defined, or via
    /// [`bind`](Self::bind).
    pub fn command(&mut self, command: Command) -> Rc<Command> {
        let command = Rc::new(command);
        let aliases = command.aliases().to_vec();
        self.cache(Target::Command(Rc::clone(&command)), command.name(), &aliases);
        command
    }

    /// Registers `target` as `name` under the parent `key`.
    ///
    /// Unseen targets are remembered as pending first. With an empty key the
    /// aliases are cached for the target's later registrations. With a
    /// non-empty key, `name`, every alias in `aliases` and every alias cached
    /// earlier for this target are bound under `key`.
    pub fn register(
        &mut self,
        target: impl Into<Target>,
        name: &str,
        key: &Key,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        let target = target.into();
        if let Target::Command(command) = &target {
            check_params(command)?;
        }

        if key.is_empty() {
            self.cache(target, name, aliases);
            return Ok(());
        }
        if !self.is_cached(&target) {
            tracing::debug!("caching {} \"{}\"", target.kind(), name);
            self.pending.push(target.clone());
        }

        self.bind_entry(key, name, target.clone())?;

        let mut bound: Vec<String> = vec![name.to_string()];
        let cached: Vec<String> = self
            .pending_aliases
            .iter()
            .filter(|(_, t)| t.same(&target))
            .map(|(alias, _)| alias.clone())
            .collect();
        for alias in aliases.iter().chain(cached.iter()) {
            if bound.contains(alias) {
                continue;
            }
            self.bind_entry(key, alias, target.clone())?;
            bound.push(alias.clone());
        }
        Ok(())
    }

    /// Binds an already declared command under `cli` (and optionally
    /// `handler`), using the command's own name.
    pub fn bind(
        &mut self,
        command: &Rc<Command>,
        cli: &str,
        handler: Option<&str>,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        if self.cli(cli).is_none() {
            return Err(RegistryError::UnknownCli(cli.to_string()));
        }
        let key = Key::parent(cli, handler);
        if let Some(handler) = handler {
            if !matches!(self.get(&key), Some(Target::Handler(_))) {
                return Err(RegistryError::UnknownHandler {
                    cli: cli.to_string(),
                    handler: handler.to_string(),
                });
            }
        }
        self.register(Rc::clone(command), command.name(), &key, aliases)
    }

    /// Defines a CLI and binds every command it lists under `(cli)`.
    pub fn define_cli(&mut self, def: CliDef) -> Result<Rc<CliDef>, RegistryError> {
        check_options(def.name(), def.options(), CLI_LONGS, CLI_SHORTS)?;
        let def = Rc::new(def);
        let name = def.name().to_string();
        self.bind_entry(&Key::root(), &name, Target::Cli(Rc::clone(&def)))?;

        let key = Key::cli(&name);
        for command in def.commands() {
            self.finalize(command, &key)?;
        }
        Ok(def)
    }

    /// Defines a handler under its CLI and binds every command it lists
    /// under `(cli, handler)`.
    pub fn define_handler(&mut self, def: HandlerDef) -> Result<Rc<HandlerDef>, RegistryError> {
        if self.cli(def.cli()).is_none() {
            return Err(RegistryError::UnknownCli(def.cli().to_string()));
        }
        check_options(def.name(), def.options(), HANDLER_LONGS, HANDLER_SHORTS)?;
        let def = Rc::new(def);
        let parent = Key::cli(def.cli());
        self.register(Rc::clone(&def), def.name(), &parent, def.aliases())?;

        let key = parent.child(def.name());
        for command in def.commands() {
            self.finalize(command, &key)?;
        }
        Ok(def)
    }

    /// Returns the target bound at `key`, if any.
    pub fn get(&self, key: &Key) -> Option<&Target> {
        let (parent, name) = key.split_last()?;
        self.entries.get(&parent)?.get(name)
    }

    /// Looks up a defined CLI by name.
    pub fn cli(&self, name: &str) -> Option<Rc<CliDef>> {
        match self.get(&Key::cli(name)) {
            Some(Target::Cli(def)) => Some(Rc::clone(def)),
            _ => None,
        }
    }

    /// Returns true if `target` went through any earlier registration.
    pub fn is_cached(&self, target: &Target) -> bool {
        self.pending.iter().any(|t| t.same(target))
    }

    /// Every name bound directly under `key`, aliases included, sorted.
    pub fn entries(&self, key: &Key) -> impl Iterator<Item = (&str, &Target)> {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(|m| m.iter().map(|(name, t)| (name.as_str(), t)))
    }

    /// Registers a fixture. Fails if the name is taken.
    pub fn register_fixture(&mut self, fixture: Fixture) -> Result<(), RegistryError> {
        self.fixtures.register(fixture)
    }

    /// Produces the named fixture's value, or `Ok(None)` if there is none.
    pub fn get_fixture(&self, name: &str, state: &State) -> anyhow::Result<Option<FixtureValue>> {
        self.fixtures.get(name, state)
    }

    pub fn is_fixture(&self, name: &str) -> bool {
        self.fixtures.contains(name)
    }

    fn finalize(&mut self, command: &Rc<Command>, key: &Key) -> Result<(), RegistryError> {
        let target = Target::Command(Rc::clone(command));
        if !self.is_cached(&target) {
            let aliases = command.aliases().to_vec();
            self.cache(target.clone(), command.name(), &aliases);
        }
        self.register(target, command.name(), key, &[])
    }

    fn cache(&mut self, target: Target, name: &str, aliases: &[String]) {
        if !self.is_cached(&target) {
            tracing::debug!("caching {} \"{}\"", target.kind(), name);
            self.pending.push(target.clone());
        }
        for alias in aliases {
            let known = self
                .pending_aliases
                .iter()
                .any(|(a, t)| a == alias && t.same(&target));
            if !known {
                tracing::debug!("caching alias \"{}\" for \"{}\"", alias, name);
                self.pending_aliases.push((alias.clone(), target.clone()));
            }
        }
    }

    fn bind_entry(&mut self, key: &Key, name: &str, target: Target) -> Result<(), RegistryError> {
        if key.len() + 1 > MAX_DEPTH {
            return Err(RegistryError::KeyTooDeep {
                name: name.to_string(),
                key: key.clone(),
            });
        }
        tracing::debug!("registering \"{}\" to {}", name, key);
        let names = self.entries.entry(key.clone()).or_default();
        if names.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
                key: key.clone(),
            });
        }
        names.insert(name.to_string(), target);
        Ok(())
    }
}

/// Rejects container options that would shadow the framework's own.
fn check_options(
    owner: &str,
    options: &[OptionDecl],
    longs: &[&str],
    shorts: &[char],
) -> Result<(), RegistryError> {
    for option in options {
        let long = option.long();
        let dashed = option.name().replace('_', "-");
        let taken = longs.iter().any(|l| *l == long || *l == dashed)
            || option.short_flag().is_some_and(|c| shorts.contains(&c));
        if taken {
            return Err(RegistryError::Reserved {
                name: option.name().to_string(),
                owner: owner.to_string(),
            });
        }
    }
    Ok(())
}

fn check_params(command: &Command) -> Result<(), RegistryError> {
    let taken = |param: &Param| {
        let dashed = param.name.replace('_', "-");
        let flagged = match param.default {
            ParamDefault::Value(serde_json::Value::Bool(true)) => format!("no-{}", dashed),
            _ => dashed.clone(),
        };
        COMMAND_LONGS.iter().any(|l| *l == dashed || *l == flagged)
    };
    match command.params().iter().find(|p| taken(*p)) {
        Some(param) => Err(RegistryError::Reserved {
            name: param.name.clone(),
            owner: command.name().to_string(),
        }),
        None => Ok(()),
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .flat_map(|(k, names)| names.keys().map(move |n| k.child(n).to_dotted()))
            .collect();
        keys.sort();
        f.debug_struct("Registry")
            .field("keys", &keys)
            .field("pending", &self.pending.len())
            .field("fixtures", &self.fixtures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Args;
    use crate::context::Context;

    fn noop(name: &str) -> Command {
        Command::new(name, |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>(()))
    }

    #[test]
    fn test_register_without_key_only_caches() {
        let mut registry = Registry::new();
        let cmd = Rc::new(noop("hello"));
        registry
            .register(Rc::clone(&cmd), "hello", &Key::root(), &[])
            .unwrap();

        assert!(registry.is_cached(&Target::Command(Rc::clone(&cmd))));
        assert_eq!(registry.entries(&Key::cli("mycli")).count(), 0);
    }

    #[test]
    fn test_duplicate_under_same_key_fails() {
        let mut registry = Registry::new();
        let key = Key::cli("mycli");
        registry
            .register(Rc::new(noop("hello")), "hello", &key, &[])
            .unwrap();
        let err = registry
            .register(Rc::new(noop("hello")), "hello", &key, &[])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { ref name, .. } if name == "hello"));
    }

    #[test]
    fn test_same_name_under_different_keys_succeeds() {
        let mut registry = Registry::new();
        registry
            .register(Rc::new(noop("hello")), "hello", &Key::cli("mycli"), &[])
            .unwrap();
        registry
            .register(
                Rc::new(noop("hello")),
                "hello",
                &Key::handler("mycli", "myhandler"),
                &[],
            )
            .unwrap();

        assert!(registry.get(&Key::new(["mycli", "hello"])).is_some());
        assert!(registry
            .get(&Key::new(["mycli", "myhandler", "hello"]))
            .is_some());
    }

    #[test]
    fn test_alias_resolves_to_same_target() {
        let mut registry = Registry::new();
        let cmd = Rc::new(noop("greeting"));
        registry
            .register(
                Rc::clone(&cmd),
                "greeting",
                &Key::handler("mycli", "myhandler"),
                &["greet".to_string()],
            )
            .unwrap();

        let primary = registry
            .get(&Key::new(["mycli", "myhandler", "greeting"]))
            .unwrap();
        let alias = registry
            .get(&Key::new(["mycli", "myhandler", "greet"]))
            .unwrap();
        assert!(primary.same(alias));

        let names: Vec<&str> = registry
            .entries(&Key::handler("mycli", "myhandler"))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["greet", "greeting"]);
    }

    #[test]
    fn test_alias_collision_fails() {
        let mut registry = Registry::new();
        let key = Key::cli("mycli");
        registry
            .register(Rc::new(noop("greet")), "greet", &key, &[])
            .unwrap();
        let err = registry
            .register(Rc::new(noop("greeting")), "greeting", &key, &["greet".into()])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { ref name, .. } if name == "greet"));
    }

    #[test]
    fn test_cached_aliases_apply_on_later_registration() {
        let mut registry = Registry::new();
        let cmd = registry.command(noop("greeting").alias("greet"));
        registry.define_cli(CliDef::new("mycli")).unwrap();
        registry
            .define_handler(HandlerDef::new("myhandler", "mycli"))
            .unwrap();

        registry.bind(&cmd, "mycli", None, &[]).unwrap();
        registry.bind(&cmd, "mycli", Some("myhandler"), &[]).unwrap();

        assert!(registry.get(&Key::new(["mycli", "greet"])).is_some());
        assert!(registry
            .get(&Key::new(["mycli", "myhandler", "greet"]))
            .is_some());
    }

    #[test]
    fn test_key_too_deep() {
        let mut registry = Registry::new();
        let err = registry
            .register(Rc::new(noop("x")), "x", &Key::new(["a", "b", "c"]), &[])
            .unwrap_err();
        assert!(matches!(err, RegistryError::KeyTooDeep { .. }));
    }

    #[test]
    fn test_define_cli_and_handler() {
        let mut registry = Registry::new();
        let hello = registry.command(noop("hello"));
        let cli = registry
            .define_cli(CliDef::new("mycli").command(Rc::clone(&hello)))
            .unwrap();
        registry
            .define_handler(HandlerDef::new("myhandler", "mycli").command(hello))
            .unwrap();

        assert!(Rc::ptr_eq(&registry.cli("mycli").unwrap(), &cli));
        assert!(matches!(
            registry.get(&Key::handler("mycli", "myhandler")),
            Some(Target::Handler(_))
        ));
        assert!(registry.get(&Key::new(["mycli", "hello"])).is_some());
        assert!(registry
            .get(&Key::new(["mycli", "myhandler", "hello"]))
            .is_some());
    }

    #[test]
    fn test_define_cli_twice_fails() {
        let mut registry = Registry::new();
        registry.define_cli(CliDef::new("mycli")).unwrap();
        assert!(registry.define_cli(CliDef::new("mycli")).is_err());
    }

    #[test]
    fn test_handler_for_unknown_cli_fails() {
        let mut registry = Registry::new();
        let err = registry
            .define_handler(HandlerDef::new("myhandler", "nope"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownCli(ref name) if name == "nope"));
    }

    #[test]
    fn test_bind_requires_defined_parents() {
        let mut registry = Registry::new();
        let cmd = registry.command(noop("test"));
        assert!(matches!(
            registry.bind(&cmd, "mycli", None, &[]),
            Err(RegistryError::UnknownCli(_))
        ));

        registry.define_cli(CliDef::new("mycli")).unwrap();
        assert!(matches!(
            registry.bind(&cmd, "mycli", Some("myhandler"), &[]),
            Err(RegistryError::UnknownHandler { .. })
        ));
        registry.bind(&cmd, "mycli", None, &[]).unwrap();
    }

    #[test]
    fn test_reserved_cli_options_rejected() {
        for name in ["debug", "dryrun", "config", "help", "version"] {
            let mut registry = Registry::new();
            let err = registry
                .define_cli(CliDef::new("mycli").option(OptionDecl::new(name, false)))
                .unwrap_err();
            assert!(matches!(err, RegistryError::Reserved { .. }), "{name} accepted");
        }

        let mut registry = Registry::new();
        let err = registry
            .define_cli(CliDef::new("mycli").option(OptionDecl::new("level", "x").short('d')))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Reserved { ref name, .. } if name == "level"));
    }

    #[test]
    fn test_handler_may_reuse_cli_only_names() {
        let mut registry = Registry::new();
        registry.define_cli(CliDef::new("mycli")).unwrap();
        registry
            .define_handler(HandlerDef::new("h", "mycli").option(OptionDecl::new("config", "x")))
            .unwrap();
        let err = registry
            .define_handler(HandlerDef::new("g", "mycli").option(OptionDecl::new("help", false)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Reserved { .. }));
    }

    #[test]
    fn test_reserved_param_rejected() {
        let mut registry = Registry::new();
        let err = registry
            .define_cli(CliDef::new("mycli").command(noop("hello").arg("help", false)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Reserved { ref owner, .. } if owner == "hello"));
    }

    #[test]
    fn test_get_missing_key_is_none() {
        let registry = Registry::new();
        assert!(registry.get(&Key::new(["mycli", "nope"])).is_none());
        assert!(registry.get(&Key::root()).is_none());
        assert!(registry.cli("mycli").is_none());
    }

    #[test]
    fn test_fixture_registration() {
        let mut registry = Registry::new();
        registry
            .register_fixture(Fixture::new("db", |_s: &State| Ok(1u8)))
            .unwrap();
        assert!(registry.is_fixture("db"));
        assert!(registry
            .register_fixture(Fixture::new("db", |_s: &State| Ok(2u8)))
            .is_err());
        assert!(registry
            .get_fixture("db", &State::new())
            .unwrap()
            .is_some());
        assert!(registry
            .get_fixture("missing", &State::new())
            .unwrap()
            .is_none());
    }
}
