//! Layered configuration state.
//!
//! Configuration reaches a command through three layers, in increasing
//! precedence:
//!
//! | Layer | Source | Recorded by |
//! |-------|--------|-------------|
//! | Declared | [`Defaults`] of every container touched during resolution | dispatcher, outermost first |
//! | Config | fragments of the YAML config file keyed by the dispatch path | dispatcher, after loading |
//! | Options | parsed command-line options of each level | dispatcher, outermost first |
//!
//! # Declared defaults
//!
//! A container's [`Defaults`] is an explicit chain of [`DefaultLayer`]s,
//! ordered from the most basic (framework-provided) to the most derived (the
//! container's own declarations). Flattening walks the chain base-first, so a
//! derived layer overwrites any key a base layer declared. Names starting with
//! `_` are private and never flattened.
//!
//! # Compilation
//!
//! [`StateCompiler`] collects the three layers for one invocation and
//! [`compile`](StateCompiler::compile)s them into a single [`State`]:
//!
//! - declared snapshots apply in recorded order (a handler overrides its cli),
//! - config fragments apply in recorded order,
//! - option fragments apply in *reverse* recorded order, skipping unset values,
//!   so an absent flag never erases a value another layer already set.
//!
//! Compiling drains the compiler, so the next invocation starts clean.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fragment of parsed options. `None` marks an option the user did not set.
pub type OptionFragment = BTreeMap<String, Option<Value>>;

/// One set of declared defaults, contributed by a single declaration level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultLayer {
    owner: String,
    values: BTreeMap<String, Value>,
}

impl DefaultLayer {
    /// Creates an empty layer attributed to `owner` (used in debug output).
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            values: BTreeMap::new(),
        }
    }

    /// Declares a default value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Declares a default in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }
}

/// An ordered chain of default layers, base first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    layers: Vec<DefaultLayer>,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new chain with `layer` appended as the most derived level.
    pub fn derive(&self, layer: DefaultLayer) -> Self {
        let mut layers = self.layers.clone();
        layers.push(layer);
        Self { layers }
    }

    /// Merges every layer, base first, into one state. Most derived wins.
    pub fn flatten(&self) -> State {
        let mut state = State::new();
        for layer in &self.layers {
            tracing::trace!("flattening defaults declared by {}", layer.owner);
            for (key, value) in &layer.values {
                if key.starts_with('_') {
                    continue;
                }
                state.set(key.clone(), value.clone());
            }
        }
        state
    }

    /// Like [`flatten`](Self::flatten), then applies `overrides` for keys
    /// that some layer declares. Unknown override keys are ignored.
    pub fn flatten_with(&self, overrides: &BTreeMap<String, Value>) -> State {
        let mut state = self.flatten();
        for (key, value) in overrides {
            if state.contains(key) {
                state.set(key.clone(), value.clone());
            } else {
                tracing::warn!("ignoring override for undeclared state key '{}'", key);
            }
        }
        state
    }
}

/// A flat, read-through configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State {
    values: BTreeMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value as a string slice, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Returns the value as a bool; missing or non-bool values are `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Overwrites every key present in `other`.
    pub fn update<'a, I>(&mut self, other: I)
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        for (key, value) in other {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Overwrites keys from an option fragment, skipping unset values.
    pub fn update_set(&mut self, fragment: &OptionFragment) {
        for (key, value) in fragment {
            if let Some(value) = value {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.values) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "{:?}", self.values),
        }
    }
}

impl FromIterator<(String, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Collects state layers for one invocation and compiles them.
#[derive(Debug, Default)]
pub struct StateCompiler {
    states: Vec<State>,
    configs: Vec<State>,
    options: Vec<OptionFragment>,
}

impl StateCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a declared-defaults snapshot.
    pub fn add_state(&mut self, state: State) {
        self.states.push(state);
    }

    /// Records a config-file fragment.
    pub fn add_config(&mut self, config: State) {
        self.configs.push(config);
    }

    /// Records a parsed-option fragment.
    pub fn add_options(&mut self, options: OptionFragment) {
        self.options.push(options);
    }

    /// Returns true if nothing has been recorded since the last compile.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.configs.is_empty() && self.options.is_empty()
    }

    /// Merges all recorded layers into one state and clears the compiler.
    pub fn compile(&mut self) -> State {
        let mut compiled = State::new();

        for state in std::mem::take(&mut self.states) {
            compiled.update(state.iter());
        }

        for config in std::mem::take(&mut self.configs) {
            compiled.update(config.iter());
        }

        for options in std::mem::take(&mut self.options).iter().rev() {
            compiled.update_set(options);
        }

        tracing::debug!("compiled state with {} keys", compiled.len());
        compiled
    }
}
