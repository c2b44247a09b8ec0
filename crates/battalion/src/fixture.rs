//! Fixtures: named factories that fill specially-named command parameters.
//!
//! A command parameter whose name matches a registered fixture is never
//! parsed from argv. Right before the command runs, the fixture's factory is
//! called with the compiled [`State`] and its product is handed to the
//! command through [`Args::fixture`](crate::Args::fixture).
//!
//! Memoizing fixtures build their value once per [`FixtureSet`] (which lives
//! as long as the registry, i.e. the process) and hand out the same `Rc` on
//! every later request; the cache is not invalidated between dispatches.
//!
//! ```rust
//! use battalion::{Fixture, FixtureSet, State};
//!
//! struct Db { url: String }
//!
//! let mut fixtures = FixtureSet::new();
//! fixtures.register(Fixture::memoized("db", |state: &State| {
//!     Ok(Db { url: state.get_str("db_url").unwrap_or("sqlite::memory:").to_string() })
//! })).unwrap();
//!
//! let state = State::new();
//! let first = fixtures.get("db", &state).unwrap().unwrap();
//! let second = fixtures.get("db", &state).unwrap().unwrap();
//! assert!(std::rc::Rc::ptr_eq(&first, &second));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::error::RegistryError;
use crate::state::State;

/// The type-erased product of a fixture factory.
pub type FixtureValue = Rc<dyn Any>;

type FactoryFn = Rc<dyn Fn(&State) -> anyhow::Result<FixtureValue>>;

/// A named factory, optionally memoized.
#[derive(Clone)]
pub struct Fixture {
    name: String,
    memoize: bool,
    factory: FactoryFn,
}

impl Fixture {
    /// A fixture whose factory runs on every use.
    pub fn new<F, T>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&State) -> anyhow::Result<T> + 'static,
        T: 'static,
    {
        Self {
            name: name.into(),
            memoize: false,
            factory: Rc::new(move |state| Ok(Rc::new(factory(state)?) as FixtureValue)),
        }
    }

    /// A fixture whose factory runs once; later uses get the cached value.
    pub fn memoized<F, T>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&State) -> anyhow::Result<T> + 'static,
        T: 'static,
    {
        Self {
            memoize: true,
            ..Self::new(name, factory)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_memoized(&self) -> bool {
        self.memoize
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("name", &self.name)
            .field("memoize", &self.memoize)
            .finish_non_exhaustive()
    }
}

/// The fixture sub-registry plus its memoization side-table.
#[derive(Default)]
pub struct FixtureSet {
    fixtures: BTreeMap<String, Fixture>,
    cache: RefCell<HashMap<String, FixtureValue>>,
}

impl FixtureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixture. Each name may be registered once.
    pub fn register(&mut self, fixture: Fixture) -> Result<(), RegistryError> {
        tracing::debug!("registering fixture \"{}\"", fixture.name);
        if self.fixtures.contains_key(&fixture.name) {
            return Err(RegistryError::DuplicateFixture(fixture.name));
        }
        self.fixtures.insert(fixture.name.clone(), fixture);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    /// Produces the fixture's value for `state`.
    ///
    /// Returns `Ok(None)` if no fixture is registered under `name`.
    pub fn get(&self, name: &str, state: &State) -> anyhow::Result<Option<FixtureValue>> {
        let Some(fixture) = self.fixtures.get(name) else {
            return Ok(None);
        };

        if fixture.memoize {
            if let Some(cached) = self.cache.borrow().get(name) {
                return Ok(Some(Rc::clone(cached)));
            }
        }

        let value = (fixture.factory)(state)?;
        if fixture.memoize {
            self.cache
                .borrow_mut()
                .insert(name.to_string(), Rc::clone(&value));
        }
        Ok(Some(value))
    }
}

impl fmt::Debug for FixtureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSet")
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}
