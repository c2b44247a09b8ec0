//! Hierarchical registry keys.
//!
//! A [`Key`] addresses one entry in the [`Registry`](crate::Registry):
//! `(cli)`, `(cli, handler)`, `(cli, command)` or `(cli, handler, command)`.
//! Keys render as dot-separated paths (`mycli.myhandler.hello`), which is
//! also the form config files and [`Context::call`](crate::Context::call)
//! use.

use std::fmt;

/// Maximum number of segments in a full registry key.
pub const MAX_DEPTH: usize = 3;

/// An ordered path of name segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Key(Vec<String>);

impl Key {
    /// The empty key. Registering under it means "context not known yet".
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a key from arbitrary segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Key of a top-level CLI.
    pub fn cli(cli: &str) -> Self {
        Self(vec![cli.to_string()])
    }

    /// Key of a handler bound under a CLI.
    pub fn handler(cli: &str, handler: &str) -> Self {
        Self(vec![cli.to_string(), handler.to_string()])
    }

    /// Parent key assembled from a cli and an optional handler name.
    pub fn parent(cli: &str, handler: Option<&str>) -> Self {
        match handler {
            Some(handler) => Self::handler(cli, handler),
            None => Self::cli(cli),
        }
    }

    /// Returns a new key with `name` appended.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Splits the key into its parent and last segment.
    ///
    /// Returns `None` for the empty key.
    pub fn split_last(&self) -> Option<(Key, &str)> {
        let (last, rest) = self.0.split_last()?;
        Some((Key(rest.to_vec()), last.as_str()))
    }

    /// The first segment, which is always the owning CLI's name.
    pub fn cli_name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses a dot-separated path string.
    ///
    /// For example, `"mycli.myhandler"` becomes `["mycli", "myhandler"]`.
    pub fn from_dotted(s: &str) -> Self {
        if s.is_empty() {
            Self::root()
        } else {
            Self(s.split('.').map(String::from).collect())
        }
    }

    /// Renders the key as a dot-separated string.
    pub fn to_dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}
