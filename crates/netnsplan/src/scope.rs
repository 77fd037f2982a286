//! Namespace scope for inspection and mutation calls.
//!
//! Every call into the command capability names the namespace it targets
//! explicitly. A scope is plain data: cloning it, storing it, or passing it to
//! two calls at once never changes where any other call runs.
//!
//! ```
//! use netnsplan::NamespaceScope;
//!
//! let root = NamespaceScope::Default;
//! let ns = NamespaceScope::named("ns1");
//!
//! assert_eq!(root.name(), None);
//! assert_eq!(ns.name(), Some("ns1"));
//! assert_eq!(ns.to_string(), "netns ns1");
//! ```

use std::fmt;

/// Where a command runs: the engine's own namespace or a named one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NamespaceScope {
    /// The default (root) namespace the process runs in.
    #[default]
    Default,
    /// A named namespace, as created by `ip netns add`.
    Named(String),
}

impl NamespaceScope {
    /// Scope for a named namespace.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Scope for an optional namespace name; `None` is the default namespace.
    pub fn from_optional(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::named(name),
            None => Self::Default,
        }
    }

    /// The namespace name, or `None` for the default namespace.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Named(name) => Some(name),
        }
    }

    /// Whether this is the default namespace.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<&str> for NamespaceScope {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default netns"),
            Self::Named(name) => write!(f, "netns {}", name),
        }
    }
}
