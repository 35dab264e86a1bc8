//! Component identity
//!
//! A [`ComponentKey`] pairs a [`TypeTag`] (which kind of component) with a
//! [`Discriminator`] (which instance of that kind). The tag keeps two kinds
//! that share a discriminator from colliding.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Stable name for a component kind, supplied by the component author
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeTag(&'static str);

impl TypeTag {
    /// Create tag from a static name
    #[inline]
    #[must_use]
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    /// Tag declared by a component kind
    #[inline]
    #[must_use]
    pub fn of<T: crate::ComponentKind>() -> Self {
        Self(T::TYPE_TAG)
    }

    /// Get tag name
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Call-site identity used when the caller has no explicit key
///
/// Only unique per source location: a call site reached repeatedly (loops,
/// shared helpers) yields the same id every time and must pass an explicit
/// key instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionalId(u64);

impl PositionalId {
    /// Identity of the caller's source location
    #[track_caller]
    #[inline]
    #[must_use]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    /// Identity of a specific source location
    #[must_use]
    pub fn from_location(location: &Location<'_>) -> Self {
        let mut hasher = DefaultHasher::new();
        location.file().hash(&mut hasher);
        location.line().hash(&mut hasher);
        location.column().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Wrap an identifier produced by a host runtime (e.g. a composition group key)
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier
    #[inline]
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Instance part of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Discriminator {
    /// Key chosen by the caller
    Explicit(Arc<str>),
    /// Tree position supplied by the host
    Positional(PositionalId),
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(key) => f.write_str(key),
            Self::Positional(id) => write!(f, "#{:016x}", id.raw()),
        }
    }
}

/// Identity of a retained component within one store
///
/// Equal iff both the type tag and the discriminator match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    tag: TypeTag,
    discriminator: Discriminator,
}

impl ComponentKey {
    /// Key with an explicit discriminator
    #[must_use]
    pub fn explicit(tag: TypeTag, key: impl Into<Arc<str>>) -> Self {
        Self {
            tag,
            discriminator: Discriminator::Explicit(key.into()),
        }
    }

    /// Key with a positional discriminator
    #[inline]
    #[must_use]
    pub fn positional(tag: TypeTag, id: PositionalId) -> Self {
        Self {
            tag,
            discriminator: Discriminator::Positional(id),
        }
    }

    /// Derive a key: the explicit key wins, the positional id is the fallback
    #[must_use]
    pub fn derive(tag: TypeTag, explicit: Option<&str>, fallback: PositionalId) -> Self {
        match explicit {
            Some(key) => Self::explicit(tag, key),
            None => Self::positional(tag, fallback),
        }
    }

    /// Component kind
    #[inline]
    #[must_use]
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Instance discriminator
    #[inline]
    #[must_use]
    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    /// Whether the key uses a positional discriminator
    #[inline]
    #[must_use]
    pub fn is_positional(&self) -> bool {
        matches!(self.discriminator, Discriminator::Positional(_))
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.discriminator)
    }
}
