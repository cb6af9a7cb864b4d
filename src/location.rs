//! Symbolic certificate store locations.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Closed set of store scopes. Adding one is a code change, not config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    /// Current-user personal store.
    #[default]
    User,
    /// Local-machine personal store.
    Machine,
}

/// Provider path of a certificate store (e.g. `Cert:\CurrentUser\My`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreAddress(&'static str);

impl StoreAddress {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl StoreLocation {
    pub const ALL: [StoreLocation; 2] = [StoreLocation::User, StoreLocation::Machine];

    /// Map a symbol onto a location. Unknown symbols, including "", fail.
    pub fn resolve(symbol: &str) -> Result<Self> {
        match symbol {
            "user" => Ok(StoreLocation::User),
            "machine" => Ok(StoreLocation::Machine),
            other => Err(Error::InvalidStoreLocation(other.to_string())),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            StoreLocation::User => "user",
            StoreLocation::Machine => "machine",
        }
    }

    pub fn address(&self) -> StoreAddress {
        match self {
            StoreLocation::User => StoreAddress(r"Cert:\CurrentUser\My"),
            StoreLocation::Machine => StoreAddress(r"Cert:\LocalMachine\My"),
        }
    }
}

/// Resolve a symbol straight to its store address.
pub fn resolve(symbol: &str) -> Result<StoreAddress> {
    StoreLocation::resolve(symbol).map(|l| l.address())
}

impl FromStr for StoreLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
