//! Capability checks for protocol operations.
//!
//! Callers carry a set of named capabilities, each granting read and/or
//! write access. Queries need read access to the configured capability;
//! mutations (marker updates, trim) need write access.
//!
//! ## Capability Strings
//!
//! Capabilities are written as `name=perms` pairs separated by `;`, where
//! `perms` is `*` or a comma-separated list of `read` and `write`:
//!
//! ```text
//! sip=read, write; usage=read
//! ```

use crate::error::{ServerError, ServerResult};
use std::collections::HashMap;
use std::fmt;

/// Access level required by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Perm {
    /// Read-only access.
    Read,
    /// Mutating access.
    Write,
}

impl fmt::Display for Perm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perm::Read => f.write_str("read"),
            Perm::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Grant {
    read: bool,
    write: bool,
}

impl Grant {
    fn allows(&self, perm: Perm) -> bool {
        match perm {
            Perm::Read => self.read,
            Perm::Write => self.write,
        }
    }
}

/// Capabilities held by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserCaps {
    grants: HashMap<String, Grant>,
}

impl UserCaps {
    /// Creates an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `perm` on capability `name`.
    pub fn grant(mut self, name: impl Into<String>, perm: Perm) -> Self {
        let grant = self.grants.entry(name.into()).or_default();
        match perm {
            Perm::Read => grant.read = true,
            Perm::Write => grant.write = true,
        }
        self
    }

    /// Parses a capability string such as `sip=read,write;usage=*`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] for a malformed pair or an
    /// unknown permission.
    pub fn parse(spec: &str) -> ServerResult<Self> {
        let mut caps = Self::new();

        for pair in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, perms) = pair
                .split_once('=')
                .ok_or_else(|| ServerError::InvalidRequest(format!("malformed cap: {pair:?}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ServerError::InvalidRequest(format!(
                    "missing cap name in {pair:?}"
                )));
            }

            for perm in perms.split(',').map(str::trim) {
                caps = match perm {
                    "*" => caps.grant(name, Perm::Read).grant(name, Perm::Write),
                    "read" => caps.grant(name, Perm::Read),
                    "write" => caps.grant(name, Perm::Write),
                    other => {
                        return Err(ServerError::InvalidRequest(format!(
                            "unknown permission {other:?} for cap {name}"
                        )))
                    }
                };
            }
        }

        Ok(caps)
    }

    /// Returns true if `perm` is granted on capability `name`.
    pub fn allows(&self, name: &str, perm: Perm) -> bool {
        self.grants.get(name).is_some_and(|g| g.allows(perm))
    }

    /// Checks that `perm` is granted on capability `name`.
    pub fn check_cap(&self, name: &str, perm: Perm) -> ServerResult<()> {
        if self.allows(name, perm) {
            Ok(())
        } else {
            Err(ServerError::NotAuthorized(format!("{name}={perm} required")))
        }
    }
}
