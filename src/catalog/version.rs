//! # Dotted three-component client versions.
//!
//! [`Version`] orders lexicographically over `(major, minor, patch)`; a client
//! is eligible for an entry iff `client <= bound`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// `major.minor.patch`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "[u32; 3]", into = "[u32; 3]")]
pub struct Version {
    /// Most significant component.
    pub major: u32,
    /// Middle component.
    pub minor: u32,
    /// Least significant component.
    pub patch: u32,
}

impl Version {
    /// Builds a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Eligibility rule: a client at `self` sees entries whose bound is `>= self`.
    ///
    /// ```
    /// use pushvisor::catalog::Version;
    ///
    /// let bound = Version::new(6, 2, 1);
    /// assert!(Version::new(6, 2, 0).is_eligible_for(bound));
    /// assert!(Version::new(5, 9, 9).is_eligible_for(bound));
    /// assert!(!Version::new(6, 3, 0).is_eligible_for(bound));
    /// ```
    #[inline]
    pub fn is_eligible_for(self, bound: Version) -> bool {
        self <= bound
    }
}

impl From<[u32; 3]> for Version {
    fn from([major, minor, patch]: [u32; 3]) -> Self {
        Self::new(major, minor, patch)
    }
}

impl From<Version> for [u32; 3] {
    fn from(v: Version) -> Self {
        [v.major, v.minor, v.patch]
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::Components {
                input: input.to_string(),
                found: parts.len(),
            });
        }
        let mut out = [0u32; 3];
        for (slot, part) in out.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| VersionError::NotNumeric {
                input: input.to_string(),
                component: (*part).to_string(),
            })?;
        }
        Ok(Version::from(out))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
