//! Core type definitions: package identity, per-version status flags and
//! redundancy diagnostics.
//!
//! These records are produced by an external tree reader; rule application
//! mutates the status flags in place and nothing else.

use crate::version::Version;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique package identifier: category + name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    /// Package category (e.g., "sys-apps")
    pub category: String,
    /// Package name (e.g., "systemd")
    pub name: String,
}

impl PackageId {
    /// Create a new package ID
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Get the full package name (category/name)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Parse a "category/name" string
    pub fn parse(s: &str) -> Result<Self> {
        let mut split = s.split('/');
        match (split.next(), split.next(), split.next()) {
            (Some(category), Some(name), None) if !category.is_empty() && !name.is_empty() => {
                Ok(Self::new(category, name))
            }
            _ => Err(Error::InvalidPackageId(s.to_string())),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// Bitmask of redundancy diagnostics on a version.
///
/// A bit is set when a rule of that kind fired somewhere in the package but
/// produced no effect on this version, surfacing user-authored rules that no
/// longer change any outcome.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Redundant(pub u8);

impl Redundant {
    /// No redundancy checks / no diagnostics
    pub const NOTHING: Redundant = Redundant(0);
    /// Mask rule with no effect
    pub const MASK: Redundant = Redundant(1 << 0);
    /// Unmask rule with no effect
    pub const UNMASK: Redundant = Redundant(1 << 1);
    /// Keyword-accept rule with no effect
    pub const KEYWORDS: Redundant = Redundant(1 << 2);
    /// Entry staged twice without an intervening retraction
    pub const DOUBLE: Redundant = Redundant(1 << 3);
    /// All diagnostics
    pub const ALL: Redundant = Redundant(0b1111);

    /// Set the given bits
    pub fn set(&mut self, other: Redundant) {
        self.0 |= other.0;
    }

    /// Whether all of the given bits are set
    pub fn contains(&self, other: Redundant) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Redundant {
    type Output = Redundant;

    fn bitor(self, rhs: Redundant) -> Redundant {
        Redundant(self.0 | rhs.0)
    }
}

/// Mutable per-version status, set by rule application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStatus {
    /// A mask rule matched this version
    pub masked: bool,
    /// An unmask rule matched this version
    pub unmasked: bool,
    /// Accepted-keyword strings from matching keyword rules
    pub accepted_keywords: Vec<String>,
    /// Redundancy diagnostics
    pub redundant: Redundant,
}

impl VersionStatus {
    /// Whether any keyword rule accepted this version
    pub fn keywords_accepted(&self) -> bool {
        !self.accepted_keywords.is_empty()
    }
}

/// One version of a package, as read from the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInst {
    /// The parsed version
    pub version: Version,
    /// Source repository this version came from, when known
    pub repo: Option<String>,
    /// Status flags set by rule application
    pub status: VersionStatus,
}

impl VersionInst {
    /// Create a version instance with clean status
    pub fn new(version: Version) -> Self {
        Self {
            version,
            repo: None,
            status: VersionStatus::default(),
        }
    }

    /// Set the source repository
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }
}

/// A package and its known versions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Package identity
    pub id: PackageId,
    /// Known versions, in tree-reader order until sorted
    pub versions: Vec<VersionInst>,
}

impl Package {
    /// Create a package with no versions
    pub fn new(id: PackageId) -> Self {
        Self {
            id,
            versions: Vec::new(),
        }
    }

    /// Add a version
    pub fn add_version(&mut self, version: VersionInst) {
        self.versions.push(version);
    }

    /// Sort versions ascending by the full version order
    pub fn sort_versions(&mut self) {
        self.versions.sort_by(|a, b| Version::compare(&a.version, &b.version));
    }

    /// Find a version by its text
    pub fn version(&self, text: &str) -> Option<&VersionInst> {
        self.versions.iter().find(|v| v.version.as_str() == text)
    }
}
