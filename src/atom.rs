//! Mask-atom parsing and matching
//!
//! Implements atoms as written in mask and keyword files:
//! - `category/package`
//! - `>=category/package-1.0`, `~category/package-1.2`
//! - `=category/package-1.2*` (segment-wise prefix match)
//! - `@set-name` (targets a package set instead of a package)

use crate::types::PackageId;
use crate::version::Version;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskOp {
    /// No version constraint
    Any,
    /// Exact version match (=)
    Equal,
    /// Version prefix match (=...*)
    GlobEqual,
    /// Greater than (>)
    Greater,
    /// Greater than or equal (>=)
    GreaterEqual,
    /// Less than (<)
    Less,
    /// Less than or equal (<=)
    LessEqual,
    /// Equal up to revision (~)
    Tilde,
}

impl Default for MaskOp {
    fn default() -> Self {
        Self::Any
    }
}

/// What an atom applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleTarget {
    /// One package identity
    Package(PackageId),
    /// A named package set (written `@name`)
    Set(String),
}

/// A parsed mask atom: operator, target and optional version pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskAtom {
    /// Version operator
    pub op: MaskOp,
    /// Package or set this atom applies to
    pub target: RuleTarget,
    /// Version pattern (present for every operator except `Any`)
    pub version: Option<Version>,
}

impl MaskAtom {
    /// Create an unversioned atom for a package
    pub fn package(id: PackageId) -> Self {
        Self {
            op: MaskOp::Any,
            target: RuleTarget::Package(id),
            version: None,
        }
    }

    /// The package identity, when the target is a package
    pub fn package_id(&self) -> Option<&PackageId> {
        match &self.target {
            RuleTarget::Package(id) => Some(id),
            RuleTarget::Set(_) => None,
        }
    }

    /// Evaluate the version constraint against a candidate
    pub fn matches_version(&self, candidate: &Version) -> bool {
        let pattern = match &self.version {
            Some(pattern) => pattern,
            None => return true,
        };
        match self.op {
            MaskOp::Any => true,
            MaskOp::Equal => candidate == pattern,
            MaskOp::GlobEqual => pattern.is_prefix_of(candidate),
            MaskOp::Greater => candidate > pattern,
            MaskOp::GreaterEqual => candidate >= pattern,
            MaskOp::Less => candidate < pattern,
            MaskOp::LessEqual => candidate <= pattern,
            MaskOp::Tilde => {
                Version::compare_tilde(candidate, pattern) == std::cmp::Ordering::Equal
            }
        }
    }
}

impl FromStr for MaskAtom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAtom("empty atom".to_string()));
        }

        // Set targets carry no operator or version.
        if let Some(name) = s.strip_prefix('@') {
            if name.is_empty() {
                return Err(Error::InvalidAtom(s.to_string()));
            }
            return Ok(MaskAtom {
                op: MaskOp::Any,
                target: RuleTarget::Set(name.to_string()),
                version: None,
            });
        }

        let mut remaining = s;

        // Parse operator
        let mut op = if remaining.starts_with(">=") {
            remaining = &remaining[2..];
            MaskOp::GreaterEqual
        } else if remaining.starts_with("<=") {
            remaining = &remaining[2..];
            MaskOp::LessEqual
        } else if remaining.starts_with('>') {
            remaining = &remaining[1..];
            MaskOp::Greater
        } else if remaining.starts_with('<') {
            remaining = &remaining[1..];
            MaskOp::Less
        } else if remaining.starts_with('~') {
            remaining = &remaining[1..];
            MaskOp::Tilde
        } else if remaining.starts_with('=') {
            remaining = &remaining[1..];
            MaskOp::Equal
        } else {
            MaskOp::Any
        };

        if op == MaskOp::Equal && remaining.ends_with('*') {
            op = MaskOp::GlobEqual;
            remaining = &remaining[..remaining.len() - 1];
        }

        let slash_idx = remaining
            .find('/')
            .ok_or_else(|| Error::InvalidAtom(format!("missing category: {}", s)))?;
        let category = &remaining[..slash_idx];
        let name_version = &remaining[slash_idx + 1..];

        // Version starts at the last '-' followed by a digit.
        let (name, version) = if op != MaskOp::Any {
            let bytes = name_version.as_bytes();
            let split = (0..bytes.len().saturating_sub(1))
                .rev()
                .find(|&i| bytes[i] == b'-' && bytes[i + 1].is_ascii_digit());
            match split {
                Some(idx) => {
                    let version = Version::parse(&name_version[idx + 1..])?;
                    (&name_version[..idx], Some(version))
                }
                None => {
                    return Err(Error::InvalidAtom(format!(
                        "operator without version: {}",
                        s
                    )))
                }
            }
        } else {
            (name_version, None)
        };

        if category.is_empty() || name.is_empty() {
            return Err(Error::InvalidAtom(s.to_string()));
        }

        Ok(MaskAtom {
            op,
            target: RuleTarget::Package(PackageId::new(category, name)),
            version,
        })
    }
}

impl fmt::Display for MaskAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            MaskOp::Any => {}
            MaskOp::Equal | MaskOp::GlobEqual => write!(f, "=")?,
            MaskOp::Greater => write!(f, ">")?,
            MaskOp::GreaterEqual => write!(f, ">=")?,
            MaskOp::Less => write!(f, "<")?,
            MaskOp::LessEqual => write!(f, "<=")?,
            MaskOp::Tilde => write!(f, "~")?,
        }
        match &self.target {
            RuleTarget::Package(id) => write!(f, "{}", id)?,
            RuleTarget::Set(name) => write!(f, "@{}", name)?,
        }
        if let Some(ref version) = self.version {
            write!(f, "-{}", version)?;
        }
        if self.op == MaskOp::GlobEqual {
            write!(f, "*")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_atom() {
        let atom: MaskAtom = "sys-apps/portage".parse().unwrap();
        assert_eq!(atom.op, MaskOp::Any);
        assert_eq!(
            atom.package_id(),
            Some(&PackageId::new("sys-apps", "portage"))
        );
        assert!(atom.version.is_none());
    }

    #[test]
    fn test_parse_versioned_atoms() {
        let cases = [
            (">=app-misc/demo-1.0", MaskOp::GreaterEqual),
            ("<=app-misc/demo-1.0", MaskOp::LessEqual),
            (">app-misc/demo-1.0", MaskOp::Greater),
            ("<app-misc/demo-1.0", MaskOp::Less),
            ("=app-misc/demo-1.0", MaskOp::Equal),
            ("=app-misc/demo-1.0*", MaskOp::GlobEqual),
            ("~app-misc/demo-1.0", MaskOp::Tilde),
        ];
        for (text, op) in cases {
            let atom: MaskAtom = text.parse().unwrap();
            assert_eq!(atom.op, op, "for {}", text);
            assert_eq!(atom.version.as_ref().unwrap().as_str(), "1.0");
        }
    }

    #[test]
    fn test_parse_hyphenated_name() {
        let atom: MaskAtom = "=dev-libs/libfoo-bar-2.1-r1".parse().unwrap();
        assert_eq!(atom.package_id().unwrap().name, "libfoo-bar");
        assert_eq!(atom.version.unwrap().as_str(), "2.1-r1");
    }

    #[test]
    fn test_parse_set_target() {
        let atom: MaskAtom = "@world".parse().unwrap();
        assert_eq!(atom.target, RuleTarget::Set("world".to_string()));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<MaskAtom>().is_err());
        assert!("portage".parse::<MaskAtom>().is_err());
        assert!(">=sys-apps/portage".parse::<MaskAtom>().is_err());
        assert!("=sys-apps/portage-xyz".parse::<MaskAtom>().is_err());
        assert!("@".parse::<MaskAtom>().is_err());
    }

    #[test]
    fn test_match_operators() {
        let v = |s: &str| Version::parse(s).unwrap();
        let ge: MaskAtom = ">=app-misc/demo-1.2".parse().unwrap();
        assert!(ge.matches_version(&v("1.2")));
        assert!(ge.matches_version(&v("1.10")));
        assert!(!ge.matches_version(&v("1.1")));

        let tilde: MaskAtom = "~app-misc/demo-1.2".parse().unwrap();
        assert!(tilde.matches_version(&v("1.2-r3")));
        assert!(tilde.matches_version(&v("1.2")));
        assert!(!tilde.matches_version(&v("1.2.1")));

        let glob: MaskAtom = "=app-misc/demo-1.2*".parse().unwrap();
        assert!(glob.matches_version(&v("1.2.5")));
        assert!(glob.matches_version(&v("1.2")));
        assert!(!glob.matches_version(&v("1.20")));
    }

    #[test]
    fn test_atom_display_roundtrip() {
        for text in [
            "sys-apps/portage",
            ">=app-misc/demo-1.0",
            "=app-misc/demo-1.0*",
            "~app-misc/demo-1.2-r1",
            "@system",
        ] {
            let atom: MaskAtom = text.parse().unwrap();
            assert_eq!(atom.to_string(), text);
        }
    }
}
