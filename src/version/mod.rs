//! Package version model
//!
//! Parses free-form version strings like `1.2.3b_alpha4-r1` into an ordered
//! sequence of typed parts and compares them:
//! - primary numeric components (`1.2.3`)
//! - a single trailing letter (`1.2b`)
//! - release-stage suffixes (`_alpha`, `_beta`, `_pre`, `_rc`) and patch
//!   suffixes (`_pN`)
//! - revision suffixes (`-rN`), which the tilde comparison ignores
//!
//! Two entry points exist: [`Version::parse`] rejects any trailing text,
//! [`Version::parse_lenient`] captures it as a garbage part so that every
//! string stays comparable.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Kind of one version part.
///
/// Declaration order is the primary sort key: when two versions diverge at a
/// part, the part with the smaller kind sorts first. `First` is a sentinel
/// above all real parts and is never produced by parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PartKind {
    /// Unparseable trailing text, tolerated by lenient parsing
    Garbage,
    /// `_alpha` suffix
    Alpha,
    /// `_beta` suffix
    Beta,
    /// `_pre` suffix
    Pre,
    /// `_rc` suffix
    Rc,
    /// First `-rN` suffix
    Revision,
    /// Second and later `-rN` suffixes
    InterRev,
    /// `_pN` suffix
    Patch,
    /// Single trailing letter (`1.2b`)
    Character,
    /// Numeric primary component
    Primary,
    /// Sentinel above all real parts
    First,
}

/// One typed fragment of a version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionPart {
    /// Part kind, the primary comparison key
    pub kind: PartKind,
    /// Raw captured substring (digits for numeric parts)
    pub content: String,
}

impl VersionPart {
    /// Create a new part
    pub fn new(kind: PartKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Compare two parts: kind first, then content.
    ///
    /// Numeric contents compare by integer magnitude ignoring leading zeros;
    /// when magnitudes tie, the form with the literal leading zero sorts
    /// first. Non-numeric contents compare lexically.
    pub fn compare(left: &VersionPart, right: &VersionPart) -> Ordering {
        match left.kind.cmp(&right.kind) {
            Ordering::Equal => compare_content(&left.content, &right.content),
            other => other,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Content comparison used once two parts agree on kind.
fn compare_content(left: &str, right: &str) -> Ordering {
    if is_digits(left) && is_digits(right) {
        let l = left.trim_start_matches('0');
        let r = right.trim_start_matches('0');
        // Magnitude: longer stripped run is larger, then lexical on digits.
        match l.len().cmp(&r.len()).then_with(|| l.cmp(r)) {
            // Equal magnitude: the literal leading zero sorts first.
            Ordering::Equal => right.len().cmp(&left.len()),
            other => other,
        }
    } else {
        left.cmp(right)
    }
}

/// A parsed version: an ordered, immutable sequence of [`VersionPart`].
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct Version {
    parts: Vec<VersionPart>,
    text: String,
}

impl Version {
    /// Parse a version string, rejecting any non-conforming tail.
    pub fn parse(text: &str) -> Result<Self> {
        let (version, rest) = Self::parse_inner(text)?;
        if !rest.is_empty() {
            return Err(Error::InvalidVersion {
                version: text.to_string(),
                detail: format!("unexpected trailing text: {:?}", rest),
            });
        }
        Ok(version)
    }

    /// Parse a version string, capturing any non-conforming tail as a
    /// trailing garbage part. Never fails; [`Version::has_garbage`] reports
    /// whether the tail was tolerated.
    pub fn parse_lenient(text: &str) -> Self {
        match Self::parse_inner(text) {
            Ok((mut version, rest)) => {
                if !rest.is_empty() {
                    version.parts.push(VersionPart::new(PartKind::Garbage, rest));
                }
                version
            }
            // No leading digit at all: the whole string is garbage.
            Err(_) => Version {
                parts: vec![VersionPart::new(PartKind::Garbage, text)],
                text: text.to_string(),
            },
        }
    }

    /// Parse the conforming prefix, returning the version and the unconsumed
    /// tail.
    fn parse_inner(text: &str) -> Result<(Self, String)> {
        let bytes = text.as_bytes();
        let mut parts = Vec::new();
        let mut pos = 0;

        // Primary components: digit runs separated by '.' or '_', where the
        // separator only continues the run if a digit follows.
        let first = take_digits(bytes, pos);
        if first == pos {
            return Err(Error::InvalidVersion {
                version: text.to_string(),
                detail: "version must start with a digit".to_string(),
            });
        }
        parts.push(VersionPart::new(PartKind::Primary, &text[pos..first]));
        pos = first;
        while pos < bytes.len()
            && (bytes[pos] == b'.' || bytes[pos] == b'_')
            && pos + 1 < bytes.len()
            && bytes[pos + 1].is_ascii_digit()
        {
            let start = pos + 1;
            let end = take_digits(bytes, start);
            parts.push(VersionPart::new(PartKind::Primary, &text[start..end]));
            pos = end;
        }

        // Single trailing letter, only when not opening a longer word.
        if pos < bytes.len()
            && bytes[pos].is_ascii_alphabetic()
            && !bytes
                .get(pos + 1)
                .map(|b| b.is_ascii_alphanumeric())
                .unwrap_or(false)
        {
            parts.push(VersionPart::new(PartKind::Character, &text[pos..pos + 1]));
            pos += 1;
        }

        // One release-stage suffix: _alpha, _beta, _pre or _rc plus digits.
        if bytes.get(pos) == Some(&b'_') {
            let rest = &text[pos + 1..];
            let stage = [
                ("alpha", PartKind::Alpha),
                ("beta", PartKind::Beta),
                ("pre", PartKind::Pre),
                ("rc", PartKind::Rc),
            ]
            .iter()
            .find(|(word, _)| rest.starts_with(word))
            .copied();
            if let Some((word, kind)) = stage {
                let start = pos + 1 + word.len();
                let end = take_digits(bytes, start);
                parts.push(VersionPart::new(kind, &text[start..end]));
                pos = end;
            }
        }

        // Patch suffix: _p plus digits.
        if bytes.get(pos) == Some(&b'_')
            && bytes.get(pos + 1) == Some(&b'p')
            && bytes
                .get(pos + 2)
                .map(|b| b.is_ascii_digit())
                .unwrap_or(false)
        {
            let start = pos + 2;
            let end = take_digits(bytes, start);
            parts.push(VersionPart::new(PartKind::Patch, &text[start..end]));
            pos = end;
        }

        // Revision suffixes: -rN, stacked ones become InterRev.
        let mut revision_seen = false;
        while bytes.get(pos) == Some(&b'-')
            && bytes.get(pos + 1) == Some(&b'r')
            && bytes
                .get(pos + 2)
                .map(|b| b.is_ascii_digit())
                .unwrap_or(false)
        {
            let start = pos + 2;
            let end = take_digits(bytes, start);
            let kind = if revision_seen {
                PartKind::InterRev
            } else {
                PartKind::Revision
            };
            parts.push(VersionPart::new(kind, &text[start..end]));
            revision_seen = true;
            pos = end;
        }

        Ok((
            Version {
                parts,
                text: text.to_string(),
            },
            text[pos..].to_string(),
        ))
    }

    /// The typed parts, in order
    pub fn parts(&self) -> &[VersionPart] {
        &self.parts
    }

    /// The original version text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the lenient parser tolerated a non-conforming tail
    pub fn has_garbage(&self) -> bool {
        self.parts
            .last()
            .map(|p| p.kind == PartKind::Garbage)
            .unwrap_or(false)
    }

    /// The version text without its revision suffixes
    pub fn plain(&self) -> &str {
        match self.text.find("-r") {
            Some(idx) if self.has_revision() => &self.text[..idx],
            _ => &self.text,
        }
    }

    /// The revision suffix text (empty when no revision is present)
    pub fn revision(&self) -> &str {
        match self.text.find("-r") {
            Some(idx) if self.has_revision() => &self.text[idx..],
            _ => "",
        }
    }

    fn has_revision(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p.kind, PartKind::Revision | PartKind::InterRev))
    }

    /// Full comparison, revision parts included.
    ///
    /// A missing trailing revision counts as revision zero, so `1.2` and
    /// `1.2-r0` compare equal while `1.2 < 1.2-r1`.
    pub fn compare(left: &Version, right: &Version) -> Ordering {
        compare_parts(left.parts.iter(), right.parts.iter())
    }

    /// Comparison with all revision parts ignored on both sides; `1.2-r1`
    /// and `1.2-r5` compare equal.
    pub fn compare_tilde(left: &Version, right: &Version) -> Ordering {
        let skip =
            |p: &&VersionPart| !matches!(p.kind, PartKind::Revision | PartKind::InterRev);
        compare_parts(
            left.parts.iter().filter(skip),
            right.parts.iter().filter(skip),
        )
    }

    /// Whether this version's parts are a segment-wise prefix of `other`'s,
    /// used by the `=...*` wildcard operator.
    pub fn is_prefix_of(&self, other: &Version) -> bool {
        if self.parts.len() > other.parts.len() {
            return false;
        }
        self.parts
            .iter()
            .zip(other.parts.iter())
            .all(|(l, r)| VersionPart::compare(l, r) == Ordering::Equal)
    }
}

/// Pairwise walk over two part sequences.
fn compare_parts<'a>(
    mut left: impl Iterator<Item = &'a VersionPart>,
    mut right: impl Iterator<Item = &'a VersionPart>,
) -> Ordering {
    let mut l = left.next();
    let mut r = right.next();
    loop {
        match (l, r) {
            (None, None) => return Ordering::Equal,
            (None, Some(part)) => match exhausted_side(part) {
                Some(order) => return order,
                // Implicit revision zero on the left: skip the right's
                // zero revision and keep walking.
                None => r = right.next(),
            },
            (Some(part), None) => match exhausted_side(part) {
                Some(order) => return order.reverse(),
                None => l = left.next(),
            },
            (Some(lp), Some(rp)) => {
                match VersionPart::compare(lp, rp) {
                    Ordering::Equal => {
                        l = left.next();
                        r = right.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

/// Ordering of an exhausted sequence against the other side's next part.
///
/// Returns the exhausted side's ordering, or `None` when the part is a zero
/// revision and the walk should continue past it.
fn exhausted_side(part: &VersionPart) -> Option<Ordering> {
    match part.kind {
        PartKind::Revision | PartKind::InterRev => {
            if part.content.bytes().all(|b| b == b'0') {
                None
            } else {
                Some(Ordering::Less)
            }
        }
        // Pre-release suffixes and garbage sort below a bare version.
        kind if kind < PartKind::Revision => Some(Ordering::Greater),
        _ => Some(Ordering::Less),
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        Version::compare(self, other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        Version::compare(self, other)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn take_digits(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}
