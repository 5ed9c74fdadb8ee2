//! Rule types and the generic rule container
//!
//! Implements layered package availability control:
//! - mask / unmask rules hide or re-reveal versions
//! - keyword-accept rules broaden the accepted-keyword set, globally or per
//!   package
//! - redundancy diagnostics flag rules that no longer change any outcome
//!
//! [`RuleSet`] is one container generic over the rule type, instantiated per
//! rule kind; there is no virtual dispatch across kinds.

use crate::atom::{MaskAtom, RuleTarget};
use crate::types::{Package, PackageId, Redundant, VersionInst};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kind of a policy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Hide matching versions (package.mask)
    Mask,
    /// Re-reveal matching versions (package.unmask)
    Unmask,
    /// Accept keywords globally for matching versions
    AcceptKeywords,
    /// Accept keywords for one package (package.keywords)
    PackageKeywords,
}

impl RuleKind {
    /// The redundancy bit tracking this kind
    pub fn redundant_bit(self) -> Redundant {
        match self {
            RuleKind::Mask => Redundant::MASK,
            RuleKind::Unmask => Redundant::UNMASK,
            RuleKind::AcceptKeywords | RuleKind::PackageKeywords => Redundant::KEYWORDS,
        }
    }

    /// Whether this kind's status flag is set on a version
    fn flag_set(self, inst: &VersionInst) -> bool {
        match self {
            RuleKind::Mask => inst.status.masked,
            RuleKind::Unmask => inst.status.unmasked,
            RuleKind::AcceptKeywords | RuleKind::PackageKeywords => {
                inst.status.keywords_accepted()
            }
        }
    }

    const ALL: [RuleKind; 4] = [
        RuleKind::Mask,
        RuleKind::Unmask,
        RuleKind::AcceptKeywords,
        RuleKind::PackageKeywords,
    ];
}

/// One immutable policy rule.
///
/// A rule knows what it targets, which versions it matches and how it marks a
/// matched version. [`RuleSet`] drives everything else.
pub trait Rule {
    /// The package or set this rule applies to
    fn target(&self) -> &RuleTarget;

    /// The rule kind
    fn kind(&self) -> RuleKind;

    /// Whether this rule matches the given version instance
    fn matches(&self, inst: &VersionInst) -> bool;

    /// Mark a matched version; must be idempotent per kind
    fn apply(&self, inst: &mut VersionInst);
}

/// A mask or unmask rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRule {
    /// The parsed atom
    pub atom: MaskAtom,
    /// Mask or Unmask
    pub kind: RuleKind,
    /// Restrict to versions from this source repository
    pub repo: Option<String>,
}

impl MaskRule {
    /// Create a mask-kind rule
    pub fn new(atom: MaskAtom, kind: RuleKind) -> Self {
        Self {
            atom,
            kind,
            repo: None,
        }
    }

    /// Restrict the rule to one source repository
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }
}

fn repo_matches(scope: &Option<String>, inst: &VersionInst) -> bool {
    match scope {
        Some(repo) => inst.repo.as_deref() == Some(repo.as_str()),
        None => true,
    }
}

impl Rule for MaskRule {
    fn target(&self) -> &RuleTarget {
        &self.atom.target
    }

    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn matches(&self, inst: &VersionInst) -> bool {
        repo_matches(&self.repo, inst) && self.atom.matches_version(&inst.version)
    }

    fn apply(&self, inst: &mut VersionInst) {
        match self.kind {
            RuleKind::Mask => inst.status.masked = true,
            RuleKind::Unmask => inst.status.unmasked = true,
            _ => {}
        }
    }
}

/// A keyword-acceptance rule carrying the accepted-keyword string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// The parsed atom
    pub atom: MaskAtom,
    /// AcceptKeywords or PackageKeywords
    pub kind: RuleKind,
    /// Keywords accepted by this rule (space separated)
    pub keywords: String,
    /// The staged entry appeared twice without retraction
    pub locally_double: bool,
    /// Restrict to versions from this source repository
    pub repo: Option<String>,
}

impl KeywordRule {
    /// Create a keyword rule
    pub fn new(atom: MaskAtom, kind: RuleKind, keywords: impl Into<String>) -> Self {
        Self {
            atom,
            kind,
            keywords: keywords.into(),
            locally_double: false,
            repo: None,
        }
    }
}

impl Rule for KeywordRule {
    fn target(&self) -> &RuleTarget {
        &self.atom.target
    }

    fn kind(&self) -> RuleKind {
        self.kind
    }

    fn matches(&self, inst: &VersionInst) -> bool {
        repo_matches(&self.repo, inst) && self.atom.matches_version(&inst.version)
    }

    fn apply(&self, inst: &mut VersionInst) {
        if !inst.status.accepted_keywords.contains(&self.keywords) {
            inst.status.accepted_keywords.push(self.keywords.clone());
        }
        if self.locally_double {
            inst.status.redundant.set(Redundant::DOUBLE);
        }
    }
}

/// An indexed collection of rules of one type.
///
/// Populated by [`RuleSet::add`], indexed by [`RuleSet::finalize`], then
/// read-many. Queries auto-finalize, so a set can never be read stale; adding
/// after a query schedules a rebuild on the next one.
#[derive(Debug, Clone)]
pub struct RuleSet<R: Rule> {
    rules: Vec<R>,
    by_package: IndexMap<PackageId, Vec<usize>>,
    by_set: IndexMap<String, Vec<usize>>,
    finalized: bool,
}

impl<R: Rule> RuleSet<R> {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            by_package: IndexMap::new(),
            by_set: IndexMap::new(),
            finalized: false,
        }
    }

    /// Append a rule; invalidates the index until the next finalize
    pub fn add(&mut self, rule: R) {
        self.finalized = false;
        self.rules.push(rule);
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules, in insertion order
    pub fn rules(&self) -> &[R] {
        &self.rules
    }

    /// Build the target-keyed index. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.by_package.clear();
        self.by_set.clear();
        for (idx, rule) in self.rules.iter().enumerate() {
            match rule.target() {
                RuleTarget::Package(id) => {
                    self.by_package.entry(id.clone()).or_default().push(idx)
                }
                RuleTarget::Set(name) => {
                    self.by_set.entry(name.clone()).or_default().push(idx)
                }
            }
        }
        tracing::debug!(
            rules = self.rules.len(),
            packages = self.by_package.len(),
            sets = self.by_set.len(),
            "rule index built"
        );
    }

    /// Apply every rule indexed under the package's identity to its versions.
    ///
    /// Matching versions get their per-kind status flag set; first match of a
    /// kind wins and later same-kind matches change nothing. Afterwards, for
    /// each kind named in `active` that fired at least once, every version
    /// whose flag for that kind is still unset is marked redundant for it.
    ///
    /// Returns true iff at least one rule matched at least one version.
    pub fn apply(&mut self, pkg: &mut Package, active: Redundant) -> bool {
        self.finalize();
        let indices = match self.by_package.get(&pkg.id) {
            Some(indices) => indices,
            None => return false,
        };

        let mut matched_any = false;
        let mut fired = Redundant::NOTHING;
        for &idx in indices {
            let rule = &self.rules[idx];
            let mut rule_matched = false;
            for inst in pkg.versions.iter_mut() {
                if rule.matches(inst) {
                    rule.apply(inst);
                    rule_matched = true;
                }
            }
            if rule_matched {
                matched_any = true;
                fired.set(rule.kind().redundant_bit());
            }
        }

        for kind in RuleKind::ALL {
            let bit = kind.redundant_bit();
            if !fired.contains(bit) || !active.contains(bit) {
                continue;
            }
            for inst in pkg.versions.iter_mut() {
                if !kind.flag_set(inst) {
                    inst.status.redundant.set(bit);
                }
            }
        }

        matched_any
    }

    /// Apply every rule indexed under a set name to one version, with no
    /// redundancy bookkeeping.
    pub fn apply_set_rules(&mut self, inst: &mut VersionInst, set_name: &str) {
        self.finalize();
        let indices = match self.by_set.get(set_name) {
            Some(indices) => indices,
            None => return,
        };
        for &idx in indices {
            let rule = &self.rules[idx];
            if rule.matches(inst) {
                rule.apply(inst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn demo_package(versions: &[&str]) -> Package {
        let mut pkg = Package::new(PackageId::new("app-misc", "demo"));
        for text in versions {
            pkg.add_version(VersionInst::new(Version::parse(text).unwrap()));
        }
        pkg
    }

    fn mask_rule(atom: &str, kind: RuleKind) -> MaskRule {
        MaskRule::new(atom.parse().unwrap(), kind)
    }

    #[test]
    fn test_apply_no_rules_for_package() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("other-cat/other-pkg", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0"]);
        assert!(!set.apply(&mut pkg, Redundant::ALL));
        assert!(!pkg.versions[0].status.masked);
    }

    #[test]
    fn test_apply_range_mask() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule(">=app-misc/demo-2.0", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0", "2.0", "2.1"]);
        assert!(set.apply(&mut pkg, Redundant::NOTHING));
        let masked: Vec<_> = pkg.versions.iter().map(|v| v.status.masked).collect();
        assert_eq!(masked, vec![false, true, true]);
    }

    #[test]
    fn test_apply_auto_finalizes() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("app-misc/demo", RuleKind::Mask));
        // No explicit finalize call.
        let mut pkg = demo_package(&["1.0"]);
        assert!(set.apply(&mut pkg, Redundant::NOTHING));
        assert!(pkg.versions[0].status.masked);
    }

    #[test]
    fn test_add_after_query_rebuilds() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("=app-misc/demo-1.0", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0", "2.0"]);
        set.apply(&mut pkg, Redundant::NOTHING);
        set.add(mask_rule("=app-misc/demo-2.0", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0", "2.0"]);
        assert!(set.apply(&mut pkg, Redundant::NOTHING));
        assert!(pkg.versions[1].status.masked);
    }

    #[test]
    fn test_redundancy_sweep_marks_untouched_versions() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("=app-misc/demo-1.0", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0", "2.0"]);
        assert!(set.apply(&mut pkg, Redundant::ALL));
        assert!(pkg.versions[0].status.masked);
        assert!(!pkg.versions[0].status.redundant.contains(Redundant::MASK));
        assert!(pkg.versions[1].status.redundant.contains(Redundant::MASK));
    }

    #[test]
    fn test_redundancy_sweep_respects_active_kinds() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("=app-misc/demo-1.0", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0", "2.0"]);
        set.apply(&mut pkg, Redundant::NOTHING);
        assert!(pkg.versions[1].status.redundant.is_empty());
    }

    #[test]
    fn test_no_sweep_when_kind_never_fired() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("=app-misc/demo-9.9", RuleKind::Mask));
        let mut pkg = demo_package(&["1.0"]);
        assert!(!set.apply(&mut pkg, Redundant::ALL));
        assert!(pkg.versions[0].status.redundant.is_empty());
    }

    #[test]
    fn test_repo_scope() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("app-misc/demo", RuleKind::Mask).with_repo("overlay"));
        let mut pkg = Package::new(PackageId::new("app-misc", "demo"));
        pkg.add_version(VersionInst::new(Version::parse("1.0").unwrap()));
        pkg.add_version(
            VersionInst::new(Version::parse("2.0").unwrap()).with_repo("overlay"),
        );
        set.apply(&mut pkg, Redundant::NOTHING);
        assert!(!pkg.versions[0].status.masked);
        assert!(pkg.versions[1].status.masked);
    }

    #[test]
    fn test_keyword_rule_accumulates() {
        let mut set: RuleSet<KeywordRule> = RuleSet::new();
        set.add(KeywordRule::new(
            "app-misc/demo".parse().unwrap(),
            RuleKind::AcceptKeywords,
            "~amd64",
        ));
        let mut pkg = demo_package(&["1.0"]);
        assert!(set.apply(&mut pkg, Redundant::ALL));
        assert!(pkg.versions[0].status.keywords_accepted());
        assert_eq!(pkg.versions[0].status.accepted_keywords, vec!["~amd64"]);
    }

    #[test]
    fn test_set_rules_skip_redundancy() {
        let mut set: RuleSet<MaskRule> = RuleSet::new();
        set.add(mask_rule("@world", RuleKind::Mask));
        let mut inst = VersionInst::new(Version::parse("1.0").unwrap());
        set.apply_set_rules(&mut inst, "world");
        assert!(inst.status.masked);
        assert!(inst.status.redundant.is_empty());

        let mut other = VersionInst::new(Version::parse("1.0").unwrap());
        set.apply_set_rules(&mut other, "unknown-set");
        assert!(!other.status.masked);
    }
}
