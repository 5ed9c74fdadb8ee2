//! Rule staging and merge layer
//!
//! Accumulates raw rule lines from multiple files in priority order, applying
//! add/retract semantics (a leading `-` retracts a previously staged line),
//! then finalizes into one deterministic, deduplicated entry list:
//!
//! - an entry's final *position* is fixed by the first append slot its name
//!   ever occupied, even across retract/re-add cycles
//! - an entry staged twice without an intervening retraction keeps its
//!   first-seen content and is flagged `locally_double`
//!
//! Finalized entries are materialized into [`RuleSet`]s, with malformed atoms
//! handed to the caller's [`ParseErrorReport`] and skipped.

use crate::atom::MaskAtom;
use crate::mask::{KeywordRule, MaskRule, Rule, RuleKind, RuleSet};
use crate::report::ParseErrorReport;
use std::collections::HashMap;

/// Index into the staging file registry
pub type FileIndex = usize;

/// One registered source file: display name plus optional repository label
#[derive(Debug, Clone)]
struct SourceFile {
    name: String,
    repo: Option<String>,
}

/// One slot in the append-ordered staging log
#[derive(Debug, Clone)]
struct StagedLine {
    tokens: Vec<String>,
    file: FileIndex,
    line: u32,
    removed: bool,
    locally_double: bool,
}

/// One finalized staging entry: a logical rule merged from all its adds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// The match pattern (first token of the line)
    pub name: String,
    /// Remaining tokens (e.g. accepted keyword names)
    pub args: Vec<String>,
    /// Registered file the entry came from
    pub file: FileIndex,
    /// Line number within that file
    pub line: u32,
    /// The name was staged twice without an intervening retraction
    pub locally_double: bool,
}

/// Accumulates and merges raw rule lines before parsing.
#[derive(Debug, Clone, Default)]
pub struct RuleStaging {
    files: Vec<SourceFile>,
    order: Vec<StagedLine>,
    have: HashMap<Vec<String>, usize>,
    entries: Vec<StagedEntry>,
    finalized: bool,
}

impl RuleStaging {
    /// Create an empty staging area
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file, returning its index for line provenance
    pub fn push_file(&mut self, name: impl Into<String>, repo: Option<String>) -> FileIndex {
        self.files.push(SourceFile {
            name: name.into(),
            repo,
        });
        self.files.len() - 1
    }

    /// Display name of a registered file
    pub fn file_name(&self, file: FileIndex) -> &str {
        &self.files[file].name
    }

    /// Repository label of a registered file, when known
    pub fn repo(&self, file: FileIndex) -> Option<&str> {
        self.files[file].repo.as_deref()
    }

    /// Feed a sequence of lines from one file, threading line numbers.
    ///
    /// Returns true if any line changed the staged state.
    pub fn handle_lines(
        &mut self,
        lines: &[String],
        file: FileIndex,
        only_add: bool,
        number: &mut u32,
    ) -> bool {
        let mut changed = false;
        for line in lines {
            if self.handle_line(line, file, *number, only_add) {
                changed = true;
            }
            *number += 1;
        }
        changed
    }

    /// Feed one line: empty lines are no-ops, a leading `-` retracts (unless
    /// `only_add`), anything else adds.
    pub fn handle_line(
        &mut self,
        line: &str,
        file: FileIndex,
        number: u32,
        only_add: bool,
    ) -> bool {
        if line.is_empty() {
            return false;
        }
        if only_add || !line.starts_with('-') {
            self.add_line(line, file, number)
        } else {
            self.remove_line(&line[1..])
        }
    }

    /// Tokenize and stage one added line
    pub fn add_line(&mut self, line: &str, file: FileIndex, number: u32) -> bool {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        self.add_tokens(tokens, file, number)
    }

    /// Tokenize and retract one line
    pub fn remove_line(&mut self, line: &str) -> bool {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        self.remove_tokens(&tokens)
    }

    /// Stage a tokenized line.
    ///
    /// The full token vector is the identity: an unseen vector appends a new
    /// slot; a retracted one is revived with refreshed provenance; a live one
    /// is flagged locally double and keeps its first-seen state.
    pub fn add_tokens(&mut self, tokens: Vec<String>, file: FileIndex, number: u32) -> bool {
        if tokens.is_empty() {
            return false;
        }
        match self.have.get(&tokens) {
            None => {
                self.have.insert(tokens.clone(), self.order.len());
                self.order.push(StagedLine {
                    tokens,
                    file,
                    line: number,
                    removed: false,
                    locally_double: false,
                });
                true
            }
            Some(&slot) => {
                let entry = &mut self.order[slot];
                if entry.removed {
                    entry.removed = false;
                    entry.file = file;
                    entry.line = number;
                    true
                } else {
                    entry.locally_double = true;
                    false
                }
            }
        }
    }

    /// Retract a tokenized line; unknown vectors are no-ops returning false
    pub fn remove_tokens(&mut self, tokens: &[String]) -> bool {
        if tokens.is_empty() {
            return false;
        }
        match self.have.get(tokens) {
            None => false,
            Some(&slot) => {
                self.order[slot].removed = true;
                true
            }
        }
    }

    /// Merge the staged log into the finalized entry list. Idempotent.
    ///
    /// Two passes over the append-ordered log, skipping retracted slots: the
    /// first pass merges slots by name, where the first surviving slot supplies
    /// content and provenance, later slots colliding on the name only raise
    /// `locally_double`; the second pass emits one entry per distinct name at
    /// its first surviving slot's position. The log is drained afterwards.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        if self.order.is_empty() {
            self.have.clear();
            return;
        }

        let mut merged: HashMap<String, StagedEntry> = HashMap::new();
        for staged in self.order.iter().filter(|s| !s.removed) {
            let name = &staged.tokens[0];
            match merged.get_mut(name) {
                None => {
                    merged.insert(
                        name.clone(),
                        StagedEntry {
                            name: name.clone(),
                            args: staged.tokens[1..].to_vec(),
                            file: staged.file,
                            line: staged.line,
                            locally_double: staged.locally_double,
                        },
                    );
                }
                Some(entry) => {
                    // Same logical rule staged again without retraction:
                    // first-seen content stands.
                    entry.locally_double = true;
                }
            }
        }

        for staged in self.order.iter().filter(|s| !s.removed) {
            if let Some(entry) = merged.remove(&staged.tokens[0]) {
                self.entries.push(entry);
            }
        }

        tracing::debug!(entries = self.entries.len(), "staging finalized");
        self.order.clear();
        self.have.clear();
    }

    /// The finalized entries (empty before finalize)
    pub fn entries(&self) -> &[StagedEntry] {
        &self.entries
    }

    /// Parse every finalized entry as a mask atom and add it to the target
    /// set as a rule of the given kind.
    ///
    /// Malformed entries go to the reporter with file/line context and are
    /// skipped; the target set is finalized and the staged entries are
    /// drained, leaving the staging ready for a new cycle.
    pub fn materialize_masks(
        &mut self,
        kind: RuleKind,
        report: &mut dyn ParseErrorReport,
        target: &mut RuleSet<MaskRule>,
    ) {
        self.materialize(report, target, |_entry, atom, repo| {
            let mut rule = MaskRule::new(atom, kind);
            rule.repo = repo;
            rule
        });
    }

    /// Like [`RuleStaging::materialize_masks`] for keyword-accept rules: the
    /// entry's args become the accepted-keyword string, or
    /// `default_keywords` when the entry has none.
    pub fn materialize_keywords(
        &mut self,
        default_keywords: &str,
        report: &mut dyn ParseErrorReport,
        target: &mut RuleSet<KeywordRule>,
    ) {
        let default_keywords = default_keywords.to_string();
        self.materialize(report, target, |entry, atom, repo| {
            let keywords = if entry.args.is_empty() {
                default_keywords.clone()
            } else {
                entry.args.join(" ")
            };
            let mut rule = KeywordRule::new(atom, RuleKind::AcceptKeywords, keywords);
            rule.locally_double = entry.locally_double;
            rule.repo = repo;
            rule
        });
    }

    /// Like [`RuleStaging::materialize_keywords`] for per-package keyword
    /// rules; args are always taken verbatim.
    pub fn materialize_package_keywords(
        &mut self,
        report: &mut dyn ParseErrorReport,
        target: &mut RuleSet<KeywordRule>,
    ) {
        self.materialize(report, target, |entry, atom, repo| {
            let mut rule =
                KeywordRule::new(atom, RuleKind::PackageKeywords, entry.args.join(" "));
            rule.locally_double = entry.locally_double;
            rule.repo = repo;
            rule
        });
    }

    fn materialize<R: Rule>(
        &mut self,
        report: &mut dyn ParseErrorReport,
        target: &mut RuleSet<R>,
        mut build: impl FnMut(&StagedEntry, MaskAtom, Option<String>) -> R,
    ) {
        self.finalize();
        for entry in &self.entries {
            match entry.name.parse::<MaskAtom>() {
                Ok(atom) => {
                    let repo = self.files[entry.file].repo.clone();
                    target.add(build(entry, atom, repo));
                }
                Err(err) => {
                    report.parse_error(
                        &self.files[entry.file].name,
                        entry.line,
                        &entry.name,
                        &err.to_string(),
                    );
                }
            }
        }
        target.finalize();
        self.entries.clear();
        self.finalized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectedReport;

    fn add(staging: &mut RuleStaging, line: &str, file: FileIndex, number: u32) -> bool {
        staging.handle_line(line, file, number, false)
    }

    #[test]
    fn test_order_stability_across_retract_and_readd() {
        let mut staging = RuleStaging::new();
        let a = staging.push_file("fileA", None);
        let b = staging.push_file("fileB", None);
        add(&mut staging, "foo", a, 1);
        add(&mut staging, "bar", a, 2);
        add(&mut staging, "-foo", a, 3);
        add(&mut staging, "foo", b, 1);
        staging.finalize();
        let names: Vec<_> = staging.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["foo", "bar"]);
        // Provenance follows the latest add.
        assert_eq!(staging.entries()[0].file, b);
        assert_eq!(staging.entries()[0].line, 1);
    }

    #[test]
    fn test_duplicate_without_retraction_keeps_first_args() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        add(&mut staging, "foo x", f, 1);
        add(&mut staging, "foo y", f, 2);
        staging.finalize();
        assert_eq!(staging.entries().len(), 1);
        let entry = &staging.entries()[0];
        assert!(entry.locally_double);
        assert_eq!(entry.args, vec!["x"]);
        assert_eq!(entry.line, 1);
    }

    #[test]
    fn test_identical_line_twice_is_locally_double() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        assert!(add(&mut staging, "foo x", f, 1));
        assert!(!add(&mut staging, "foo x", f, 2));
        staging.finalize();
        assert!(staging.entries()[0].locally_double);
        assert_eq!(staging.entries()[0].line, 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        assert!(!staging.handle_line("-foo", f, 1, false));
        staging.finalize();
        assert!(staging.entries().is_empty());
    }

    #[test]
    fn test_only_retractions_yield_empty() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        add(&mut staging, "foo", f, 1);
        add(&mut staging, "-foo", f, 2);
        staging.finalize();
        assert!(staging.entries().is_empty());
    }

    #[test]
    fn test_only_add_treats_dash_lines_as_adds() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        assert!(staging.handle_line("-foo", f, 1, true));
        staging.finalize();
        assert_eq!(staging.entries()[0].name, "-foo");
    }

    #[test]
    fn test_empty_and_blank_lines_ignored() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        assert!(!staging.handle_line("", f, 1, false));
        assert!(!staging.add_line("   ", f, 2));
        staging.finalize();
        assert!(staging.entries().is_empty());
    }

    #[test]
    fn test_handle_lines_threads_numbers() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        let lines: Vec<String> = ["foo", "", "bar"].iter().map(|s| s.to_string()).collect();
        let mut number = 1;
        assert!(staging.handle_lines(&lines, f, false, &mut number));
        assert_eq!(number, 4);
        staging.finalize();
        assert_eq!(staging.entries()[1].name, "bar");
        assert_eq!(staging.entries()[1].line, 3);
    }

    #[test]
    fn test_finalize_idempotent_and_drains() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("file", None);
        add(&mut staging, "foo", f, 1);
        staging.finalize();
        staging.finalize();
        assert_eq!(staging.entries().len(), 1);
    }

    #[test]
    fn test_materialize_reports_bad_atoms() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("package.mask", None);
        add(&mut staging, "app-misc/good", f, 1);
        add(&mut staging, "not-an-atom", f, 2);
        let mut report = CollectedReport::new();
        let mut rules = RuleSet::new();
        staging.materialize_masks(RuleKind::Mask, &mut report, &mut rules);
        assert_eq!(rules.len(), 1);
        assert_eq!(report.entries.len(), 1);
        let (file, line, text, _) = &report.entries[0];
        assert_eq!(file, "package.mask");
        assert_eq!(*line, 2);
        assert_eq!(text, "not-an-atom");
        // Staging is ready for a new cycle.
        assert!(staging.entries().is_empty());
    }

    #[test]
    fn test_materialize_keywords_default_and_args() {
        let mut staging = RuleStaging::new();
        let f = staging.push_file("package.accept_keywords", Some("gentoo".to_string()));
        add(&mut staging, "app-misc/demo ~amd64 ~arm64", f, 1);
        add(&mut staging, "app-misc/other", f, 2);
        let mut report = CollectedReport::new();
        let mut rules = RuleSet::new();
        staging.materialize_keywords("~x86", &mut report, &mut rules);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].keywords, "~amd64 ~arm64");
        assert_eq!(rules.rules()[1].keywords, "~x86");
        assert_eq!(rules.rules()[0].repo.as_deref(), Some("gentoo"));
        assert!(report.entries.is_empty());
    }
}
