//! Pkgdex
//!
//! Package version ordering and layered availability rules for
//! Gentoo-style package trees.
//!
//! # Architecture
//!
//! The crate is built around several core components:
//!
//! - **Version**: Full version grammar parsing and total ordering (suffixes,
//!   revisions, garbage-tolerant lenient mode)
//! - **Atom**: Mask atoms with comparison operators, glob and tilde matching,
//!   and `@set` targets
//! - **Staging**: Priority-ordered accumulation of rule lines with
//!   add/retract semantics and deterministic deduplicating finalize
//! - **Rules**: Indexed mask / unmask / keyword-accept rule sets applied to
//!   package version lists, with redundancy diagnostics
//! - **Report**: Pluggable parse-error reporting for malformed rule lines

pub mod atom;
pub mod error;
pub mod mask;
pub mod report;
pub mod staging;
pub mod types;
pub mod version;

pub use atom::{MaskAtom, MaskOp, RuleTarget};
pub use error::{Error, Result};
pub use mask::{KeywordRule, MaskRule, Rule, RuleKind, RuleSet};
pub use report::{CollectedReport, ParseErrorReport, TracingReport};
pub use staging::{FileIndex, RuleStaging, StagedEntry};
pub use types::{Package, PackageId, Redundant, VersionInst, VersionStatus};
pub use version::{PartKind, Version, VersionPart};
