// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Externals definitions.
//!
//! An __external__ is a declarative pointer from a folder of one repository to
//! a location in another (or the same) repository. Subversion stores these as
//! the `svn:externals` property of the declaring folder, one definition per
//! line:
//!
//! ```text
//! [-r <operative-rev>] <url>[@<peg-rev>] <path>
//! ```
//!
//! The __operative revision__ pins the checkout operation itself, while the
//! __peg revision__ selects which historical identity `<url>` refers to. The
//! two are independent of each other.
//!
//! Definitions are immutable once constructed. Re-pinning an external, e.g.,
//! to check it out the way it looked at some point in history, yields a new
//! [`ExternalDefinition`].
//!
//! # See Also
//!
//! 1. [SVN Book - Externals Definitions](http://svnbook.red-bean.com/en/1.7/svn.advanced.externals.html)
//! 2. [`locator`]

pub mod locator;

use crate::{external::locator::QualifiedUrl, path};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Subversion revision specifier.
///
/// Kept as text because Subversion accepts more than plain numbers, e.g.,
/// `HEAD`, `BASE`, or a date like `{2006-02-17 15:30}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Construct new revision specifier.
    pub fn new(revision: impl Into<String>) -> Self {
        Self(revision.into())
    }

    /// Construct date revision specifier, i.e., `{date}`.
    pub fn date(date: impl AsRef<str>) -> Self {
        Self(format!("{{{}}}", date.as_ref()))
    }

    /// Treat revision as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Revision number, if the specifier is a plain number.
    pub fn number(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Check if revision specifier is a date wrapped in curly braces.
    pub fn is_date(&self) -> bool {
        self.0.len() > 2 && self.0.starts_with('{') && self.0.ends_with('}')
    }
}

impl From<u64> for Revision {
    fn from(number: u64) -> Self {
        Self(number.to_string())
    }
}

impl Display for Revision {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Single `svn:externals` definition set on a folder of a working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDefinition {
    host_repo_url: String,
    declared_on: String,
    operative_revision: Option<Revision>,
    source_url: String,
    peg_revision: Option<Revision>,
    checkout_path: String,
}

impl ExternalDefinition {
    /// Construct new external definition.
    ///
    /// # Errors
    ///
    /// - Return [`ExternalError::MalformedDefinition`] if the source URL or
    ///   checkout path is empty, the source URL holds a blank or `@`, or a
    ///   revision is blank or holds a blank or `@`.
    pub fn new(
        host_repo_url: impl Into<String>,
        declared_on: impl Into<String>,
        operative_revision: Option<Revision>,
        source_url: impl Into<String>,
        peg_revision: Option<Revision>,
        checkout_path: impl Into<String>,
    ) -> Result<Self> {
        let external = Self {
            host_repo_url: host_repo_url.into(),
            declared_on: declared_on.into(),
            operative_revision,
            source_url: source_url.into(),
            peg_revision,
            checkout_path: checkout_path.into(),
        };

        let malformed = |reason| ExternalError::MalformedDefinition {
            line: external.to_string(),
            reason,
        };
        if external.source_url.is_empty() || external.source_url.contains(char::is_whitespace) {
            return Err(malformed("source url must be a single non-empty token"));
        }
        if external.source_url.contains('@') {
            return Err(malformed("literal '@' in source url is unsupported"));
        }
        if external.source_url.starts_with('-') {
            return Err(malformed("source url cannot start with '-'"));
        }
        if external.checkout_path.is_empty() {
            return Err(malformed("missing checkout path"));
        }
        if external.checkout_path.contains(['\n', '\r']) {
            return Err(malformed("checkout path spans multiple lines"));
        }
        let blank = |rev: &Option<Revision>| rev.as_ref().is_some_and(|rev| rev.as_str().is_empty());
        if blank(&external.operative_revision) || blank(&external.peg_revision) {
            return Err(malformed("blank revision"));
        }
        let garbled = |rev: &Option<Revision>| {
            rev.as_ref()
                .is_some_and(|rev| rev.as_str().contains(|c: char| c.is_whitespace() || c == '@'))
        };
        if garbled(&external.operative_revision) || garbled(&external.peg_revision) {
            return Err(malformed("revision cannot contain blanks or '@'"));
        }

        Ok(external)
    }

    /// Parse a single definition line.
    ///
    /// Tokens are split on single spaces. Each stage consumes its prefix
    /// tokens: the optional `-r <rev>` pair, then the locator with an optional
    /// `@<peg>` suffix (first `@` wins). Whatever remains, rejoined with single
    /// spaces, is the checkout path. A checkout path wrapped in one matching
    /// pair of quotes has the quotes stripped.
    ///
    /// # Errors
    ///
    /// - Return [`ExternalError::MalformedDefinition`] if any stage is missing
    ///   its token, or nothing remains for the checkout path.
    #[instrument(skip(host_repo_url, declared_on), level = "trace")]
    pub fn parse(
        host_repo_url: impl Into<String>,
        declared_on: impl Into<String>,
        line: &str,
    ) -> Result<Self> {
        debug!("parse external definition {line:?}");
        let line = line.trim();
        let malformed = |reason| ExternalError::MalformedDefinition {
            line: line.to_owned(),
            reason,
        };

        let terms = line.split(' ').collect::<Vec<_>>();
        let (operative_revision, rest) = match skip_blank(&terms) {
            ["-r", rev, remainder @ ..] if !rev.is_empty() => {
                (Some(Revision::new(*rev)), skip_blank(remainder))
            }
            ["-r", ..] => return Err(malformed("missing operative revision after '-r'")),
            rest => (None, rest),
        };

        let (locator, remainder) = rest
            .split_first()
            .ok_or_else(|| malformed("missing source url"))?;
        let (source_url, peg_revision) = match locator.split_once('@') {
            Some((url, peg)) if !peg.is_empty() => (url, Some(Revision::new(peg))),
            Some((url, _)) => (url, None),
            None => (*locator, None),
        };
        if source_url.is_empty() {
            return Err(malformed("missing source url"));
        }

        let checkout_path = skip_blank(remainder).join(" ");
        let checkout_path = strip_quotes(&checkout_path);
        if checkout_path.is_empty() {
            return Err(malformed("missing checkout path"));
        }

        Self::new(
            host_repo_url,
            declared_on,
            operative_revision,
            source_url,
            peg_revision,
            checkout_path,
        )
    }

    /// URL of repository owning the folder the definition is declared on.
    pub fn host_repo_url(&self) -> &str {
        self.host_repo_url.as_str()
    }

    /// Working-copy relative folder the definition is declared on.
    pub fn declared_on(&self) -> &str {
        self.declared_on.as_str()
    }

    pub fn operative_revision(&self) -> Option<&Revision> {
        self.operative_revision.as_ref()
    }

    /// Locator exactly as declared, possibly relative.
    pub fn source_url(&self) -> &str {
        self.source_url.as_str()
    }

    pub fn peg_revision(&self) -> Option<&Revision> {
        self.peg_revision.as_ref()
    }

    /// Checkout path relative to the declaring folder.
    pub fn checkout_path(&self) -> &str {
        self.checkout_path.as_str()
    }

    /// Resolve source locator into fully qualified URL.
    ///
    /// # Errors
    ///
    /// - Return [`ExternalError::UnsupportedLocatorForm`] for parent relative
    ///   locators.
    /// - Return [`ExternalError::InvalidUrl`] if URLs cannot be parsed.
    pub fn qualified_url(&self) -> Result<QualifiedUrl> {
        locator::resolve(self)
    }

    /// Absolute path the external materializes at under a working copy root.
    pub fn target_path(&self, root: impl AsRef<Path>) -> PathBuf {
        path::target_path(root, &self.declared_on, &self.checkout_path)
    }

    /// Operative and peg revision are both set but disagree.
    ///
    /// Such an external cannot be updated in place, it always needs a clean
    /// checkout.
    pub fn has_ambiguous_revisions(&self) -> bool {
        self.operative_revision.is_some() && self.operative_revision != self.peg_revision
    }

    /// Copy of this external with operative and peg revision set to `revision`.
    pub fn pinned(&self, revision: Revision) -> Self {
        Self {
            operative_revision: Some(revision.clone()),
            peg_revision: Some(revision),
            ..self.clone()
        }
    }
}

/// Render definition line, i.e., `[-r <rev>] <url>[@<peg>] <path>`.
impl Display for ExternalDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if let Some(rev) = &self.operative_revision {
            write!(fmt, "-r {rev} ")?;
        }

        fmt.write_str(&self.source_url)?;
        if let Some(peg) = &self.peg_revision {
            write!(fmt, "@{peg}")?;
        }

        // INVARIANT: Parsing only strips the outermost quote pair, so wrapping
        // in single quotes is always safe.
        let path = self.checkout_path.as_str();
        if path.contains(char::is_whitespace) || strip_quotes(path) != path {
            write!(fmt, " '{path}'")
        } else {
            write!(fmt, " {path}")
        }
    }
}

/// Definition line without host context, declared on the working copy root.
impl FromStr for ExternalDefinition {
    type Err = ExternalError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse("", ".", line)
    }
}

fn skip_blank<'a, 'b>(terms: &'a [&'b str]) -> &'a [&'b str] {
    let start = terms
        .iter()
        .position(|term| !term.is_empty())
        .unwrap_or(terms.len());
    &terms[start..]
}

fn strip_quotes(path: &str) -> &str {
    for quote in ['\'', '"'] {
        if path.len() >= 2 && path.starts_with(quote) && path.ends_with(quote) {
            return &path[1..path.len() - 1];
        }
    }

    path
}

/// Parse recursive `svn propget svn:externals -R` listing.
///
/// A line of the form `<path> - <definition>` opens a new declaring folder.
/// Every following non-blank line is another definition on that folder.
///
/// # Errors
///
/// - Return [`ExternalError::MalformedListing`] if a definition shows up
///   before any declaring folder, or a declaring folder is absolute.
/// - Return [`ExternalError::MalformedDefinition`] for bad definitions.
pub fn parse_property_listing(host_repo_url: &str, listing: &str) -> Result<Vec<ExternalDefinition>> {
    let mut declared_on: Option<&str> = None;
    let mut externals = Vec::new();

    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let definition = match line.split_once(" - ") {
            Some((folder, definition)) => {
                if folder.starts_with('/') {
                    return Err(ExternalError::MalformedListing {
                        line: line.to_owned(),
                        reason: "declaring folder must be working copy relative",
                    });
                }
                declared_on = Some(folder);
                definition
            }
            None => line,
        };

        let folder = declared_on.ok_or_else(|| ExternalError::MalformedListing {
            line: line.to_owned(),
            reason: "definition without declaring folder",
        })?;
        externals.push(ExternalDefinition::parse(host_repo_url, folder, definition)?);
    }

    Ok(externals)
}

/// Parse `git svn show-externals` listing.
///
/// A `# /<dir>/` line opens a new declaring folder. Following lines repeat
/// that folder as prefix of each definition. Declaring folders are made
/// working copy relative by prefixing them with `.`.
///
/// # Errors
///
/// - Return [`ExternalError::MalformedDefinition`] for bad definitions.
pub fn parse_show_externals(host_repo_url: &str, listing: &str) -> Result<Vec<ExternalDefinition>> {
    let mut folder = "";
    let mut externals = Vec::new();

    for line in listing.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with("# /") {
            folder = &line[2..];
            debug!("declaring folder {folder:?}");
            continue;
        }

        let definition = line.strip_prefix(folder).unwrap_or(line);
        externals.push(ExternalDefinition::parse(
            host_repo_url,
            format!(".{folder}"),
            definition,
        )?);
    }

    Ok(externals)
}

/// Externals definition error types.
#[derive(Debug, thiserror::Error)]
pub enum ExternalError {
    /// Definition line does not follow `[-r <rev>] <url>[@<peg>] <path>`.
    #[error("malformed external definition {line:?}: {reason}")]
    MalformedDefinition { line: String, reason: &'static str },

    /// Property listing cannot be split into definitions.
    #[error("malformed externals listing at {line:?}: {reason}")]
    MalformedListing { line: String, reason: &'static str },

    /// Locator uses a relative form that cannot be resolved.
    #[error("unsupported locator form {locator:?}")]
    UnsupportedLocatorForm { locator: String },

    /// Host or external URL cannot be parsed.
    #[error("invalid url {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ExternalError> = std::result::Result<T, E>;
