// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Structured `svn --xml` output.
//!
//! Only the fields the bridge actually needs are deserialized. Fields that
//! are required for a query but absent from the document are reported as
//! [`SvnError::MissingField`] instead of silently defaulting.

use crate::{
    external::Revision,
    svn::{NodeKind, Result, SvnError},
};

use serde::Deserialize;
use std::str::FromStr;

/// Node information of a URL or working copy path, i.e., `svn info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    kind: NodeKind,
    url: String,
    revision: Revision,
    relative_url: Option<String>,
    repository_root: Option<String>,
    last_changed_revision: Option<Revision>,
    last_changed_date: Option<String>,
}

impl Info {
    /// Construct new info with only the mandatory fields set.
    pub fn new(kind: NodeKind, url: impl Into<String>, revision: impl Into<Revision>) -> Self {
        Self {
            kind,
            url: url.into(),
            revision: revision.into(),
            relative_url: None,
            repository_root: None,
            last_changed_revision: None,
            last_changed_date: None,
        }
    }

    pub fn with_repository_root(mut self, root: impl Into<String>) -> Self {
        self.repository_root = Some(root.into());
        self
    }

    pub fn with_relative_url(mut self, relative_url: impl Into<String>) -> Self {
        self.relative_url = Some(relative_url.into());
        self
    }

    pub fn with_last_changed(mut self, revision: impl Into<Revision>, date: impl Into<String>) -> Self {
        self.last_changed_revision = Some(revision.into());
        self.last_changed_date = Some(date.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Revision the node was queried at.
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Repository root relative URL, i.e., `^/trunk/lib`.
    ///
    /// # Errors
    ///
    /// - Return [`SvnError::MissingField`] if the document lacked it.
    pub fn relative_url(&self) -> Result<&str> {
        self.relative_url
            .as_deref()
            .ok_or(SvnError::MissingField("relative-url"))
    }

    /// # Errors
    ///
    /// - Return [`SvnError::MissingField`] if the document lacked it.
    pub fn repository_root(&self) -> Result<&str> {
        self.repository_root
            .as_deref()
            .ok_or(SvnError::MissingField("repository/root"))
    }

    /// Revision the node was last changed in.
    ///
    /// # Errors
    ///
    /// - Return [`SvnError::MissingField`] if the document lacked it.
    pub fn last_changed_revision(&self) -> Result<&Revision> {
        self.last_changed_revision
            .as_ref()
            .ok_or(SvnError::MissingField("commit/@revision"))
    }

    /// Date of last change, e.g., `2017-11-24T14:38:21.310740Z`.
    ///
    /// # Errors
    ///
    /// - Return [`SvnError::MissingField`] if the document lacked it.
    pub fn last_changed_date(&self) -> Result<&str> {
        self.last_changed_date
            .as_deref()
            .ok_or(SvnError::MissingField("commit/date"))
    }
}

impl FromStr for Info {
    type Err = SvnError;

    fn from_str(xml: &str) -> Result<Self, Self::Err> {
        let document: InfoDocument = quick_xml::de::from_str(xml)?;
        let entry = document
            .entries
            .into_iter()
            .next()
            .ok_or(SvnError::MissingField("entry"))?;

        let kind = entry.kind.ok_or(SvnError::MissingField("entry/@kind"))?;
        let revision = entry.revision.ok_or(SvnError::MissingField("entry/@revision"))?;
        let url = entry.url.ok_or(SvnError::MissingField("entry/url"))?;

        let (last_changed_revision, last_changed_date) = match entry.commit {
            Some(commit) => (commit.revision.map(Revision::new), commit.date),
            None => (None, None),
        };

        Ok(Self {
            kind: NodeKind::from_svn(&kind),
            url,
            revision: Revision::new(revision),
            relative_url: entry.relative_url,
            repository_root: entry.repository.and_then(|repository| repository.root),
            last_changed_revision,
            last_changed_date,
        })
    }
}

/// Revision numbers listed by `svn log --xml`.
///
/// # Errors
///
/// - Return [`SvnError::Xml`] if the document cannot be parsed.
/// - Return [`SvnError::MissingField`] if an entry lacks a numeric revision.
pub fn parse_log_revisions(xml: &str) -> Result<Vec<u64>> {
    let document: LogDocument = quick_xml::de::from_str(xml)?;
    document
        .entries
        .into_iter()
        .map(|entry| {
            entry
                .revision
                .and_then(|revision| revision.parse().ok())
                .ok_or(SvnError::MissingField("logentry/@revision"))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct InfoDocument {
    #[serde(rename = "entry", default)]
    entries: Vec<InfoEntry>,
}

#[derive(Debug, Deserialize)]
struct InfoEntry {
    #[serde(rename = "@kind")]
    kind: Option<String>,
    #[serde(rename = "@revision")]
    revision: Option<String>,
    url: Option<String>,
    #[serde(rename = "relative-url")]
    relative_url: Option<String>,
    repository: Option<RepositoryEntry>,
    commit: Option<CommitEntry>,
}

#[derive(Debug, Deserialize)]
struct RepositoryEntry {
    root: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    #[serde(rename = "@revision")]
    revision: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogDocument {
    #[serde(rename = "logentry", default)]
    entries: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(rename = "@revision")]
    revision: Option<String>,
}
