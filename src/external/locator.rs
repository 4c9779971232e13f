// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Locator resolution.
//!
//! Externals may point at their source with a relative locator. Resolution
//! turns it into a __qualified URL__ (scheme, network location and path) with
//! the help of the URL of the repository hosting the definition:
//!
//! | Prefix | Relative to |
//! |--------|-------------|
//! | `^/`   | repository root |
//! | `//`   | scheme of the host URL |
//! | `/`    | server root of the host URL |
//! | `../`  | declaring folder (unsupported) |
//!
//! Any other locator is taken to be absolute already. It is only normalized
//! the way every other form is, e.g., scheme and host are lowercased.

use crate::external::{ExternalDefinition, ExternalError, Result, Revision};

use std::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

/// Fully qualified repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedUrl(String);

impl QualifiedUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Locator for reconciliation, i.e., `url@peg` when a peg revision is set.
    pub fn pegged(&self, peg: Option<&Revision>) -> String {
        match peg {
            Some(peg) => format!("{}@{peg}", self.0),
            None => self.0.clone(),
        }
    }

    /// Compare locations while ignoring a trailing path separator.
    ///
    /// Both sides are normalized as URLs first, so case of scheme and host,
    /// default ports, and escaping of the path do not matter.
    pub fn same_location(&self, other: &str) -> bool {
        normalize(&self.0) == normalize(other)
    }

    /// Split into URL of parent folder and final path segment.
    pub fn split_parent(&self) -> Option<(QualifiedUrl, &str)> {
        let (parent, name) = self.0.trim_end_matches('/').rsplit_once('/')?;
        if name.is_empty() || parent.ends_with('/') {
            return None;
        }

        Some((QualifiedUrl(parent.to_owned()), name))
    }
}

impl Display for QualifiedUrl {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Resolve source locator of external into qualified URL.
///
/// Pure function of the external's source locator and host repository URL.
///
/// # Errors
///
/// - Return [`ExternalError::UnsupportedLocatorForm`] for `../` and `^/../`
///   locators.
/// - Return [`ExternalError::InvalidUrl`] if URLs cannot be parsed.
pub fn resolve(external: &ExternalDefinition) -> Result<QualifiedUrl> {
    resolve_locator(external.host_repo_url(), external.source_url())
}

/// Resolve locator relative to a host repository URL.
///
/// # Errors
///
/// - Return [`ExternalError::UnsupportedLocatorForm`] for `../` and `^/../`
///   locators.
/// - Return [`ExternalError::InvalidUrl`] if URLs cannot be parsed.
pub fn resolve_locator(host_repo_url: &str, locator: &str) -> Result<QualifiedUrl> {
    if locator.starts_with("../") || locator.starts_with("^/../") {
        return Err(ExternalError::UnsupportedLocatorForm {
            locator: locator.to_owned(),
        });
    }

    if let Some(relative) = locator.strip_prefix("^/") {
        // INVARIANT: Host URL must name a folder, or joining drops its last segment.
        let mut root = host_repo_url.to_owned();
        if !root.ends_with('/') {
            root.push('/');
        }

        let url = parse_url(&root)?
            .join(relative)
            .map_err(|source| ExternalError::InvalidUrl {
                url: locator.to_owned(),
                source,
            })?;
        return Ok(QualifiedUrl(url.into()));
    }

    if locator.starts_with("//") {
        let host = parse_url(host_repo_url)?;
        let mut url = parse_url(&format!("{}:{locator}", host.scheme()))?;
        url.set_query(None);
        url.set_fragment(None);
        return Ok(QualifiedUrl(url.into()));
    }

    if locator.starts_with('/') {
        let mut url = parse_url(host_repo_url)?;
        url.set_path(locator);
        url.set_query(None);
        url.set_fragment(None);
        return Ok(QualifiedUrl(url.into()));
    }

    Ok(QualifiedUrl(parse_url(locator)?.into()))
}

fn normalize(url: &str) -> String {
    let url = url.trim_end_matches('/');
    match Url::parse(url) {
        Ok(url) => String::from(url).trim_end_matches('/').to_owned(),
        Err(_) => url.to_owned(),
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| ExternalError::InvalidUrl {
        url: url.to_owned(),
        source,
    })
}
