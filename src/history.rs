// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Historic externals.
//!
//! Externals without pinned revisions drift along with their source. To get a
//! checkout the way it looked at some point in the past, every external has
//! to be pinned to the revision its source was at back then. Subversion only
//! knows how to relate revisions of different repositories through time, so
//! derivation goes through the commit date of the historic revision.

use crate::{
    external::{ExternalDefinition, ExternalError, Revision},
    svn::{inspect::Inspector, Subversion, SvnError},
};

use tracing::{info, instrument};

/// Pin external to the revision its source was at when the host repository
/// was at `revision`.
///
/// # Errors
///
/// - Return [`HistoryError::Svn`] if the commit date or the last changed
///   revision cannot be queried.
/// - Return [`HistoryError::External`] if the source cannot be resolved.
#[instrument(skip(svn, external), fields(external = %external), level = "debug")]
pub fn derive_historic<S>(
    svn: &S,
    revision: &Revision,
    external: &ExternalDefinition,
) -> Result<ExternalDefinition>
where
    S: Subversion + ?Sized,
{
    let date = Inspector::new(svn).commit_date(external.host_repo_url(), revision)?;
    derive_at_date(svn, &Revision::date(date), external)
}

/// Pin external to the revision its source was at on a date.
///
/// # Errors
///
/// - Return [`HistoryError::InvalidDateRevision`] if `date` is not of the
///   form `{<date>}`.
/// - Return [`HistoryError::Svn`] if the last changed revision cannot be
///   queried.
/// - Return [`HistoryError::External`] if the source cannot be resolved.
pub fn derive_at_date<S>(
    svn: &S,
    date: &Revision,
    external: &ExternalDefinition,
) -> Result<ExternalDefinition>
where
    S: Subversion + ?Sized,
{
    if !date.is_date() {
        return Err(HistoryError::InvalidDateRevision(date.to_string()));
    }

    let url = external.qualified_url()?;
    let revision = Inspector::new(svn).last_changed_revision(url.as_str(), date)?;
    let historic = external.pinned(revision);
    info!("{} : {external} -> {historic}", external.declared_on());

    Ok(historic)
}

/// Parse a `{<date>}` revision specifier.
///
/// # Errors
///
/// - Return [`HistoryError::InvalidDateRevision`] for anything else.
pub fn parse_date_revision(value: &str) -> Result<Revision> {
    let revision = Revision::new(value.trim());
    if revision.is_date() {
        Ok(revision)
    } else {
        Err(HistoryError::InvalidDateRevision(value.to_owned()))
    }
}

/// Historic derivation error types.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Svn(#[from] SvnError),

    #[error(transparent)]
    External(#[from] ExternalError),

    /// Revision is not wrapped in curly braces.
    #[error("invalid date revision {0:?}, expected {{<date>}}")]
    InvalidDateRevision(String),
}

/// Friendly result alias :3
pub type Result<T, E = HistoryError> = std::result::Result<T, E>;
