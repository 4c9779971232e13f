// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the YAML files that pin down a working copy setup.
//! Every layout can be parsed from, and rendered back into, a string. File I/O
//! is left to the caller to figure out.
//!
//! Repository URLs undergo shell expansion when parsed, so `$SVN_SERVER/repo`
//! and `~/mirror` are fine.

use crate::external::{ExternalDefinition, ExternalError};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Externals configuration layout, i.e., `.svnExternals.yml`.
///
/// Lists externals of a working copy so they can be reconciled without
/// asking a working copy or git-svn bridge for them.
///
/// ```yaml
/// svnRepoUrl: http://host/repo
/// externals:
///   - path: .
///     externalDefinition: -r 100 ^/trunk/lib@100 'my lib'
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalsConfig {
    /// URL of repository hosting all definitions.
    pub svn_repo_url: String,

    /// Definitions in reconciliation order.
    #[serde(default)]
    pub externals: Vec<ExternalEntry>,
}

impl ExternalsConfig {
    /// Parse all entries into externals hosted by `svn_repo_url`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::External`] for any malformed definition.
    pub fn definitions(&self) -> Result<Vec<ExternalDefinition>> {
        self.externals
            .iter()
            .map(|entry| {
                ExternalDefinition::parse(
                    self.svn_repo_url.as_str(),
                    entry.path.as_str(),
                    entry.external_definition.as_str(),
                )
                .map_err(ConfigError::from)
            })
            .collect()
    }

    /// Build configuration from live externals.
    ///
    /// Returns `None` if there is nothing to write down.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MixedRepositories`] if externals are hosted by
    ///   different repositories.
    pub fn from_definitions(externals: &[ExternalDefinition]) -> Result<Option<Self>> {
        let Some(first) = externals.first() else {
            return Ok(None);
        };

        let svn_repo_url = first.host_repo_url().to_owned();
        let mut entries = Vec::with_capacity(externals.len());
        for external in externals {
            if external.host_repo_url() != svn_repo_url {
                return Err(ConfigError::MixedRepositories {
                    expected: svn_repo_url,
                    found: external.host_repo_url().to_owned(),
                });
            }

            entries.push(ExternalEntry {
                path: external.declared_on().to_owned(),
                external_definition: external.to_string(),
            });
        }

        Ok(Some(Self {
            svn_repo_url,
            externals: entries,
        }))
    }
}

impl FromStr for ExternalsConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ExternalsConfig = serde_yaml::from_str(data)?;

        // INVARIANT: Perform shell expansion on repository URL.
        config.svn_repo_url = expand(&config.svn_repo_url)?;

        Ok(config)
    }
}

impl Display for ExternalsConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(serde_yaml::to_string(self).map_err(ConfigError::from)?.as_str())
    }
}

/// Single externals configuration entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEntry {
    /// Working copy relative folder the definition is declared on.
    pub path: String,

    /// Definition line, i.e., `[-r <rev>] <url>[@<peg>] <path>`.
    pub external_definition: String,
}

/// Sparse checkout configuration layout, i.e., `.svnSparseCheckout.yml`.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseCheckoutConfig {
    pub svn_repo_url: String,

    /// Repository relative file paths to fetch, `/` separated.
    #[serde(default)]
    pub files: Vec<String>,
}

impl FromStr for SparseCheckoutConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: SparseCheckoutConfig = serde_yaml::from_str(data)?;
        config.svn_repo_url = expand(&config.svn_repo_url)?;
        Ok(config)
    }
}

impl Display for SparseCheckoutConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(serde_yaml::to_string(self).map_err(ConfigError::from)?.as_str())
    }
}

/// Git-svn bridge definition layout, i.e., `.gitsvn.yml`.
///
/// Describes which branches of a Subversion repository a git repository
/// mirrors, so the bridge can be set up again in any fresh clone.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct BridgeDefinition {
    /// Root URL of the Subversion repository.
    pub url: String,

    /// Repository relative branch paths, e.g., `trunk` or `branches/1.x`.
    pub branches: Vec<String>,

    /// Regular expressions of repository paths git-svn should ignore.
    #[serde(rename = "ignore-paths", default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_paths: Vec<String>,
}

impl FromStr for BridgeDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: BridgeDefinition = serde_yaml::from_str(data)?;
        if definition.branches.is_empty() {
            return Err(ConfigError::NoBranches);
        }

        // INVARIANT: Branches and ignore paths act as sets.
        dedup(&mut definition.branches);
        dedup(&mut definition.ignore_paths);
        definition.url = expand(&definition.url)?;

        Ok(definition)
    }
}

impl Display for BridgeDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(serde_yaml::to_string(self).map_err(ConfigError::from)?.as_str())
    }
}

fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)?.into_owned())
}

fn dedup(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to serialize or deserialize configuration.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration holds a bad external definition.
    #[error(transparent)]
    External(#[from] ExternalError),

    /// Externals are hosted by more than one repository.
    #[error("externals hosted by {found:?}, but expected {expected:?}")]
    MixedRepositories { expected: String, found: String },

    /// Bridge definition lacks branches to track.
    #[error("bridge definition must list at least one branch")]
    NoBranches,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
