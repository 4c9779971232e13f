// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Concurrent reconciliation of many externals.
//!
//! Reconciliation blocks on the remote client for its whole lifetime, so each
//! one runs on tokio's blocking pool. At most `concurrency` of them are in
//! flight at any instant. Externals are assumed to have disjoint target paths;
//! nested externals are not locked against each other.
//!
//! A failing external never cancels its siblings unless fail-fast is asked
//! for. Even then, externals already running are left to finish, only those
//! not yet started are skipped.

use crate::{
    external::ExternalDefinition,
    reconcile::{Reconciled, ReconcileError, Reconciler},
    svn::{Subversion, SvnCli},
};

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{error, info, info_span, instrument, warn};

/// Default number of externals reconciled at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Final state of a single dispatched external.
#[derive(Debug)]
pub enum Outcome {
    Done(Reconciled),
    Failed(ReconcileError),

    /// Never started, because fail-fast was triggered by a sibling.
    Skipped,

    /// Worker died before reporting back, e.g., it panicked.
    Panicked(String),
}

/// Aggregated outcome of all dispatched externals, in input order.
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<(ExternalDefinition, Outcome)>,
}

impl Report {
    pub fn entries(&self) -> &[(ExternalDefinition, Outcome)] {
        self.entries.as_slice()
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Done(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped))
    }

    /// Externals that failed or whose worker died.
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded() - self.skipped()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ExternalDefinition, &ReconcileError)> {
        self.entries.iter().filter_map(|(external, outcome)| match outcome {
            Outcome::Failed(error) => Some((external, error)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.succeeded() == self.total()
    }

    /// Turn report into an error if any external did not succeed.
    ///
    /// # Errors
    ///
    /// - Return [`DispatchError::Failed`] if any external failed or was
    ///   skipped.
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }

        for (external, outcome) in &self.entries {
            match outcome {
                Outcome::Failed(error) => error!("{external}: {error}"),
                Outcome::Panicked(reason) => error!("{external}: worker died: {reason}"),
                _ => {}
            }
        }

        Err(DispatchError::Failed {
            failed: self.failed(),
            skipped: self.skipped(),
            total: self.total(),
        })
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, outcome)| predicate(outcome)).count()
    }
}

/// Fan reconciliation out over a bounded pool of blocking workers.
#[derive(Debug)]
pub struct Dispatcher<S = SvnCli>
where
    S: Subversion,
{
    reconciler: Reconciler<S>,
    concurrency: usize,
    fail_fast: bool,
    bar: ProgressBar,
}

impl<S> Dispatcher<S>
where
    S: Subversion,
{
    pub fn new(reconciler: Reconciler<S>) -> Self {
        Self {
            reconciler,
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            bar: ProgressBar::hidden(),
        }
    }

    /// Set worker pool size. Zero is treated as one.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Skip externals not yet started once any external fails.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Show progress through a styled progress bar.
    ///
    /// # Errors
    ///
    /// - Return [`DispatchError::IndicatifStyleTemplate`] if the progress bar
    ///   template is bad.
    pub fn with_progress(mut self) -> Result<Self> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco.");
        self.bar = ProgressBar::new(0).with_style(style);
        Ok(self)
    }

    /// Reconcile all externals.
    ///
    /// Every external is reconciled exactly once, or skipped under fail-fast.
    /// Individual failures, panicking workers included, end up in the
    /// returned [`Report`] once every worker has finished.
    #[instrument(skip(self, externals), fields(count = externals.len()), level = "debug")]
    pub async fn reconcile_all(&self, externals: Vec<ExternalDefinition>) -> Report {
        info!(
            "reconcile {} externals, {} at a time",
            externals.len(),
            self.concurrency
        );
        self.bar.set_length(externals.len() as u64);
        let abort = Arc::new(AtomicBool::new(false));

        let tasks = externals.into_iter().enumerate().map(|(index, external)| {
            let reconciler = self.reconciler.clone();
            let abort = Arc::clone(&abort);
            let fail_fast = self.fail_fast;
            let bar = self.bar.clone();
            let path = external.target_path(".");
            let span = info_span!("external", path = %path.display());

            // INVARIANT: Blocking task spawns on first poll, so the stream bounds it.
            async move {
                let declared = external.clone();
                let sibling_abort = Arc::clone(&abort);
                let sibling_bar = bar.clone();
                let task = tokio::task::spawn_blocking(move || {
                    span.in_scope(|| {
                        if abort.load(Ordering::SeqCst) {
                            warn!("skipped, a sibling external failed");
                            return Outcome::Skipped;
                        }

                        bar.set_message(external.to_string());
                        let outcome = match reconciler.reconcile(&external) {
                            Ok(reconciled) => {
                                info!("{reconciled}");
                                Outcome::Done(reconciled)
                            }
                            Err(error) => {
                                error!("{error}");
                                if fail_fast {
                                    abort.store(true, Ordering::SeqCst);
                                }
                                Outcome::Failed(error)
                            }
                        };
                        bar.inc(1);
                        outcome
                    })
                });

                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        error!("worker for {declared} died: {error}");
                        if fail_fast {
                            sibling_abort.store(true, Ordering::SeqCst);
                        }
                        sibling_bar.inc(1);
                        Outcome::Panicked(error.to_string())
                    }
                };
                (index, (declared, outcome))
            }
        });

        let mut entries = stream::iter(tasks)
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        self.bar.finish_and_clear();

        entries.sort_by_key(|(index, _)| *index);
        let report = Report {
            entries: entries.into_iter().map(|(_, entry)| entry).collect(),
        };
        info!(
            "{} of {} externals reconciled",
            report.succeeded(),
            report.total()
        );

        report
    }
}

/// Dispatch error types.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Some externals failed or were skipped.
    #[error("{failed} of {total} externals failed, {skipped} skipped")]
    Failed {
        failed: usize,
        skipped: usize,
        total: usize,
    },

    /// Progress bar template is invalid.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
