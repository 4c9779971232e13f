// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! In-memory remote backed by a real local filesystem.
//!
//! Every versioned directory carries a `.svn/url` marker holding the URL it
//! tracks and a `.svn/rev` marker holding its revision. Versioned files are
//! listed in `.svn/files` of their parent. A `.svn/dirty` marker flags
//! uncommitted modifications.

use crate::{
    external::Revision,
    svn::{info::Info, CheckoutOptions, Depth, NodeKind, Result, Subversion, SvnError, UpdateOptions},
};

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Checkout {
        locator: String,
        target: PathBuf,
        revision: Option<Revision>,
        depth: Option<Depth>,
        force: bool,
        target_existed: bool,
    },
    Update {
        target: PathBuf,
        revision: Option<Revision>,
        set_depth: Option<Depth>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct FakeSvn {
    root: String,
    remote: HashMap<String, NodeKind>,
    commits: BTreeMap<u64, String>,
    changes: HashMap<String, Vec<u64>>,
    externals_listing: String,
    delay: Option<Duration>,
    info_failure: Option<String>,
    panic_on: Option<String>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSvn {
    pub(crate) fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub(crate) fn with_remote(mut self, url: impl Into<String>, kind: NodeKind) -> Self {
        self.remote.insert(url.into(), kind);
        self
    }

    /// Register a repository commit, touching the given URLs.
    pub(crate) fn with_commit(mut self, revision: u64, date: &str, touched: &[&str]) -> Self {
        self.commits.insert(revision, date.to_owned());
        for url in touched {
            self.changes.entry((*url).to_owned()).or_default().push(revision);
        }
        self
    }

    pub(crate) fn with_externals_listing(mut self, listing: impl Into<String>) -> Self {
        self.externals_listing = listing.into();
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every `info` query the way an unreachable server does.
    pub(crate) fn with_info_failure(mut self, message: impl Into<String>) -> Self {
        self.info_failure = Some(message.into());
        self
    }

    /// Panic when checking out locator.
    pub(crate) fn with_panic_on(mut self, locator: impl Into<String>) -> Self {
        self.panic_on = Some(locator.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn checkouts(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Checkout { .. }))
            .collect()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Mark directory as working copy of url.
    pub(crate) fn seed_working_copy(&self, path: &Path, url: &str) -> std::io::Result<()> {
        write_marker(path, url, self.head())
    }

    pub(crate) fn make_dirty(&self, path: &Path) -> std::io::Result<()> {
        let admin = if path.is_dir() {
            path.join(".svn")
        } else {
            parent_of(path).join(".svn")
        };
        fs::write(admin.join("dirty"), "")
    }

    fn head(&self) -> u64 {
        self.commits.keys().next_back().copied().unwrap_or(1)
    }

    fn resolve(&self, revision: Option<&Revision>, local: Option<&Path>) -> u64 {
        let Some(revision) = revision else {
            return self.head();
        };

        if let Some(number) = revision.number() {
            return number;
        }

        match revision.as_str() {
            "BASE" => local
                .and_then(|path| fs::read_to_string(admin_of(path).join("rev")).ok())
                .and_then(|rev| rev.trim().parse().ok())
                .unwrap_or(0),
            date if revision.is_date() => {
                let date = &date[1..date.len() - 1];
                self.commits
                    .iter()
                    .filter(|(_, commit)| commit.as_str() <= date)
                    .map(|(rev, _)| *rev)
                    .next_back()
                    .unwrap_or(0)
            }
            _ => self.head(),
        }
    }

    fn last_changed(&self, url: &str, at: u64) -> Option<u64> {
        if url.trim_end_matches('/') == self.root.trim_end_matches('/') {
            return self.commits.keys().copied().filter(|rev| *rev <= at).next_back();
        }

        self.changes
            .get(url)?
            .iter()
            .copied()
            .filter(|rev| *rev <= at)
            .max()
    }

    fn remote_kind(&self, url: &str) -> Option<NodeKind> {
        if url.trim_end_matches('/') == self.root.trim_end_matches('/') {
            return Some(NodeKind::Directory);
        }
        self.remote.get(url).copied()
    }

    fn local_info(&self, path: &Path, revision: Option<&Revision>) -> Result<Info> {
        let (kind, url) = match local_url(path) {
            Some(found) => found,
            None => {
                return Err(SvnError::RemoteUnreachable {
                    locator: path.display().to_string(),
                    revision: revision.cloned(),
                })
            }
        };
        let base = self.resolve(Some(&Revision::new("BASE")), Some(path));
        let rev = match revision {
            Some(revision) if revision.as_str() != "BASE" => self.resolve(Some(revision), None),
            _ => base,
        };

        let relative = url.strip_prefix(self.root.trim_end_matches('/')).unwrap_or(&url);
        Ok(Info::new(kind, url.clone(), Revision::from(rev))
            .with_repository_root(self.root.clone())
            .with_relative_url(format!("^{relative}")))
    }

    fn query(&self, target: &str, revision: Option<&Revision>) -> Result<Info> {
        if let Some(message) = &self.info_failure {
            return Err(SvnError::RemoteCommandFailure {
                command: format!("svn info {target}"),
                message: message.clone(),
            });
        }

        if !target.contains("://") {
            return self.local_info(Path::new(target), revision);
        }

        let url = strip_peg(target);
        let unreachable = || SvnError::RemoteUnreachable {
            locator: target.to_owned(),
            revision: revision.cloned(),
        };
        let kind = self.remote_kind(url).ok_or_else(unreachable)?;
        let at = self.resolve(revision, None);
        let mut info = Info::new(kind, url, Revision::from(at)).with_repository_root(self.root.clone());
        if let Some(last) = self.last_changed(url, at) {
            if let Some(date) = self.commits.get(&last) {
                info = info.with_last_changed(Revision::from(last), date.clone());
            }
        }

        Ok(info)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Subversion for FakeSvn {
    fn info(&self, target: &str, revision: Option<&Revision>) -> Result<Info> {
        self.enter();
        let result = self.query(target, revision);
        self.leave();
        result
    }

    fn checkout(&self, locator: &str, target: &Path, options: &CheckoutOptions) -> Result<()> {
        if self.panic_on.as_deref() == Some(strip_peg(locator)) {
            panic!("checkout of {locator} blew up");
        }

        self.enter();
        self.calls.lock().unwrap().push(Call::Checkout {
            locator: locator.to_owned(),
            target: target.to_owned(),
            revision: options.revision.clone(),
            depth: options.depth,
            force: options.force,
            target_existed: target.exists(),
        });

        let url = strip_peg(locator);
        let result = match self.remote_kind(url) {
            Some(NodeKind::Directory) => {
                let rev = self.resolve(options.revision.as_ref(), None);
                write_marker(target, url, rev).map_err(|error| SvnError::RemoteCommandFailure {
                    command: format!("svn checkout {locator}"),
                    message: error.to_string(),
                })
            }
            Some(_) => Err(SvnError::RemoteCommandFailure {
                command: format!("svn checkout {locator}"),
                message: "svn: E170000: URL refers to a file, not a directory".into(),
            }),
            None => Err(SvnError::RemoteUnreachable {
                locator: locator.to_owned(),
                revision: options.revision.clone(),
            }),
        };

        self.leave();
        result
    }

    fn update(&self, target: &Path, options: &UpdateOptions) -> Result<()> {
        self.enter();
        self.calls.lock().unwrap().push(Call::Update {
            target: target.to_owned(),
            revision: options.revision.clone(),
            set_depth: options.set_depth,
        });

        let failure = |message: &str| SvnError::RemoteCommandFailure {
            command: format!("svn update {}", target.display()),
            message: message.to_owned(),
        };
        let result = (|| {
            let rev = self.resolve(options.revision.as_ref(), None);
            if local_url(target).is_some() {
                if target.is_dir() {
                    fs::write(target.join(".svn/rev"), rev.to_string())
                        .map_err(|error| failure(&error.to_string()))?;
                }
                return Ok(());
            }

            // Widen depth of an unversioned child of a versioned folder.
            let parent = parent_of(target);
            let name = target
                .file_name()
                .ok_or_else(|| failure("path has no name"))?
                .to_string_lossy()
                .into_owned();
            let (_, parent_url) = local_url(parent)
                .ok_or_else(|| failure("svn: E155007: not a working copy"))?;
            let url = format!("{parent_url}/{name}");
            let kind = match (self.remote_kind(&url), options.set_depth) {
                (Some(kind), _) => kind,
                (None, Some(Depth::Empty)) => NodeKind::Directory,
                (None, _) => NodeKind::File,
            };

            let written = match kind {
                NodeKind::Directory => write_marker(target, &url, rev),
                _ => fs::write(target, format!("{url}\n")).and_then(|_| {
                    let listing = parent.join(".svn/files");
                    let mut files = fs::read_to_string(&listing).unwrap_or_default();
                    files.push_str(&name);
                    files.push('\n');
                    fs::write(listing, files)
                }),
            };
            written.map_err(|error| failure(&error.to_string()))
        })();

        self.leave();
        result
    }

    fn is_modified(&self, path: &Path) -> Result<bool> {
        Ok(admin_of(path).join("dirty").exists())
    }

    fn externals_property(&self, _path: &Path) -> Result<String> {
        Ok(self.externals_listing.clone())
    }

    fn log_revisions(&self, _path: &Path, from: &Revision, to: &Revision) -> Result<Vec<u64>> {
        let from = self.resolve(Some(from), None);
        let to = self.resolve(Some(to), None);
        Ok(self.commits.keys().copied().filter(|rev| (from..=to).contains(rev)).collect())
    }
}

fn strip_peg(locator: &str) -> &str {
    match locator.rsplit_once('@') {
        Some((url, peg)) if !peg.contains('/') => url,
        _ => locator,
    }
}

fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

fn admin_of(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(".svn")
    } else {
        parent_of(path).join(".svn")
    }
}

fn write_marker(path: &Path, url: &str, revision: u64) -> std::io::Result<()> {
    let admin = path.join(".svn");
    fs::create_dir_all(&admin)?;
    fs::write(admin.join("url"), url)?;
    fs::write(admin.join("rev"), revision.to_string())
}

fn local_url(path: &Path) -> Option<(NodeKind, String)> {
    if path.is_dir() {
        let url = fs::read_to_string(path.join(".svn/url")).ok()?;
        return Some((NodeKind::Directory, url));
    }

    if path.is_file() {
        let parent = parent_of(path);
        let name = path.file_name()?.to_string_lossy().into_owned();
        let files = fs::read_to_string(parent.join(".svn/files")).ok()?;
        if files.lines().any(|line| line == name) {
            let parent_url = fs::read_to_string(parent.join(".svn/url")).ok()?;
            return Some((NodeKind::File, format!("{parent_url}/{name}")));
        }
    }

    None
}
