// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{RepoFixture, SVN_ROOT};

use anyhow::Result;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::env::current_dir;
use svnbridge::{
    bridge::{def_init, BridgeError},
    config::BridgeDefinition,
    gitsvn::{FetchMapping, GitSvn},
};

fn definition(branches: &[&str], ignore_paths: &[&str]) -> BridgeDefinition {
    BridgeDefinition {
        url: SVN_ROOT.into(),
        branches: branches.iter().map(ToString::to_string).collect(),
        ignore_paths: ignore_paths.iter().map(ToString::to_string).collect(),
    }
}

fn clone_with_remote_branches(branches: &[&str]) -> Result<RepoFixture> {
    let fixture = RepoFixture::new(current_dir()?)?.bridged()?;
    fixture.commit("README.md", "readme")?;
    for branch in branches {
        fixture.reference(&format!("refs/remotes/origin/{branch}"))?;
    }
    Ok(fixture)
}

#[sealed_test]
fn def_init_sets_up_tracking() -> Result<()> {
    let fixture = clone_with_remote_branches(&["trunk", "1.x"])?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    let definition = definition(&["trunk", "branches/1.x"], &["lib/", "docs/"]);

    def_init(&gitsvn, &definition, "origin", false)?;
    assert_eq!(
        gitsvn.fetch_mappings()?,
        vec![
            FetchMapping::for_branch("trunk"),
            FetchMapping::for_branch("branches/1.x")
        ]
    );
    assert!(gitsvn.reference_exists("refs/remotes/git-svn/trunk"));
    assert!(gitsvn.reference_exists("refs/remotes/git-svn/1.x"));
    assert_eq!(gitsvn.ignore_paths()?, Some("(lib/|docs/)".to_string()));

    // Running again changes nothing.
    def_init(&gitsvn, &definition, "origin", false)?;
    assert_eq!(gitsvn.fetch_mappings()?.len(), 2);

    Ok(())
}

#[sealed_test]
fn def_init_refuses_other_repository() -> Result<()> {
    let fixture = clone_with_remote_branches(&["trunk"])?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    let mut definition = definition(&["trunk"], &[]);
    definition.url = "http://elsewhere/svn".into();

    let result = def_init(&gitsvn, &definition, "origin", false);
    assert!(matches!(result, Err(BridgeError::BridgeUrlMismatch { .. })));

    Ok(())
}

#[sealed_test]
fn def_init_refuses_conflicting_mapping() -> Result<()> {
    let fixture = clone_with_remote_branches(&["trunk"])?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    gitsvn.add_fetch_mapping(&"trunk:refs/remotes/git-svn/main".parse()?)?;

    let result = def_init(&gitsvn, &definition(&["trunk"], &[]), "origin", false);
    assert!(matches!(result, Err(BridgeError::ConflictingFetchMapping { .. })));

    Ok(())
}

#[sealed_test]
fn def_init_needs_remote_branch() -> Result<()> {
    let fixture = clone_with_remote_branches(&[])?;
    let gitsvn = GitSvn::discover(fixture.path())?;

    let result = def_init(&gitsvn, &definition(&["trunk"], &[]), "upstream", false);
    assert!(matches!(
        result,
        Err(BridgeError::MissingReference(source)) if source == "refs/remotes/upstream/trunk"
    ));

    Ok(())
}

#[sealed_test]
fn def_init_refuses_other_ignore_paths() -> Result<()> {
    let fixture = clone_with_remote_branches(&["trunk"])?;
    let gitsvn = GitSvn::discover(fixture.path())?;
    gitsvn.set_ignore_paths("(vendor/)")?;

    let result = def_init(&gitsvn, &definition(&["trunk"], &["lib/"]), "origin", false);
    assert!(matches!(result, Err(BridgeError::IgnorePathsAlreadySet(_))));

    Ok(())
}

#[sealed_test]
fn def_init_refuses_dirty_clone() -> Result<()> {
    let fixture = clone_with_remote_branches(&["trunk"])?;
    fixture.write("README.md", "changed")?;
    let gitsvn = GitSvn::discover(fixture.path())?;

    let result = def_init(&gitsvn, &definition(&["trunk"], &[]), "origin", false);
    assert!(matches!(result, Err(BridgeError::DirtyGitRepository)));

    Ok(())
}
