// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use svnbridge::{
    bridge::{self, InitOptions as BridgeInitOptions},
    config::BridgeDefinition,
    dispatch::DEFAULT_CONCURRENCY,
    gitsvn::GitSvn,
    path::{BRIDGE_DEFINITION_FILE, EXTERNALS_CONFIG_FILE, SPARSE_CHECKOUT_CONFIG_FILE},
    svn::Credentials,
    ExternalDefinition, Options, Revision, SvnCli, Workspace,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{fs, path::PathBuf, process::exit, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "svnbridge [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        if self.global.debug {
            "trace"
        } else if self.global.verbose {
            "debug"
        } else {
            "info"
        }
    }

    async fn run(self) -> Result<()> {
        let workspace = self.global.workspace();
        match self.command {
            Command::Externals(opts) => run_externals(&workspace, opts).await,
            Command::HistoricExternals => run_historic_externals(&workspace).await,
            Command::HistoricRev(opts) => run_historic_rev(&workspace, opts).await,
            Command::ExportExternals(opts) => run_export_externals(&workspace, opts),
            Command::SparseCheckout(opts) => run_sparse_checkout(&workspace, opts),
            Command::Sync => run_sync(&workspace),
            Command::Status => run_status(&workspace),
            Command::Init(opts) => run_init(&self.global, opts),
            Command::DefInit(opts) => run_def_init(&self.global, opts),
            Command::MigrateIgnore => run_migrate_ignore(&self.global),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Log what is going on in more detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log everything, including captured command output.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Inspect everything, but only log what would be changed.
    #[arg(short = 'N', long, global = true)]
    pub dry_run: bool,

    /// Number of externals to reconcile at once.
    #[arg(short, long, global = true, value_name = "n", default_value_t = DEFAULT_CONCURRENCY)]
    pub jobs: usize,

    /// Stop starting new externals once one fails.
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Working copy root to operate on.
    #[arg(short = 'C', long, global = true, value_name = "path", default_value = ".")]
    pub directory: PathBuf,

    /// Subversion user name.
    #[arg(long, global = true, value_name = "name")]
    pub username: Option<String>,

    /// Subversion password.
    #[arg(long, global = true, value_name = "password", requires = "username")]
    pub password: Option<String>,
}

impl GlobalOptions {
    fn svn(&self) -> SvnCli {
        let credentials = self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        });
        SvnCli::new().with_credentials(credentials)
    }

    fn workspace(&self) -> Workspace {
        let options = Options {
            dry_run: self.dry_run,
            concurrency: self.jobs,
            fail_fast: self.fail_fast,
            progress: !self.verbose && !self.debug,
        };
        Workspace::new(Arc::new(self.svn()), self.directory.clone(), options)
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Check out or update externals of working copy.
    #[command(override_usage = "svnbridge externals [options] [--config [<file>]]")]
    Externals(ExternalsOptions),

    /// Check out externals as they were at the revision local work is based on.
    HistoricExternals,

    /// Move working copy and its externals back to a date.
    #[command(override_usage = "svnbridge historic-rev [options] -r <{date}>")]
    HistoricRev(HistoricRevOptions),

    /// Write externals of working copy into an externals configuration file.
    ExportExternals(ExportExternalsOptions),

    /// Fetch a listed set of files without their siblings.
    SparseCheckout(SparseCheckoutOptions),

    /// Move svn working copy to the git-svn branch point of HEAD.
    Sync,

    /// Show how svn working copy and git-svn bridge relate.
    Status,

    /// Turn a clean svn working copy into a git-svn bridge.
    Init(InitOptions),

    /// Set up git-svn bridge in a git clone from a bridge definition.
    DefInit(DefInitOptions),

    /// Make git ignore what Subversion ignores.
    MigrateIgnore,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExternalsOptions {
    /// Read externals from configuration file instead of the working copy.
    #[arg(
        short,
        long,
        value_name = "file",
        num_args = 0..=1,
        default_missing_value = EXTERNALS_CONFIG_FILE
    )]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct HistoricRevOptions {
    /// Date to go back to, i.e., `{2024-05-01}`.
    #[arg(short, long, required = true, value_name = "{date}")]
    pub revision: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportExternalsOptions {
    /// Configuration file to write.
    #[arg(short, long, value_name = "file", default_value = EXTERNALS_CONFIG_FILE)]
    pub output: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SparseCheckoutOptions {
    /// Sparse checkout configuration to read.
    #[arg(short, long, value_name = "file", default_value = SPARSE_CHECKOUT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Revision to fetch instead of HEAD.
    #[arg(short, long, value_name = "rev")]
    pub revision: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Working copy relative folder for git-svn to ignore.
    #[arg(short, long, value_name = "dir")]
    pub ignore_dir: Vec<String>,

    /// Revision to start fetching at.
    #[arg(short, long, value_name = "rev")]
    pub revision: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DefInitOptions {
    /// Bridge definition to read.
    #[arg(long, value_name = "file", default_value = BRIDGE_DEFINITION_FILE)]
    pub definition: PathBuf,

    /// Git remote holding the branches to track.
    #[arg(long, value_name = "name", default_value = "origin")]
    pub remote: String,

    /// Recreate tracking references that exist already.
    #[arg(short, long)]
    pub force: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_filter()))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn reconcile(workspace: &Workspace, externals: Vec<ExternalDefinition>) -> Result<()> {
    let report = workspace.checkout_externals(externals).await?;
    report.ensure_success()?;
    Ok(())
}

async fn run_externals(workspace: &Workspace, opts: ExternalsOptions) -> Result<()> {
    let externals = match opts.config {
        Some(path) => workspace.config_externals(&workspace.root().join(path))?,
        None => workspace.live_externals()?,
    };

    reconcile(workspace, externals).await
}

async fn run_historic_externals(workspace: &Workspace) -> Result<()> {
    let externals = workspace.historic_externals()?;
    if workspace.options().dry_run {
        return Ok(());
    }

    reconcile(workspace, externals).await
}

async fn run_historic_rev(workspace: &Workspace, opts: HistoricRevOptions) -> Result<()> {
    let externals = workspace.historic_rev(&opts.revision)?;
    reconcile(workspace, externals).await
}

fn run_export_externals(workspace: &Workspace, opts: ExportExternalsOptions) -> Result<()> {
    let path = workspace.root().join(opts.output);
    if workspace.export_externals(&path)?.is_none() {
        info!("nothing written");
    }

    Ok(())
}

fn run_sparse_checkout(workspace: &Workspace, opts: SparseCheckoutOptions) -> Result<()> {
    let path = workspace.root().join(opts.config);
    workspace.sparse_checkout(&path, opts.revision.map(Revision::new))?;
    Ok(())
}

fn run_sync(workspace: &Workspace) -> Result<()> {
    workspace.sync_with_git()?;
    Ok(())
}

fn run_status(workspace: &Workspace) -> Result<()> {
    println!("{}", workspace.status()?);
    Ok(())
}

fn run_init(global: &GlobalOptions, opts: InitOptions) -> Result<()> {
    let options = BridgeInitOptions {
        ignore_dirs: opts.ignore_dir,
        revision: opts.revision.map(Revision::new),
        dry_run: global.dry_run,
    };
    bridge::init(&global.svn(), &global.directory, &options)?;
    Ok(())
}

fn run_def_init(global: &GlobalOptions, opts: DefInitOptions) -> Result<()> {
    let path = global.directory.join(opts.definition);
    let definition: BridgeDefinition = fs::read_to_string(&path)
        .with_context(|| format!("failed to read bridge definition {:?}", path.display()))?
        .parse()?;
    if global.dry_run {
        info!("would set up git-svn bridge for {}", definition.url);
        return Ok(());
    }

    let gitsvn = GitSvn::discover(&global.directory)?;
    bridge::def_init(&gitsvn, &definition, &opts.remote, opts.force)?;
    Ok(())
}

fn run_migrate_ignore(global: &GlobalOptions) -> Result<()> {
    if global.dry_run {
        info!("would rewrite .git/info/exclude");
        return Ok(());
    }

    let gitsvn = GitSvn::discover(&global.directory)?;
    bridge::migrate_ignore(&gitsvn)?;
    Ok(())
}
