// Command-line surface. Options that only matter when pointing the tool at
// another deployment or debugging a submission are hidden from --help but
// fully functional.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fairflow",
    version,
    about = "Submit datasets to the FAIR-RE ingest flow and track their progress"
)]
pub struct Cli {
    /// Chattier diagnostics on stderr (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a dataset (a directory or a pre-built bag) to the ingest flow
    Run(RunArgs),
    /// Check on the most recent flow, or on a specific one
    Status(StatusArgs),
    /// Log in to the flow service and cache credentials
    Login(LoginArgs),
    /// Revoke cached credentials
    Logout,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory or pre-built bag archive to submit
    pub data_path: PathBuf,

    /// Author email recorded with the submission
    #[arg(short = 'e', long, visible_alias = "email")]
    pub author_email: Option<String>,

    /// Catalog to ingest into, when not the default
    #[arg(long)]
    pub catalog: Option<String>,

    /// Schema describing the dataset layout
    #[arg(long)]
    pub schema: Option<String>,

    /// JSON file with access control lists for the dataset
    #[arg(long)]
    pub acl_file: Option<PathBuf>,

    /// Build the bag here instead of alongside the data
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Delete the output directory once the bag is submitted
    #[arg(long, overrides_with = "keep_dir")]
    pub delete_dir: bool,

    /// Keep the output directory (the default)
    #[arg(long, overrides_with = "delete_dir")]
    pub keep_dir: bool,

    /// Leave git repositories in the dataset alone
    #[arg(long, overrides_with = "handle_git")]
    pub ignore_git: bool,

    /// Record git repository metadata in the bag (the default)
    #[arg(long, overrides_with = "ignore_git")]
    pub handle_git: bool,

    /// Validate everything but submit nothing and save nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Discard cached credentials and log in again
    #[arg(long)]
    pub force_login: bool,

    /// Print the login URL instead of opening a browser
    #[arg(long, hide = true)]
    pub no_browser: bool,

    /// Catalog server override, interpreted by the flow
    #[arg(long, hide = true)]
    pub server: Option<String>,

    /// Use plain HTTP for the data transfer
    #[arg(long, hide = true)]
    pub force_http: bool,

    /// JSON file of extra keyword options for bag construction
    #[arg(long, hide = true)]
    pub bag_kwargs_file: Option<PathBuf>,

    /// Session state file to read and update
    #[arg(long, hide = true)]
    pub client_state_file: Option<PathBuf>,

    /// Named service deployment to submit to (prod, staging, dev)
    #[arg(long, hide = true)]
    pub service_instance: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Flow to query, instead of the one from the last submission
    #[arg(long)]
    pub flow_id: Option<String>,

    /// Specific run of that flow to query
    #[arg(long)]
    pub flow_instance_id: Option<String>,

    /// Print the full status structure instead of the one-line summary
    #[arg(long)]
    pub raw: bool,

    /// Session state file to read
    #[arg(long, hide = true)]
    pub client_state_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Discard cached credentials and log in again
    #[arg(long)]
    pub force_login: bool,

    /// Print the login URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}
