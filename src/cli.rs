use clap::{Parser, Subcommand};

/// Clones repositories into a predictable host/path directory layout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base directory for persistent clones. Overrides $GITREPO_DIR; defaults to ~/gitrepo.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<String>,

    /// Clone into a fresh temporary directory instead of the storage layout.
    #[arg(long)]
    pub tmp: bool,

    /// Additional environment for git, as comma-separated key=value pairs.
    #[arg(long, value_name = "KEY=VALUE,...", default_value = "")]
    pub env: String,

    /// The git executable to delegate to.
    #[arg(long, value_name = "PROGRAM", default_value = "git")]
    pub git: String,

    /// Enable verbose logging. Use -v for info, -vv for debug.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone a repository into its resolved directory.
    Clone {
        /// The repository URL.
        url: String,
    },
}
