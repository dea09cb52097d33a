use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hb",
    about = "hashback: content-addressed backup and replication",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store directory. Settings are read from `hashback.toml` inside it.
    #[arg(long, global = true, default_value = ".")]
    pub store: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Back up a directory as a new snapshot of a source
    Push(PushArgs),
    /// Copy a source's history from a remote store
    Pull(PullArgs),
    /// Show the commit history of a source
    Log(LogArgs),
    /// Show a commit, a directory, or a blob
    Show(ShowArgs),
    /// Show changes between two commits or directories
    Diff(DiffArgs),
    /// List the sources of the store
    Sources,
    /// Serve the store over TCP
    Serve(ServeArgs),
    /// Manage named peers
    Peer(PeerArgs),
}

#[derive(Args)]
pub struct PushArgs {
    pub path: PathBuf,
    #[arg(short, long)]
    pub source: String,
    /// Remote to push to: tcp://host:port, a peer name, or a store
    /// directory. Defaults to the local store.
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args)]
pub struct PullArgs {
    #[arg(short, long)]
    pub source: String,
    #[arg(long)]
    pub from: String,
    /// Overwrite a divergent local history
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short, long)]
    pub source: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub hash: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub old: String,
    pub new: String,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Server configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct PeerArgs {
    #[command(subcommand)]
    pub action: Option<PeerAction>,
}

#[derive(Subcommand)]
pub enum PeerAction {
    Add { name: String, address: String },
    Remove { name: String },
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_push() {
        let cli = Cli::try_parse_from(["hb", "push", "/data", "-s", "laptop", "--to", "tcp://nas:9419"]).unwrap();
        if let Command::Push(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("/data"));
            assert_eq!(args.source, "laptop");
            assert_eq!(args.to.as_deref(), Some("tcp://nas:9419"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_pull_force() {
        let cli = Cli::try_parse_from(["hb", "--store", "/backup", "pull", "-s", "laptop", "--from", "nas", "--force"]).unwrap();
        assert_eq!(cli.store, PathBuf::from("/backup"));
        if let Command::Pull(args) = cli.command {
            assert!(args.force);
            assert_eq!(args.from, "nas");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_log_defaults() {
        let cli = Cli::try_parse_from(["hb", "log", "-s", "laptop"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert_eq!(args.limit, 20);
            assert!(!args.oneline);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_peer_add() {
        let cli = Cli::try_parse_from(["hb", "peer", "add", "nas", "tcp://nas:9419"]).unwrap();
        if let Command::Peer(PeerArgs {
            action: Some(PeerAction::Add { name, address }),
        }) = cli.command
        {
            assert_eq!(name, "nas");
            assert_eq!(address, "tcp://nas:9419");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve_config() {
        let cli = Cli::try_parse_from(["hb", "serve", "--config", "server.toml"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("server.toml")));
            assert!(args.bind.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn push_requires_source() {
        assert!(Cli::try_parse_from(["hb", "push", "/data"]).is_err());
    }
}
