use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sawfile",
    about = "Sawfile: tamper-evident ledgers of installed and generated files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger file (overrides the config file)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Directory ledger filenames are relative to
    #[arg(long, global = true)]
    pub base: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check every ledger entry against the files on disk
    Verify(VerifyArgs),
    /// Register files in the ledger
    Add(AddArgs),
    /// Register every file under a directory
    Seal(SealArgs),
    /// Refresh the digest of files that already have an entry
    Update(UpdateArgs),
    /// Print the ledger entries
    List(ListArgs),
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Filename that must have an entry (repeatable)
    #[arg(long = "require", value_name = "NAME")]
    pub require: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct SealArgs {
    pub dir: PathBuf,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sawfile", "verify", "--ledger", "install.keys", "--require", "app.exe",
            "--require", "lib.so", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.ledger, Some(PathBuf::from("install.keys")));
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        assert_eq!(args.require, vec!["app.exe", "lib.so"]);
    }

    #[test]
    fn add_requires_a_path() {
        assert!(Cli::try_parse_from(["sawfile", "add"]).is_err());
    }
}
