use anyhow::Result;
use bit_merge::areas::repository::Repository;
use bit_merge::artifacts::merge::options::{FastForwardStrategy, MergeFileFlags, MergeOptions};
use bit_merge::commands::plumbing::merge_file::{MergeFileArgs, merge_file};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `BIT_MERGE_LOG=bit_merge=debug`
const LOG_ENV: &str = "BIT_MERGE_LOG";

/// Exit status for errors, kept apart from conflict counts
const FATAL_STATUS: u8 = 128;

#[derive(Parser)]
#[command(
    name = "bit-merge",
    version = "0.1.0",
    author = "Sami Barbut-Dica",
    about = "Three-way merge plumbing for git object databases",
    long_about = "Merges files, trees and commits stored in a git object database. \
    Only objects are written; refs, the index and the working tree are left alone.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(long, global = true, default_value = ".git", help = "Path to the git directory")]
    git_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "merge-file",
        about = "Three-way merge of three files",
        long_about = "Merges the changes leading from <base> to <other> into <current>. \
        The exit status is the number of conflicts, capped at 127.",
        group(ArgGroup::new("whitespace").args(["ignore_all_space", "ignore_space_change", "ignore_space_at_eol"]))
    )]
    MergeFile {
        #[arg(short = 'p', long = "stdout", help = "Print the result instead of overwriting <current>")]
        stdout: bool,
        #[arg(long, help = "Include the base version in conflict markers")]
        diff3: bool,
        #[arg(long, help = "Ignore runs of non-alphanumeric characters when comparing lines")]
        zealous_alnum: bool,
        #[arg(long, help = "Use the patience diff algorithm")]
        patience: bool,
        #[arg(long, help = "Spend extra time to find the smallest diff")]
        minimal: bool,
        #[arg(long)]
        ignore_all_space: bool,
        #[arg(long)]
        ignore_space_change: bool,
        #[arg(long)]
        ignore_space_at_eol: bool,
        #[arg(short = 'L', num_args = 1, action = clap::ArgAction::Append, help = "Label for current, base and other, in that order")]
        label: Vec<String>,
        #[arg(index = 1)]
        current: PathBuf,
        #[arg(index = 2)]
        base: PathBuf,
        #[arg(index = 3)]
        other: PathBuf,
    },
    #[command(
        name = "merge-base",
        about = "Find the best common ancestor of two commits",
        long_about = "Prints the best common ancestor of two commits. \
        With --all every best common ancestor is printed, one per line."
    )]
    MergeBase {
        #[arg(long, help = "Print every merge base")]
        all: bool,
        #[arg(index = 1)]
        first: String,
        #[arg(index = 2)]
        second: String,
    },
    #[command(
        name = "merge-commits",
        about = "Merge two commits and write the merge commit",
        long_about = "Merges <theirs> into <ours>. A clean merge writes its objects to the \
        database and prints the resulting commit id; conflicts are listed and nothing is written. \
        Exits 1 on conflicts and 2 when --ff-only cannot fast-forward.",
        group(ArgGroup::new("fast_forward").args(["no_ff", "ff_only"]))
    )]
    MergeCommits {
        #[arg(long, help = "Always create a merge commit")]
        no_ff: bool,
        #[arg(long, help = "Refuse anything but a fast-forward")]
        ff_only: bool,
        #[arg(long, help = "Include the base version in conflict markers")]
        diff3: bool,
        #[arg(long, help = "Do not detect renames")]
        no_renames: bool,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), help = "Similarity percentage for renames")]
        rename_threshold: Option<u8>,
        #[arg(short, long, help = "The merge commit message")]
        message: Option<String>,
        #[arg(index = 1)]
        ours: String,
        #[arg(index = 2)]
        theirs: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("fatal: {:#}", err);
            ExitCode::from(FATAL_STATUS)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::MergeFile {
            stdout,
            diff3,
            zealous_alnum,
            patience,
            minimal,
            ignore_all_space,
            ignore_space_change,
            ignore_space_at_eol,
            label,
            current,
            base,
            other,
        } => {
            let mut flags = MergeFileFlags::DEFAULT;
            flags.set(MergeFileFlags::STYLE_DIFF3, diff3);
            flags.set(MergeFileFlags::SIMPLIFY_ALNUM, zealous_alnum);
            flags.set(MergeFileFlags::DIFF_PATIENCE, patience);
            flags.set(MergeFileFlags::DIFF_MINIMAL, minimal);
            flags.set(MergeFileFlags::IGNORE_WHITESPACE, ignore_all_space);
            flags.set(MergeFileFlags::IGNORE_WHITESPACE_CHANGE, ignore_space_change);
            flags.set(MergeFileFlags::IGNORE_WHITESPACE_EOL, ignore_space_at_eol);

            let args = MergeFileArgs {
                current,
                base,
                other,
                labels: label,
                flags,
                stdout,
            };
            let conflicts = merge_file(&args, &mut std::io::stdout())?;

            Ok(conflicts as u8)
        }
        Commands::MergeBase { all, first, second } => {
            let repository = Repository::new(&cli.git_dir, Box::new(std::io::stdout()))?;
            let found = repository.merge_base(&first, &second, all)?;

            Ok(if found { 0 } else { 1 })
        }
        Commands::MergeCommits {
            no_ff,
            ff_only,
            diff3,
            no_renames,
            rename_threshold,
            message,
            ours,
            theirs,
        } => {
            let repository = Repository::new(&cli.git_dir, Box::new(std::io::stdout()))?;

            let fast_forward = match (no_ff, ff_only) {
                (true, _) => FastForwardStrategy::NoFastForward,
                (_, true) => FastForwardStrategy::FastForwardOnly,
                _ => FastForwardStrategy::Default,
            };
            let mut options = MergeOptions {
                fast_forward,
                find_renames: !no_renames,
                message,
                ..MergeOptions::default()
            };
            options.file_flags.set(MergeFileFlags::STYLE_DIFF3, diff3);
            if let Some(threshold) = rename_threshold {
                options.rename_threshold = threshold;
            }

            let status = repository.merge_commits(&ours, &theirs, options).await?;

            Ok(status.exit_code())
        }
    }
}
