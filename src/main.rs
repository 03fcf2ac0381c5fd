use anyhow::Result;
use clap::{Parser, Subcommand};
use mygit::areas::repository::Repository;
use mygit::artifacts::core::repository_error::RepositoryError;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mygit",
    version = "0.1.0",
    about = "A minimal version control system",
    long_about = "A minimal version control system storing content-addressed objects, \
    a binary staging index and branch refs under a .mygit directory.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[arg(
        short = 'p',
        long = "path",
        global = true,
        default_value = ".",
        help = "Root of the repository to operate on"
    )]
    repo_path: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Create an empty repository",
        long_about = "This command creates the .mygit directory with an unborn initial branch."
    )]
    Init {
        #[arg(short = 'b', long = "initial-branch", help = "Name of the initial branch")]
        initial_branch: Option<String>,
    },
    #[command(
        name = "add",
        about = "Stage file contents",
        long_about = "This command stores the given files (directories are expanded) \
        and records them in the index. Tracked files missing on disk are unstaged."
    )]
    Add {
        #[arg(index = 1, required = true, num_args = 1.., help = "Files or directories to stage")]
        paths: Vec<String>,
    },
    #[command(
        name = "rm",
        about = "Remove files from the index and the working tree"
    )]
    Rm {
        #[arg(long, help = "Only remove from the index")]
        cached: bool,
        #[arg(short = 'r', help = "Allow recursive removal of directories")]
        recursive: bool,
        #[arg(index = 1, required = true, num_args = 1.., help = "Paths to remove")]
        paths: Vec<String>,
    },
    #[command(
        name = "commit",
        about = "Record the staged snapshot",
        long_about = "This command creates a commit from the index on top of HEAD. \
        While a merge is in progress the message defaults to the merge message."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: Option<String>,
    },
    #[command(name = "status", about = "Show the working tree status")]
    Status {
        #[arg(long, help = "Machine readable output")]
        porcelain: bool,
    },
    #[command(name = "log", about = "Show the commit history from HEAD")]
    Log {
        #[arg(long, help = "One commit per line")]
        oneline: bool,
    },
    #[command(
        name = "branch",
        about = "List, create or delete branches",
        long_about = "Without arguments this command lists the branches. \
        Given a name it creates a branch at the start point, HEAD by default."
    )]
    Branch {
        #[arg(
            short = 'd',
            long = "delete",
            value_name = "BRANCH",
            conflicts_with_all = ["name", "start_point"],
            help = "Delete a branch"
        )]
        delete: Option<String>,
        #[arg(index = 1, help = "Name of the branch to create")]
        name: Option<String>,
        #[arg(index = 2, requires = "name", help = "Branch or commit to start from")]
        start_point: Option<String>,
    },
    #[command(
        name = "checkout",
        about = "Switch branches or detach HEAD at a commit"
    )]
    Checkout {
        #[arg(
            short = 'b',
            value_name = "NEW_BRANCH",
            conflicts_with = "target",
            help = "Create a branch at HEAD and switch to it"
        )]
        new_branch: Option<String>,
        #[arg(index = 1, required_unless_present = "new_branch", help = "Branch or commit")]
        target: Option<String>,
    },
    #[command(
        name = "merge",
        about = "Join another branch into the current one",
        long_about = "This command fast-forwards when possible, otherwise it runs a \
        three-way merge against the best common ancestor."
    )]
    Merge {
        #[arg(long, conflicts_with_all = ["target", "message"], help = "Abandon a conflicted merge")]
        abort: bool,
        #[arg(short, long, help = "Message of the merge commit")]
        message: Option<String>,
        #[arg(index = 1, required_unless_present = "abort", help = "Branch or commit to merge")]
        target: Option<String>,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let mut repository = Repository::new(&cli.repo_path, Box::new(std::io::stdout()))?;

    match &cli.command {
        Commands::Init { initial_branch } => repository.init(initial_branch.as_deref()).await?,
        Commands::Add { paths } => repository.add(paths).await?,
        Commands::Rm {
            cached,
            recursive,
            paths,
        } => repository.rm(paths, *cached, *recursive).await?,
        Commands::Commit { message } => repository.commit(message.as_deref()).await?,
        Commands::Status { porcelain } => repository.status(*porcelain).await?,
        Commands::Log { oneline } => repository.log(*oneline).await?,
        Commands::Branch {
            delete,
            name,
            start_point,
        } => match (delete, name) {
            (Some(branch), _) => repository.delete_branch(branch).await?,
            (None, Some(name)) => repository.branch(name, start_point.as_deref()).await?,
            (None, None) => repository.list_branches().await?,
        },
        Commands::Checkout { new_branch, target } => match (new_branch, target) {
            (Some(branch), _) => repository.checkout_new_branch(branch).await?,
            (None, Some(target)) => repository.checkout(target).await?,
            (None, None) => anyhow::bail!("nothing to check out"),
        },
        Commands::Merge {
            abort,
            message,
            target,
        } => match (abort, target) {
            (true, _) => repository.merge_abort().await?,
            (false, Some(target)) => repository.merge(target, message.as_deref()).await?,
            (false, None) => anyhow::bail!("nothing to merge"),
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let cli = Cli::parse();
    let result = run(cli).await;
    let _ = std::io::stdout().flush();

    if let Err(err) = result {
        match err.downcast_ref::<RepositoryError>() {
            Some(repository_error) => {
                eprintln!("error[{}]: {err:#}", repository_error.kind());
                std::process::exit(repository_error.exit_code());
            }
            None => {
                eprintln!("error: {err:#}");
                std::process::exit(1);
            }
        }
    }
}
