//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use docshelf_client::SortOrder;
use docshelf_model::{AccessLevel, DocumentId, FileKind, FolderId, Theme};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Adapts the domain `FromStr` impls to clap's value parsers.
fn parsed<T>(value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err: T::Err| err.to_string())
}

#[derive(Debug, Parser)]
#[command(name = "docshelf", version, about = "Store, search and share your documents")]
pub struct Cli {
    /// Configuration file to use instead of the platform config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub credentials: Credentials,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Every invocation signs in afresh; nothing is remembered between runs.
#[derive(Debug, Args)]
pub struct Credentials {
    #[arg(long, global = true, env = "DOCSHELF_EMAIL")]
    pub email: Option<String>,

    #[arg(long, global = true, env = "DOCSHELF_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the credentials are valid.
    Login,
    /// Create an account.
    Signup,
    /// Sign in, then revoke the session.
    Logout,
    /// Show the signed-in user and their preferences.
    Whoami {
        /// Change the preferred theme.
        #[arg(long, value_parser = parsed::<Theme>)]
        theme: Option<Theme>,
    },
    /// Upload PDFs and images.
    Upload(UploadArgs),
    /// Search documents. Without credentials only public documents are found.
    Search(SearchArgs),
    /// Show one document.
    Show {
        #[arg(value_parser = parsed::<DocumentId>)]
        id: DocumentId,
        /// Print the full extracted text.
        #[arg(long)]
        text: bool,
    },
    /// Change a document's title, tags or visibility.
    Update(UpdateArgs),
    /// Delete a document and its file.
    Delete {
        #[arg(value_parser = parsed::<DocumentId>)]
        id: DocumentId,
    },
    /// Toggle a document's favourite marker.
    Favorite {
        #[arg(value_parser = parsed::<DocumentId>)]
        id: DocumentId,
    },
    /// Move documents into a folder.
    Move {
        #[arg(required = true, value_parser = parsed::<DocumentId>)]
        ids: Vec<DocumentId>,
        #[command(flatten)]
        target: FolderTarget,
    },
    /// Create a share link.
    Share {
        #[arg(value_parser = parsed::<DocumentId>)]
        id: DocumentId,
        #[arg(long, default_value = "view", value_parser = parsed::<AccessLevel>)]
        access: AccessLevel,
    },
    /// Manage folders.
    Folders {
        #[command(subcommand)]
        action: FolderAction,
    },
    /// Show document and folder counters.
    Dashboard,
    /// Resolve an application path, e.g. a share link.
    Route { path: String },
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Title for the document; only valid with a single file.
    #[arg(long)]
    pub title: Option<String>,
    /// Comma-separated tags.
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long, value_parser = parsed::<FolderId>)]
    pub folder: Option<FolderId>,
    /// Make the documents visible to everyone.
    #[arg(long)]
    pub public: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Own documents plus public ones.
    All,
    Own,
    Public,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Full-text query.
    pub query: Option<String>,
    #[arg(long = "type", value_parser = parsed::<FileKind>)]
    pub file_type: Option<FileKind>,
    /// Folder id, or `unfiled` for documents outside any folder.
    #[arg(long)]
    pub folder: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub favorites: bool,
    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    pub scope: ScopeArg,
    #[arg(long, default_value = "newest", value_parser = parsed::<SortOrder>)]
    pub sort: SortOrder,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(value_parser = parsed::<DocumentId>)]
    pub id: DocumentId,
    #[arg(long)]
    pub title: Option<String>,
    /// Comma-separated tags, replacing the current ones.
    #[arg(long)]
    pub tags: Option<String>,
    #[arg(long, conflicts_with = "private")]
    pub public: bool,
    #[arg(long)]
    pub private: bool,
}

/// Destination folder, or the top level.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct FolderTarget {
    #[arg(long, value_parser = parsed::<FolderId>)]
    pub folder: Option<FolderId>,
    #[arg(long)]
    pub root: bool,
}
impl FolderTarget {
    pub fn folder(&self) -> Option<FolderId> {
        if self.root { None } else { self.folder }
    }
}

#[derive(Debug, Subcommand)]
pub enum FolderAction {
    /// Print the folder hierarchy.
    Tree,
    Create {
        name: String,
        #[arg(long, value_parser = parsed::<FolderId>)]
        parent: Option<FolderId>,
    },
    Rename {
        #[arg(value_parser = parsed::<FolderId>)]
        id: FolderId,
        name: String,
    },
    Move {
        #[arg(value_parser = parsed::<FolderId>)]
        id: FolderId,
        #[command(flatten)]
        target: FolderTarget,
    },
    /// Delete an empty folder.
    Delete {
        #[arg(value_parser = parsed::<FolderId>)]
        id: FolderId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["docshelf", "route", "/settings"])]
    #[case(&["docshelf", "search", "lease", "--type", "pdf", "--sort", "title"])]
    #[case(&["docshelf", "move", "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10", "--root"])]
    #[case(&["docshelf", "-vv", "folders", "create", "Taxes"])]
    fn test_parse(#[case] args: &[&str]) {
        Cli::try_parse_from(args).unwrap();
    }

    #[rstest]
    #[case(&["docshelf", "show", "not-an-id"])]
    #[case(&["docshelf", "share", "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10", "--access", "own"])]
    #[case(&["docshelf", "move", "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10"])]
    #[case(&["docshelf", "update", "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10", "--public", "--private"])]
    fn test_reject(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_folder_target() {
        let cli = Cli::try_parse_from(["docshelf", "folders", "move", "6c0f1c43-5d4e-4d1c-9c1e-2b3f1c6a9f10", "--root"]).unwrap();
        let Command::Folders {
            action: FolderAction::Move { target, .. },
        } = cli.command
        else {
            panic!("expected folders move");
        };
        assert_eq!(target.folder(), None);
    }
}
