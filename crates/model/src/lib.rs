//! Domain types shared by every docshelf crate.
//!
//! The backend owns the schema; these types are the shapes this client
//! consumes and produces. Row-level conversion from wire responses happens in
//! `docshelf-client`, so everything here is already validated.
//!
//! The one piece of real logic in this crate is the folder hierarchy builder,
//! [`build_folder_tree`], which turns the flat list returned by the backend's
//! recursive folder query into an ordered forest of [`FolderTreeNode`]s.

/// Declares a `Uuid`-backed identifier newtype.
///
/// Identifiers are opaque to this client; the backend generates them. The
/// newtypes only exist so a folder id can't be passed where a document id is
/// expected.
macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            derive_more::Display,
            derive_more::From,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            pub fn new(id: uuid::Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::Error;
            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                use exn::ResultExt;
                uuid::Uuid::parse_str(s.trim()).map(Self).or_raise(|| $crate::error::ErrorKind::ParseError {
                    field: stringify!($name),
                    value: s.to_string(),
                })
            }
        }
    };
}
pub(crate) use identifier;

mod dashboard;
mod document;
pub mod error;
mod folder;
mod tags;
pub mod tree;
mod user;

pub use crate::dashboard::DashboardData;
pub use crate::document::{AccessLevel, Document, DocumentId, FileKind};
pub use crate::folder::{Folder, FolderId, FolderName};
pub use crate::tags::Tags;
pub use crate::tree::{FolderTreeNode, build_folder_tree};
pub use crate::user::{AccessToken, Role, Theme, UserId, UserProfile};
