//! Folder service.
//!
//! Folders are owned by one user and nest arbitrarily. The backend returns
//! them as a flat list; [`tree`] assembles the forest. Deletes are soft and
//! only allowed on empty folders.

use crate::Context;
use crate::error::{Error, ErrorKind, Result};
use docshelf_client::Session;
use docshelf_client::error::ErrorKind as BackendErrorKind;
use docshelf_model::{Folder, FolderId, FolderName, FolderTreeNode, build_folder_tree, tree as forest};
use tracing::instrument;

const DUPLICATE_NAME: &str = "A folder with this name already exists here.";
const MOVE_INTO_SELF: &str = "A folder can't be moved into itself or one of its subfolders.";
const NOT_EMPTY: &str = "Folder must be empty before it can be deleted. Move or delete its documents and subfolders first.";

fn parse_name(name: &str) -> Result<FolderName> {
    FolderName::new(name).map_err(|err| {
        let message = err.to_string();
        err.raise(ErrorKind::Invalid(message))
    })
}

/// Backend error to library error, with name clashes reworded for users.
#[track_caller]
fn write_error(err: docshelf_client::error::Error) -> Error {
    if matches!(&*err, BackendErrorKind::Conflict(_)) {
        return err.raise(ErrorKind::invalid(DUPLICATE_NAME));
    }
    ErrorKind::backend(err)
}

/// The user's folders as an ordered forest, everything collapsed.
#[instrument(level = "debug", skip_all, fields(user = %session.user_id()))]
pub async fn tree(ctx: &Context, session: &Session) -> Result<Vec<FolderTreeNode>> {
    let folders = ctx.backend.folder_tree(session).await.map_err(ErrorKind::backend)?;
    tracing::debug!(folders = folders.len(), "Fetched folder list");
    Ok(build_folder_tree(folders))
}

/// Fetch the forest again, keeping whichever folders were expanded in
/// `previous`.
pub async fn reload(ctx: &Context, session: &Session, previous: &[FolderTreeNode]) -> Result<Vec<FolderTreeNode>> {
    let expanded = forest::expanded_ids(previous);
    let mut nodes = tree(ctx, session).await?;
    forest::restore_expanded(&mut nodes, &expanded);
    Ok(nodes)
}

#[instrument(level = "debug", skip(ctx, session))]
pub async fn create(ctx: &Context, session: &Session, name: &str, parent: Option<FolderId>) -> Result<Folder> {
    let name = parse_name(name)?;
    let folder = ctx.backend.create_folder(session, &name, parent).await.map_err(write_error)?;
    tracing::info!(folder = %folder.id, name = %folder.name, "Created folder");
    Ok(folder)
}

/// Renaming to the current name is a no-op and never reaches the backend.
#[instrument(level = "debug", skip(ctx, session, current))]
pub async fn rename(ctx: &Context, session: &Session, current: &Folder, name: &str) -> Result<Folder> {
    let name = parse_name(name)?;
    if name == current.name {
        return Ok(current.clone());
    }
    let folder = ctx.backend.rename_folder(session, current.id, &name).await.map_err(write_error)?;
    tracing::info!(folder = %folder.id, from = %current.name, to = %folder.name, "Renamed folder");
    Ok(folder)
}

/// Move a folder under `parent`, or to the top level with `None`.
///
/// Refuses to move a folder into itself or any of its descendants, checked
/// against a freshly fetched tree.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn move_to(ctx: &Context, session: &Session, id: FolderId, parent: Option<FolderId>) -> Result<Folder> {
    if let Some(parent) = parent {
        let nodes = tree(ctx, session).await?;
        if forest::is_within(&nodes, id, parent) {
            exn::bail!(ErrorKind::invalid(MOVE_INTO_SELF));
        }
    }
    let folder = ctx.backend.move_folder(session, id, parent).await.map_err(write_error)?;
    tracing::info!(folder = %folder.id, parent = ?folder.parent_id, "Moved folder");
    Ok(folder)
}

/// Soft-delete an empty folder.
#[instrument(level = "debug", skip(ctx, session))]
pub async fn delete(ctx: &Context, session: &Session, id: FolderId) -> Result<()> {
    let empty = ctx.backend.can_delete_folder(session, id).await.map_err(ErrorKind::backend)?;
    if !empty {
        exn::bail!(ErrorKind::invalid(NOT_EMPTY));
    }
    ctx.backend.delete_folder(session, id).await.map_err(ErrorKind::backend)?;
    tracing::info!(folder = %id, "Deleted folder");
    Ok(())
}
