// crates/clipdrop-core/src/workspace.rs
//
// Host project contract and the import step that runs after a save.

use std::path::{Path, PathBuf};
use tracing::info;
use crate::error::{PasteError, WorkspaceError};
use crate::media::MediaUnit;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinHandle(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemHandle(pub String);

/// Editor project: a media pool of named bins and a timeline.
pub trait Workspace: Send {
    fn current_project_name(&self) -> Result<String, WorkspaceError>;
    fn get_or_create_bin(&mut self, name: &str) -> Result<BinHandle, WorkspaceError>;
    fn import_file(&mut self, bin: &BinHandle, path: &Path) -> Result<(), WorkspaceError>;
    fn find_item_by_name(&self, bin: &BinHandle, name: &str) -> Result<Option<ItemHandle>, WorkspaceError>;
    fn append_to_timeline(&mut self, item: &ItemHandle) -> Result<(), WorkspaceError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportReport {
    pub bin:  BinHandle,
    pub item: ItemHandle,
    pub name: String,
    pub path: PathBuf,
}

/// Import a saved unit into `bin_name` and append it to the timeline.
/// A failure partway leaves earlier steps in place; nothing is rolled back.
pub fn import_media(
    ws:       &mut dyn Workspace,
    bin_name: &str,
    media:    &MediaUnit,
) -> Result<ImportReport, PasteError> {
    let name = media.display_name()?;
    let path = media.destination()?.to_path_buf();

    let bin = ws.get_or_create_bin(bin_name)?;
    ws.import_file(&bin, &path)?;
    let item = ws
        .find_item_by_name(&bin, &name)?
        .ok_or_else(|| WorkspaceError::ItemNotFound { name: name.clone(), bin: bin_name.into() })?;
    ws.append_to_timeline(&item)?;

    info!(%name, bin = bin_name, "imported into project");
    Ok(ImportReport { bin, item, name, path })
}
