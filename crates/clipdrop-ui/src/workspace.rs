// crates/clipdrop-ui/src/workspace.rs
//
// Standalone project file: a JSON-serialised `ProjectState` that stands in
// for the editor's media pool and timeline. Every change is written back
// immediately so an interrupted paste keeps whatever was already imported.
//
// Without a project file the session runs against an in-memory untitled
// project, which sends pastes to the shared `_unsaved` folder.

use std::fs;
use std::path::{Path, PathBuf};
use clipdrop_core::state::ProjectState;
use clipdrop_core::workspace::{BinHandle, ItemHandle, Workspace};
use clipdrop_core::WorkspaceError;
use tracing::{debug, info};
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled Project";

pub struct ProjectWorkspace {
    path:  Option<PathBuf>,
    state: ProjectState,
}

impl ProjectWorkspace {
    /// Load `path`, or start a new project named after the file if it does
    /// not exist yet. The file is created on the first import.
    pub fn open(path: &Path) -> Result<Self, WorkspaceError> {
        let state = if path.exists() {
            let bytes = fs::read(path).map_err(|e| WorkspaceError::Io { path: path.to_path_buf(), source: e })?;
            serde_json::from_slice::<ProjectState>(&bytes)
                .map_err(|e| WorkspaceError::Json { path: path.to_path_buf(), source: e })?
        } else {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| UNTITLED.into());
            info!(path = %path.display(), "new project file");
            ProjectState::new(name)
        };
        Ok(Self { path: Some(path.to_path_buf()), state })
    }

    pub fn untitled() -> Self {
        Self { path: None, state: ProjectState::new(UNTITLED) }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    fn persist(&self) -> Result<(), WorkspaceError> {
        let Some(path) = &self.path else { return Ok(()) };
        let io = |e: std::io::Error| WorkspaceError::Io { path: path.clone(), source: e };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_vec_pretty(&self.state)
            .map_err(|e| WorkspaceError::Json { path: path.clone(), source: e })?;
        fs::write(path, json).map_err(io)?;
        debug!(path = %path.display(), "project saved");
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<Uuid, WorkspaceError> {
    Uuid::parse_str(raw).map_err(|_| WorkspaceError::UnknownBin(raw.to_string()))
}

impl Workspace for ProjectWorkspace {
    fn current_project_name(&self) -> Result<String, WorkspaceError> {
        Ok(self.state.name.clone())
    }

    fn get_or_create_bin(&mut self, name: &str) -> Result<BinHandle, WorkspaceError> {
        let existed = self.state.bin_by_name(name).is_some();
        let id = self.state.get_or_create_bin(name);
        if !existed {
            info!(bin = name, "bin created");
            self.persist()?;
        }
        Ok(BinHandle(id.to_string()))
    }

    fn import_file(&mut self, bin: &BinHandle, path: &Path) -> Result<(), WorkspaceError> {
        if !path.is_file() {
            return Err(WorkspaceError::Rejected {
                path:    path.to_path_buf(),
                message: "file does not exist".into(),
            });
        }
        let bin_id = parse_id(&bin.0)?;
        self.state
            .add_to_bin(bin_id, path.to_path_buf())
            .ok_or_else(|| WorkspaceError::UnknownBin(bin.0.clone()))?;
        self.persist()
    }

    fn find_item_by_name(&self, bin: &BinHandle, name: &str) -> Result<Option<ItemHandle>, WorkspaceError> {
        let bin_id = parse_id(&bin.0)?;
        if self.state.bin(bin_id).is_none() {
            return Err(WorkspaceError::UnknownBin(bin.0.clone()));
        }
        Ok(self.state.find_in_bin(bin_id, name).map(|id| ItemHandle(id.to_string())))
    }

    fn append_to_timeline(&mut self, item: &ItemHandle) -> Result<(), WorkspaceError> {
        let media_id = Uuid::parse_str(&item.0).map_err(|_| WorkspaceError::Rejected {
            path:    PathBuf::from(&item.0),
            message: "not a media item id".into(),
        })?;
        self.state.append_to_timeline(media_id).ok_or_else(|| WorkspaceError::Rejected {
            path:    PathBuf::from(&item.0),
            message: "media item is not in any bin".into(),
        })?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipdrop_core::state::STILL_DURATION;

    #[test]
    fn new_file_is_named_after_its_stem_and_written_on_import() {
        let dir  = tempfile::tempdir().unwrap();
        let file = dir.path().join("Trailer.json");
        let clip = dir.path().join("1.png");
        fs::write(&clip, b"png").unwrap();

        let mut ws = ProjectWorkspace::open(&file).unwrap();
        assert_eq!(ws.current_project_name().unwrap(), "Trailer");
        assert!(!file.exists());

        let bin = ws.get_or_create_bin("__ClipDrop__").unwrap();
        ws.import_file(&bin, &clip).unwrap();
        let item = ws.find_item_by_name(&bin, "1.png").unwrap().unwrap();
        ws.append_to_timeline(&item).unwrap();

        let reopened = ProjectWorkspace::open(&file).unwrap();
        let state = reopened.state();
        assert_eq!(state.bins.len(), 1);
        assert_eq!(state.bins[0].items.len(), 1);
        assert_eq!(state.timeline.len(), 1);
        assert_eq!(state.timeline[0].duration, STILL_DURATION);
    }

    #[test]
    fn bins_are_reused_and_imports_deduplicated() {
        let dir  = tempfile::tempdir().unwrap();
        let clip = dir.path().join("2.txt");
        fs::write(&clip, "hi").unwrap();

        let mut ws = ProjectWorkspace::untitled();
        let a = ws.get_or_create_bin("b").unwrap();
        let b = ws.get_or_create_bin("b").unwrap();
        assert_eq!(a, b);

        ws.import_file(&a, &clip).unwrap();
        ws.import_file(&a, &clip).unwrap();
        assert_eq!(ws.state().bins[0].items.len(), 1);
        assert!(ws.find_item_by_name(&a, "missing.txt").unwrap().is_none());
    }

    #[test]
    fn missing_file_and_unknown_bin_are_rejected() {
        let mut ws = ProjectWorkspace::untitled();
        let bin = ws.get_or_create_bin("b").unwrap();
        assert!(matches!(
            ws.import_file(&bin, Path::new("/nowhere/1.png")),
            Err(WorkspaceError::Rejected { .. })
        ));
        let stray = BinHandle(Uuid::new_v4().to_string());
        assert!(matches!(ws.find_item_by_name(&stray, "x"), Err(WorkspaceError::UnknownBin(_))));
    }

    #[test]
    fn malformed_project_file_is_reported() {
        let dir  = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{ not json").unwrap();
        assert!(matches!(ProjectWorkspace::open(&file), Err(WorkspaceError::Json { .. })));
    }
}
