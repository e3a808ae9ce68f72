// catalog.rs - Scene lookup and switching
//
// Scene switches can overlap when loads are asynchronous. Each request gets
// an id from a monotonic counter and only the newest id may commit, so a
// slow stale load can never overwrite a newer scene.

use std::fs;
use std::path::PathBuf;

use crate::error::LoadError;

/// Anything that can hand back scene text for an id.
pub trait SceneSource {
    fn fetch(&self, scene_id: &str) -> Result<String, LoadError>;
}

/// Reads `<root>/<scene_id>.<extension>` from disk.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extension: "txt".into() }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn path_for(&self, scene_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", scene_id, self.extension))
    }
}

impl SceneSource for DirectorySource {
    fn fetch(&self, scene_id: &str) -> Result<String, LoadError> {
        let path = self.path_for(scene_id);
        let text = fs::read_to_string(&path).map_err(|e| LoadError::Unreachable {
            scene: scene_id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        if text.trim().is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(text)
    }
}

/// Ordered list of scene ids, cycled by the switch button.
#[derive(Clone, Debug)]
pub struct SceneCatalog {
    scenes: Vec<String>,
    index: usize,
}

impl Default for SceneCatalog {
    fn default() -> Self {
        Self::new(["channel_17", "channel_32", "sink"])
    }
}

impl SceneCatalog {
    /// An empty iterator falls back to the default scene list.
    pub fn new<I, S>(scenes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenes: Vec<String> = scenes.into_iter().map(Into::into).collect();
        if scenes.is_empty() {
            return Self::default();
        }
        Self { scenes, index: 0 }
    }

    pub fn current(&self) -> &str {
        &self.scenes[self.index]
    }

    /// Step to the next scene, wrapping at the end.
    pub fn advance(&mut self) -> &str {
        self.index = (self.index + 1) % self.scenes.len();
        self.current()
    }

    /// Move to `scene_id`, appending it if it is not listed yet.
    pub fn select(&mut self, scene_id: &str) -> &str {
        self.index = match self.scenes.iter().position(|s| s == scene_id) {
            Some(i) => i,
            None => {
                self.scenes.push(scene_id.to_string());
                self.scenes.len() - 1
            }
        };
        self.current()
    }

    /// Switch button text.
    pub fn label(&self) -> String {
        format!("- {} +", self.current())
    }

    pub fn len(&self) -> usize { self.scenes.len() }
    pub fn is_empty(&self) -> bool { self.scenes.is_empty() }
}

/// A pending scene load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub request: u64,
    pub scene: String,
}

/// Hands out load tickets and tells stale ones from current ones.
#[derive(Clone, Debug, Default)]
pub struct SceneSwitcher {
    catalog: SceneCatalog,
    latest: u64,
}

impl SceneSwitcher {
    pub fn new(catalog: SceneCatalog) -> Self {
        Self { catalog, latest: 0 }
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    /// Request `scene_id`; supersedes every earlier ticket.
    pub fn request(&mut self, scene_id: &str) -> LoadTicket {
        let scene = self.catalog.select(scene_id).to_string();
        self.issue(scene)
    }

    /// Request the scene after the current one in the catalog.
    pub fn request_next(&mut self) -> LoadTicket {
        let scene = self.catalog.advance().to_string();
        self.issue(scene)
    }

    fn issue(&mut self, scene: String) -> LoadTicket {
        self.latest += 1;
        LoadTicket { request: self.latest, scene }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.request == self.latest
    }

    pub fn latest_request(&self) -> u64 {
        self.latest
    }
}
