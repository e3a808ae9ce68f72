// scene/ - Scene files in, dense grids out
//
// - loader: voxel point list -> terrain / water / source grids
// - catalog: scene ids, on-disk sources, load request ids
// - fetch: browser fetch (wasm32 only)

mod catalog;
#[cfg(target_arch = "wasm32")]
mod fetch;
mod loader;

pub use catalog::{DirectorySource, LoadTicket, SceneCatalog, SceneSource, SceneSwitcher};
#[cfg(target_arch = "wasm32")]
pub use fetch::fetch_scene_text;
pub use loader::{BorderFill, HeightDatum, LoadedScene, LoaderConfig, MAX_CELLS, Palette, SceneLoader};
