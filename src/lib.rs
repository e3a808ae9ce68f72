use js_sys::Float32Array;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod render;
pub mod scene;
pub mod sim;
pub mod world;

pub use error::{GridError, LoadError, ParamsError};
pub use render::Encoder;
pub use scene::{LoadTicket, LoadedScene, LoaderConfig, SceneCatalog, SceneLoader, SceneSource};
pub use sim::{FlowStepper, SimParams, Simulation};
pub use world::{Grid, GridState};

// ============================================================================
// FLOW WORLD - Browser handle around one Simulation
// ============================================================================

#[wasm_bindgen]
pub struct FlowWorld {
    sim: Simulation,
    encoder: Encoder,

    // Newest scene request still waiting for its text
    pending: Option<LoadTicket>,
}

#[wasm_bindgen]
impl FlowWorld {
    #[wasm_bindgen(constructor)]
    pub fn new(scene_text: &str) -> Result<FlowWorld, JsValue> {
        Self::build(scene_text, SimParams::default())
    }

    /// Construct with solver params given as JSON; missing fields default.
    pub fn with_params(scene_text: &str, params_json: &str) -> Result<FlowWorld, JsValue> {
        let params = SimParams::from_json(params_json).map_err(js_err)?;
        Self::build(scene_text, params)
    }

    fn build(scene_text: &str, params: SimParams) -> Result<FlowWorld, JsValue> {
        let scene = SceneLoader::default().load(scene_text).map_err(js_err)?;
        let sim = Simulation::new(scene, params).map_err(js_err)?;
        Ok(Self {
            encoder: Encoder::new(sim.params().epsilon),
            sim,
            pending: None,
        })
    }

    /// Step once, paused or not. Errors here are fatal shape bugs.
    pub fn tick(&mut self) -> Result<(), JsValue> {
        self.sim.advance_one_tick().map_err(js_err)
    }

    /// Animation-frame hook: steps unless paused.
    pub fn frame(&mut self) -> Result<bool, JsValue> {
        self.sim.frame().map_err(js_err)
    }

    pub fn pause(&mut self) { self.sim.pause(); }
    pub fn resume(&mut self) { self.sim.resume(); }
    pub fn toggle_pause(&mut self) -> bool { self.sim.toggle_pause() }
    pub fn is_paused(&self) -> bool { self.sim.is_paused() }

    /// Start switching to `scene_id`. Fetch the text, then hand it to
    /// `finish_load` with the returned request id.
    pub fn begin_load(&mut self, scene_id: &str) -> f64 {
        let ticket = self.sim.request_scene(scene_id);
        self.track(ticket)
    }

    /// Start switching to the next catalog scene.
    pub fn begin_next_load(&mut self) -> f64 {
        let ticket = self.sim.request_next();
        self.track(ticket)
    }

    // Request ids cross into JS as f64, exact up to 2^53.
    fn track(&mut self, ticket: LoadTicket) -> f64 {
        let request = ticket.request as f64;
        self.pending = Some(ticket);
        request
    }

    /// Scene id of the outstanding request, if any.
    pub fn pending_scene(&self) -> Option<String> {
        self.pending.as_ref().map(|t| t.scene.clone())
    }

    /// Commit fetched scene text. Returns false when `request` is stale.
    pub fn finish_load(&mut self, request: f64, text: String) -> Result<bool, JsValue> {
        let Some(ticket) = self.pending.take_if(|t| t.request as f64 == request) else {
            return Ok(false);
        };
        self.sim.commit_load(&ticket, Ok(text)).map_err(js_err)
    }

    pub fn scene_label(&self) -> String {
        self.sim.catalog().label()
    }

    pub fn rows(&self) -> u32 { self.sim.state().rows() as u32 }
    pub fn cols(&self) -> u32 { self.sim.state().cols() as u32 }
    pub fn step_count(&self) -> f64 { self.sim.tick() as f64 }

    // Grid copies, row-major
    pub fn terrain(&self) -> Float32Array { to_js(self.sim.state().terrain()) }
    pub fn water(&self) -> Float32Array { to_js(self.sim.state().water()) }
    pub fn flow_x(&self) -> Float32Array { to_js(self.sim.state().flow_x()) }
    pub fn flow_y(&self) -> Float32Array { to_js(self.sim.state().flow_y()) }

    /// Refresh the `[base, height]` column buffer behind `output_ptr`.
    pub fn encode_columns(&mut self) {
        self.encoder.encode_columns(self.sim.state());
    }

    pub fn output_ptr(&self) -> *const f32 { self.encoder.ptr() }
    pub fn output_len(&self) -> usize { self.encoder.len() }
}

/// Fetch scene text over HTTP for `FlowWorld::finish_load`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = fetchScene)]
pub async fn fetch_scene(url: String) -> Result<String, JsValue> {
    scene::fetch_scene_text(&url).await.map_err(js_err)
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js(grid: &Grid) -> Float32Array {
    let data: Vec<f32> = grid.iter().copied().collect();
    Float32Array::from(data.as_slice())
}
