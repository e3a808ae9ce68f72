// sim/ - Water simulation
//
// Simulation owns the one live GridState and swaps it wholesale when a new
// scene commits. Stepping is synchronous; only scene loading may be async,
// and stale loads are dropped by request id.

mod params;
mod stepper;

pub use params::{Coefficients, SimParams};
pub use stepper::FlowStepper;

use log::{debug, info, warn};

use crate::error::{GridError, LoadError, ParamsError};
use crate::scene::{LoadTicket, LoadedScene, SceneCatalog, SceneLoader, SceneSource, SceneSwitcher};
use crate::world::GridState;

/// Simulation driver
pub struct Simulation {
    // Live grids
    state: GridState,

    // Solver
    stepper: FlowStepper,

    // Scene switching
    loader: SceneLoader,
    switcher: SceneSwitcher,

    paused: bool,
}

impl Simulation {
    pub fn new(scene: LoadedScene, params: SimParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            state: GridState::new(scene),
            stepper: FlowStepper::new(params),
            loader: SceneLoader::default(),
            switcher: SceneSwitcher::default(),
            paused: false,
        })
    }

    pub fn with_loader(mut self, loader: SceneLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_catalog(mut self, catalog: SceneCatalog) -> Self {
        self.switcher = SceneSwitcher::new(catalog);
        self
    }

    pub fn state(&self) -> &GridState { &self.state }
    pub fn tick(&self) -> u64 { self.state.tick() }
    pub fn params(&self) -> &SimParams { self.stepper.params() }
    pub fn catalog(&self) -> &SceneCatalog { self.switcher.catalog() }
    pub fn loader(&self) -> &SceneLoader { &self.loader }

    pub fn is_paused(&self) -> bool { self.paused }
    pub fn pause(&mut self) { self.paused = true; }
    pub fn resume(&mut self) { self.paused = false; }

    /// Flip pause state; returns the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Step once regardless of pause state.
    pub fn advance_one_tick(&mut self) -> Result<(), GridError> {
        self.stepper.step(&mut self.state)
    }

    /// Per-frame entry point: step unless paused. Returns whether it stepped.
    pub fn frame(&mut self) -> Result<bool, GridError> {
        if self.paused {
            return Ok(false);
        }
        self.advance_one_tick()?;
        Ok(true)
    }

    /// Replace the running grids with a freshly loaded scene and resume.
    pub fn reinitialize(&mut self, scene: LoadedScene) {
        self.state = GridState::new(scene);
        self.paused = false;
        info!("reinitialized {}x{} grid", self.state.rows(), self.state.cols());
    }

    /// Start loading `scene_id`; any earlier pending load becomes stale.
    pub fn request_scene(&mut self, scene_id: &str) -> LoadTicket {
        self.switcher.request(scene_id)
    }

    /// Start loading the next scene in the catalog.
    pub fn request_next(&mut self) -> LoadTicket {
        self.switcher.request_next()
    }

    /// Finish a load started by `request_scene`/`request_next`.
    ///
    /// Returns `Ok(false)` when the ticket has been superseded; the result is
    /// dropped untouched. On error the running scene stays active.
    pub fn commit_load(
        &mut self,
        ticket: &LoadTicket,
        text: Result<String, LoadError>,
    ) -> Result<bool, LoadError> {
        if !self.switcher.is_current(ticket) {
            debug!(
                "dropping stale load #{} of '{}' (latest #{})",
                ticket.request,
                ticket.scene,
                self.switcher.latest_request()
            );
            return Ok(false);
        }

        let scene = text.and_then(|t| self.loader.load(&t)).map_err(|e| {
            warn!("scene '{}' failed to load: {}", ticket.scene, e);
            e
        })?;
        info!("switching to scene '{}'", ticket.scene);
        self.reinitialize(scene);
        Ok(true)
    }

    /// Synchronous load of `scene_id` from `source`.
    pub fn reinitialize_from(&mut self, source: &dyn SceneSource, scene_id: &str) -> Result<(), LoadError> {
        let ticket = self.request_scene(scene_id);
        let text = source.fetch(&ticket.scene);
        self.commit_load(&ticket, text).map(|_| ())
    }

    /// Synchronous switch to the next catalog scene.
    pub fn switch_to_next(&mut self, source: &dyn SceneSource) -> Result<(), LoadError> {
        let ticket = self.request_next();
        let text = source.fetch(&ticket.scene);
        self.commit_load(&ticket, text).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const POND: &str = "0 0 0 000000\n4 4 3 000000\n2 2 1 639bff\n";
    const SPRING: &str = "0 0 0 000000\n2 2 3 000000\n1 1 0 fbf236\n";

    struct MemorySource(HashMap<&'static str, &'static str>);

    impl SceneSource for MemorySource {
        fn fetch(&self, scene_id: &str) -> Result<String, LoadError> {
            self.0
                .get(scene_id)
                .map(|s| s.to_string())
                .ok_or_else(|| LoadError::Unreachable { scene: scene_id.into(), reason: "missing".into() })
        }
    }

    fn sim() -> Simulation {
        let scene = SceneLoader::default().load(POND).unwrap();
        Simulation::new(scene, SimParams::default()).unwrap()
    }

    #[test]
    fn paused_frames_do_not_step() {
        let mut sim = sim();
        assert!(sim.frame().unwrap());
        assert!(sim.toggle_pause());
        assert!(!sim.frame().unwrap());
        assert_eq!(sim.tick(), 1);

        sim.advance_one_tick().unwrap();
        assert_eq!(sim.tick(), 2);
        sim.resume();
        assert!(sim.frame().unwrap());
        assert_eq!(sim.tick(), 3);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let scene = SceneLoader::default().load(POND).unwrap();
        let params = SimParams { friction: 0.0, ..Default::default() };
        assert!(Simulation::new(scene, params).is_err());
    }

    #[test]
    fn stale_load_is_dropped() {
        let mut sim = sim();
        sim.frame().unwrap();

        let slow = sim.request_scene("spring");
        let fast = sim.request_scene("pond");
        assert!(sim.commit_load(&fast, Ok(POND.to_string())).unwrap());
        assert_eq!(sim.tick(), 0);

        sim.frame().unwrap();
        assert!(!sim.commit_load(&slow, Ok(SPRING.to_string())).unwrap());
        assert_eq!(sim.state().rows(), 7);
        assert_eq!(sim.tick(), 1);
    }

    #[test]
    fn failed_switch_keeps_running_scene() {
        let mut sim = sim();
        sim.frame().unwrap();
        let before = sim.state().water().clone();

        let source = MemorySource(HashMap::new());
        assert!(sim.reinitialize_from(&source, "nowhere").is_err());
        assert_eq!(sim.state().water(), &before);
        assert_eq!(sim.tick(), 1);

        let ticket = sim.request_scene("broken");
        assert!(sim.commit_load(&ticket, Ok("not a scene".into())).is_err());
        assert_eq!(sim.tick(), 1);
    }

    #[test]
    fn switching_cycles_catalog_and_unpauses() {
        let source = MemorySource(HashMap::from([("pond", POND), ("spring", SPRING)]));
        let mut sim = sim().with_catalog(SceneCatalog::new(["pond", "spring"]));
        sim.pause();

        sim.switch_to_next(&source).unwrap();
        assert_eq!(sim.catalog().current(), "spring");
        assert_eq!((sim.state().rows(), sim.state().cols()), (5, 5));
        assert_eq!(sim.state().source()[[2, 2]], 1.0);
        assert!(!sim.is_paused());

        sim.switch_to_next(&source).unwrap();
        assert_eq!(sim.catalog().current(), "pond");
        assert_eq!(sim.state().rows(), 7);
    }
}
