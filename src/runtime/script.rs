//! Script loop
//!
//! A [`Script`] only implements one cycle. [`ScriptRunner`] brings the
//! controller up, calls the cycle until something stops it, and always
//! tears the controller down again.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::interrupt::InterruptToken;
use super::state::{SemanticState, StateManager};
use super::statistics::Statistics;
use crate::config::settings::ScriptSettings;
use crate::controller::Controller;
use crate::input::{VirtualKeyboard, VirtualMouse};
use crate::zones::ZoneMapper;
use crate::{Error, Result};

/// One automation routine
pub trait Script: Send {
    fn name(&self) -> &str;

    /// Perform one pass; called repeatedly until the run stops
    fn cycle(&mut self, ctx: &ScriptContext) -> Result<()>;
}

/// What a script sees during a cycle
pub struct ScriptContext {
    controller: Arc<Controller>,
    state: Arc<StateManager>,
}

impl ScriptContext {
    pub fn new(controller: Arc<Controller>, state: Arc<StateManager>) -> Self {
        Self { controller, state }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn mouse(&self) -> Result<Arc<VirtualMouse>> {
        self.controller.mouse()
    }

    pub fn keyboard(&self) -> Result<Arc<VirtualKeyboard>> {
        self.controller.keyboard()
    }

    pub fn zones(&self) -> Result<Arc<ZoneMapper>> {
        self.controller.zones()
    }

    pub fn stats(&self) -> &Statistics {
        self.controller.stats()
    }

    fn interrupt(&self) -> &InterruptToken {
        self.controller.interrupt()
    }

    /// `Err(Interrupted)` once a stop was requested
    pub fn check_interrupted(&self) -> Result<()> {
        self.interrupt().check().map_err(Error::from)
    }

    pub fn wait_millis(&self, millis: u64) -> Result<()> {
        self.interrupt().sleep_millis(millis).map_err(Error::from)
    }

    /// Wait a uniformly random time in `[min, max]` milliseconds
    pub fn wait_random_millis(&self, min: u64, max: u64) -> Result<()> {
        if min > max {
            return Err(Error::InvalidArgument(format!(
                "wait range {}..{} is empty",
                min, max
            )));
        }
        let millis = rand::thread_rng().gen_range(min..=max);
        self.wait_millis(millis)
    }

    pub fn set_state(&self, state: SemanticState) {
        self.state.set(state);
    }

    /// End the run after the current step
    pub fn stop(&self) {
        log::info!("Stop requested by script");
        self.interrupt().interrupt();
    }
}

/// Notified when a run starts and ends
pub trait RunObserver: Send + Sync {
    fn running_changed(&self, running: bool);
}

/// Observer that only logs
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn running_changed(&self, running: bool) {
        log::info!("Script running: {}", running);
    }
}

/// How a run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped by an interrupt, the hotkey or the script itself
    Interrupted,
    /// Reached the configured maximum runtime
    TimeLimit,
}

/// Drives a script against a controller
pub struct ScriptRunner {
    controller: Arc<Controller>,
    state: Arc<StateManager>,
    observer: Arc<dyn RunObserver>,
    pacing: ScriptSettings,
}

impl ScriptRunner {
    pub fn new(controller: Arc<Controller>) -> Self {
        let pacing = controller.settings().script.clone();
        Self {
            controller,
            state: StateManager::global(),
            observer: Arc::new(LogObserver),
            pacing,
        }
    }

    pub fn with_state(mut self, state: Arc<StateManager>) -> Self {
        self.state = state;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_pacing(mut self, pacing: ScriptSettings) -> Self {
        self.pacing = pacing;
        self
    }

    /// Run on the calling thread until interrupted, timed out or failed
    pub fn run(&self, script: &mut dyn Script) -> Result<RunOutcome> {
        self.controller.interrupt().reset();
        self.run_armed(script)
    }

    /// Body of a run; the interrupt token must already be reset
    fn run_armed(&self, script: &mut dyn Script) -> Result<RunOutcome> {
        log::info!("Starting script '{}'", script.name());
        let stats = self.controller.stats().clone();

        let result = self.controller.init().and_then(|()| {
            self.observer.running_changed(true);
            stats.reset();
            self.cycle_loop(script)
        });

        let outcome = match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_interrupted() => Ok(RunOutcome::Interrupted),
            Err(e) => {
                log::error!("Script '{}' failed: {}", script.name(), e);
                self.controller.fail(&e);
                self.state.set(SemanticState::Error);
                Err(e)
            }
        };

        stats.stop();
        if let Err(e) = self.controller.shutdown() {
            log::warn!("Controller shutdown failed: {}", e);
        }
        self.observer.running_changed(false);
        log::info!(
            "Script '{}' ended after {} cycles",
            script.name(),
            stats.cycles()
        );
        outcome
    }

    fn cycle_loop(&self, script: &mut dyn Script) -> Result<RunOutcome> {
        let ctx = ScriptContext::new(self.controller.clone(), self.state.clone());
        let started = Instant::now();
        let limit = self.pacing.max_runtime_secs.map(Duration::from_secs);
        loop {
            ctx.check_interrupted()?;
            ctx.set_state(SemanticState::Searching);
            script.cycle(&ctx)?;
            self.controller.stats().increment_cycles();

            if let Some(limit) = limit {
                if started.elapsed() >= limit {
                    log::info!("Maximum runtime of {:?} reached", limit);
                    return Ok(RunOutcome::TimeLimit);
                }
            }
            ctx.wait_random_millis(self.pacing.min_cycle_pause_ms, self.pacing.max_cycle_pause_ms)?;
        }
    }

    /// Run on a worker thread
    pub fn spawn(self, mut script: Box<dyn Script>) -> Result<ScriptHandle> {
        let controller = self.controller.clone();
        let state = self.state.clone();
        // A stop issued before the worker starts must survive
        controller.interrupt().reset();
        let worker = std::thread::Builder::new()
            .name(format!("script-{}", script.name()))
            .spawn(move || self.run_armed(script.as_mut()))?;
        Ok(ScriptHandle {
            controller,
            state,
            worker: Some(worker),
        })
    }
}

/// A script running on its own thread
pub struct ScriptHandle {
    controller: Arc<Controller>,
    state: Arc<StateManager>,
    worker: Option<JoinHandle<Result<RunOutcome>>>,
}

impl ScriptHandle {
    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Some(worker) => worker.is_finished(),
            None => true,
        }
    }

    /// Interrupt the worker and wait for it to unwind
    pub fn stop(mut self) -> Result<RunOutcome> {
        self.controller.interrupt().interrupt();
        self.state.set(SemanticState::Waiting);
        self.controller.stats().stop();
        self.join_worker()
    }

    /// Wait for the run to end on its own
    pub fn join(mut self) -> Result<RunOutcome> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<RunOutcome> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(Error::InvalidArgument("script thread panicked".into()))),
            None => Ok(RunOutcome::Interrupted),
        }
    }
}

/// Which registered script to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub script: String,
}

type ScriptFactory = Box<dyn Fn() -> Box<dyn Script> + Send + Sync>;

/// Scripts selectable by name
#[derive(Default)]
pub struct ScriptRegistry {
    factories: BTreeMap<String, ScriptFactory>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script; replaces an earlier one of the same name
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Script> + Send + Sync + 'static,
    {
        if self.factories.insert(name.to_string(), Box::new(factory)).is_some() {
            log::warn!("Script '{}' registered twice", name);
        }
    }

    /// Fresh instance of the named script
    pub fn create(&self, name: &str) -> Result<Box<dyn Script>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::InvalidArgument(format!("unknown script '{}'", name)))
    }

    /// Instance of the script a run configuration selects
    pub fn create_for(&self, config: &RunConfig) -> Result<Box<dyn Script>> {
        self.create(&config.script)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
