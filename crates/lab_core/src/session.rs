use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shared::domain::{ChemicalName, FlaskStage, SessionId};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    catalog::{ReactionCatalog, ReactionDefinition},
    error::{LabError, Result},
};

/// How long the flask takes to settle after a successful mix.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1500);

pub const MIN_TEMPERATURE: f64 = 20.0;
pub const MAX_TEMPERATURE: f64 = 60.0;
pub const DEFAULT_TEMPERATURE: f64 = 25.0;

const MAX_SELECTION: usize = 2;

/// Read-only view of a session, handed to renderers and to submission building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub selected_chemicals: Vec<ChemicalName>,
    pub flask_stage: FlaskStage,
    pub active_reaction: Option<ReactionDefinition>,
    pub progress: u8,
    pub temperature: f64,
}

impl SessionSnapshot {
    pub fn equation(&self) -> &str {
        self.active_reaction
            .as_ref()
            .map(|reaction| reaction.equation.as_str())
            .unwrap_or_default()
    }

    pub fn observation(&self) -> &str {
        self.active_reaction
            .as_ref()
            .map(|reaction| reaction.observation.as_str())
            .unwrap_or_default()
    }

    /// Arrhenius-style time estimate in seconds. Display only.
    pub fn estimated_reaction_time(&self) -> f64 {
        estimated_reaction_time(self.temperature)
    }
}

pub fn estimated_reaction_time(celsius: f64) -> f64 {
    let rate = (-5000.0 / (celsius + 273.15)).exp();
    1.0 / rate
}

#[derive(Debug)]
struct SessionState {
    selected: Vec<ChemicalName>,
    stage: FlaskStage,
    active_reaction: Option<ReactionDefinition>,
    progress: u8,
    temperature: f64,
    // Bumped whenever an in-flight mix must no longer land.
    generation: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            selected: Vec::with_capacity(MAX_SELECTION),
            stage: FlaskStage::Empty,
            active_reaction: None,
            progress: 0,
            temperature: DEFAULT_TEMPERATURE,
            generation: 0,
        }
    }

    fn discard_result(&mut self) {
        self.active_reaction = None;
        self.progress = 0;
        self.generation = self.generation.wrapping_add(1);
        self.stage = FlaskStage::for_selection_count(self.selected.len());
    }

    fn clear(&mut self) {
        self.selected.clear();
        self.discard_result();
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One student's visit to an experiment: chemical selection, mixing and the
/// resulting reaction.
///
/// The settling period after [`mix`](Self::mix) runs as a Tokio task that only
/// holds a weak reference to the session state. Dropping the session, changing
/// the selection or calling [`reset`](Self::reset) cancels it, and a completion
/// only lands while the session is still live and still `mixing`.
pub struct ExperimentSession {
    id: SessionId,
    catalog: Arc<ReactionCatalog>,
    settle_delay: Duration,
    state: Arc<Mutex<SessionState>>,
    pending: Option<JoinHandle<()>>,
}

impl ExperimentSession {
    pub fn new(catalog: Arc<ReactionCatalog>) -> Self {
        Self {
            id: SessionId::new(),
            catalog,
            settle_delay: DEFAULT_SETTLE_DELAY,
            state: Arc::new(Mutex::new(SessionState::new())),
            pending: None,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn catalog(&self) -> &ReactionCatalog {
        &self.catalog
    }

    pub fn stage(&self) -> FlaskStage {
        lock(&self.state).stage
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        SessionSnapshot {
            session_id: self.id,
            selected_chemicals: state.selected.clone(),
            flask_stage: state.stage,
            active_reaction: state.active_reaction.clone(),
            progress: state.progress,
            temperature: state.temperature,
        }
    }

    /// Adds `name` to the flask, or removes it if already selected.
    ///
    /// Any change clears a previous or pending reaction and recomputes the stage
    /// from the selection count. A third distinct chemical is rejected and the
    /// session is left untouched.
    pub fn toggle_chemical(&mut self, name: ChemicalName) -> Result<FlaskStage> {
        let stage = {
            let mut state = lock(&self.state);
            if let Some(position) = state.selected.iter().position(|c| c == &name) {
                state.selected.remove(position);
            } else {
                if state.selected.len() >= MAX_SELECTION {
                    warn!(session_id = %self.id, chemical = %name, "flask already holds two chemicals");
                    return Err(LabError::InvalidSelection(format!(
                        "at most {MAX_SELECTION} chemicals can be selected; remove one before adding {name}"
                    )));
                }
                state.selected.push(name);
            }
            state.discard_result();
            state.stage
        };
        self.cancel_pending();
        debug!(session_id = %self.id, %stage, "selection changed");
        Ok(stage)
    }

    pub fn set_temperature(&mut self, celsius: f64) -> Result<()> {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&celsius) {
            return Err(LabError::TemperatureOutOfRange(celsius));
        }
        lock(&self.state).temperature = celsius;
        Ok(())
    }

    /// Starts mixing the two selected chemicals.
    ///
    /// On a recognised pair the stage becomes `mixing` and the returned
    /// [`PendingMix`] resolves after the settling delay, when the stage flips
    /// to `reacted`. An unrecognised pair empties the flask and fails with
    /// [`LabError::UnrecognizedReaction`].
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mix(&mut self) -> Result<PendingMix> {
        let (reaction, generation) = {
            let mut state = lock(&self.state);
            match state.stage {
                FlaskStage::Mixing => {
                    warn!(session_id = %self.id, "mix requested while already mixing");
                    return Err(LabError::ConcurrentMix);
                }
                FlaskStage::Reacted => return Err(LabError::AlreadyReacted),
                _ => {}
            }
            let [first, second] = state.selected.as_slice() else {
                return Err(LabError::InvalidSelection(format!(
                    "select exactly two chemicals to mix, {} selected",
                    state.selected.len()
                )));
            };

            let Some(reaction) = self.catalog.resolve(first, second).cloned() else {
                let err = LabError::UnrecognizedReaction {
                    first: first.clone(),
                    second: second.clone(),
                };
                state.clear();
                warn!(session_id = %self.id, error = %err, "flask reset");
                return Err(err);
            };

            state.stage = FlaskStage::Mixing;
            state.progress = 0;
            state.generation = state.generation.wrapping_add(1);
            (reaction, state.generation)
        };

        debug!(session_id = %self.id, reaction = %reaction.reaction_id, "mixing");
        let reaction_id = reaction.reaction_id.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let task = tokio::spawn(settle(
            Arc::downgrade(&self.state),
            self.id,
            generation,
            self.settle_delay,
            reaction,
            done_tx,
        ));
        if let Some(previous) = self.pending.replace(task) {
            previous.abort();
        }

        Ok(PendingMix {
            reaction_id,
            outcome: done_rx,
        })
    }

    /// Empties the flask, e.g. when the student navigates away.
    pub fn reset(&mut self) {
        lock(&self.state).clear();
        self.cancel_pending();
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Drop for ExperimentSession {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

async fn settle(
    state: std::sync::Weak<Mutex<SessionState>>,
    session_id: SessionId,
    generation: u64,
    delay: Duration,
    reaction: ReactionDefinition,
    done: oneshot::Sender<ReactionDefinition>,
) {
    tokio::time::sleep(delay).await;

    let Some(state) = state.upgrade() else {
        return;
    };
    {
        let mut state = lock(&state);
        if state.generation != generation || state.stage != FlaskStage::Mixing {
            return;
        }
        state.stage = FlaskStage::Reacted;
        state.active_reaction = Some(reaction.clone());
        state.progress = 100;
    }
    debug!(%session_id, reaction = %reaction.reaction_id, "reaction settled");
    let _ = done.send(reaction);
}

/// Handle to an in-flight mix.
#[derive(Debug)]
pub struct PendingMix {
    reaction_id: String,
    outcome: oneshot::Receiver<ReactionDefinition>,
}

impl PendingMix {
    pub fn reaction_id(&self) -> &str {
        &self.reaction_id
    }

    /// Waits for the flask to settle. Returns `None` when the mix was cancelled.
    pub async fn settled(self) -> Option<ReactionDefinition> {
        self.outcome.await.ok()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
