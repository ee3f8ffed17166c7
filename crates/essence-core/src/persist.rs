//! Draft autosave.
//!
//! The [`Autosaver`] mirrors store snapshots into [`Storage`] under
//! `session:<id>` and keeps `session:current` pointing at the live session.
//! [`AutosaveHandle`] drives it from a background thread on a fixed interval
//! and on lifecycle events. Persistence failures are logged, never returned.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RecipeError;
use crate::storage::Storage;
use crate::store::{SessionId, SharedStore, WizardState, lock_store};

pub const CURRENT_SESSION_KEY: &str = "session:current";

const UNLOAD_ACK_TIMEOUT: Duration = Duration::from_secs(2);

#[must_use]
pub fn session_key(session_id: &SessionId) -> String {
    format!("session:{session_id}")
}

/// Autosave cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Responsive,
    #[default]
    Balanced,
    Conservative,
}

impl PerformanceMode {
    #[must_use]
    pub const fn interval(self) -> Duration {
        match self {
            Self::Responsive => Duration::from_secs(1),
            Self::Balanced => Duration::from_secs(5),
            Self::Conservative => Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Responsive => "responsive",
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformanceMode {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "responsive" => Ok(Self::Responsive),
            "balanced" => Ok(Self::Balanced),
            "conservative" => Ok(Self::Conservative),
            other => Err(RecipeError::Config(format!(
                "unknown performance mode '{other}' (expected responsive, balanced, or conservative)"
            ))),
        }
    }
}

/// Host lifecycle events that force a save outside the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The host went to the background.
    Hidden,
    /// The host is about to exit. The save completes before `notify` returns.
    BeforeUnload,
}

/// Writes snapshots that differ from the last one written.
#[derive(Debug)]
pub struct Autosaver {
    storage: Storage,
    last_saved: Option<Arc<WizardState>>,
}

impl Autosaver {
    #[must_use]
    pub const fn new(storage: Storage) -> Self {
        Self {
            storage,
            last_saved: None,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Save unless `snapshot` is the one already written. Returns whether a
    /// write happened.
    pub fn save_if_changed(&mut self, snapshot: &Arc<WizardState>) -> bool {
        if self
            .last_saved
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, snapshot))
        {
            return false;
        }
        match self.save(snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, session = %snapshot.session_id, "autosave failed");
                false
            }
        }
    }

    /// Unconditional write of `snapshot` and the current-session pointer.
    pub fn save(&mut self, snapshot: &Arc<WizardState>) -> Result<(), RecipeError> {
        if let Some(previous) = &self.last_saved
            && previous.session_id != snapshot.session_id
        {
            self.storage.remove_item(&session_key(&previous.session_id))?;
            debug!(old = %previous.session_id, "dropped draft of replaced session");
        }
        self.storage
            .set_item(&session_key(&snapshot.session_id), snapshot.as_ref())?;
        self.storage
            .set_item(CURRENT_SESSION_KEY, &snapshot.session_id)?;
        self.last_saved = Some(Arc::clone(snapshot));
        debug!(session = %snapshot.session_id, step = %snapshot.current_step, "draft saved");
        Ok(())
    }

    /// Treat `snapshot` as already persisted, e.g. right after a restore.
    pub fn mark_saved(&mut self, snapshot: &Arc<WizardState>) {
        self.last_saved = Some(Arc::clone(snapshot));
    }
}

/// Load the draft `session:current` points at, if any survives.
#[must_use]
pub fn restore(storage: &Storage) -> Option<WizardState> {
    let session = match storage.get_item::<SessionId>(CURRENT_SESSION_KEY) {
        Ok(Some(session)) => session,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "could not read current session pointer");
            return None;
        }
    };
    match storage.get_item::<WizardState>(&session_key(&session)) {
        Ok(Some(state)) if state.session_id == session => {
            info!(%session, step = %state.current_step, "restored draft");
            Some(state)
        }
        Ok(Some(_)) => {
            warn!(%session, "draft does not match its session pointer");
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, %session, "could not read draft");
            None
        }
    }
}

enum Signal {
    Lifecycle(Lifecycle, Option<Sender<()>>),
    Shutdown,
}

/// Background autosave loop bound to a shared store.
#[derive(Debug)]
pub struct AutosaveHandle {
    tx: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(event, _) => write!(f, "Lifecycle({event:?})"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl AutosaveHandle {
    pub fn spawn(
        store: SharedStore,
        storage: Storage,
        mode: PerformanceMode,
    ) -> Result<Self, RecipeError> {
        let (tx, rx) = mpsc::channel::<Signal>();
        let interval = mode.interval();
        let mut saver = Autosaver::new(storage);
        saver.mark_saved(&lock_store(&store).snapshot());
        let thread = thread::Builder::new()
            .name("essence-autosave".into())
            .spawn(move || {
                loop {
                    let signal = rx.recv_timeout(interval);
                    let snapshot = lock_store(&store).snapshot();
                    match signal {
                        Err(RecvTimeoutError::Timeout) => {
                            saver.save_if_changed(&snapshot);
                        }
                        Ok(Signal::Lifecycle(event, ack)) => {
                            debug!(?event, "lifecycle save");
                            saver.save_if_changed(&snapshot);
                            if let Some(ack) = ack {
                                let _ = ack.send(());
                            }
                        }
                        Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                            saver.save_if_changed(&snapshot);
                            break;
                        }
                    }
                }
            })?;
        info!(%mode, ?interval, "autosave started");
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// Forward a lifecycle event. `BeforeUnload` blocks until the write is
    /// done or a short deadline passes.
    pub fn notify(&self, event: Lifecycle) {
        match event {
            Lifecycle::Hidden => {
                let _ = self.tx.send(Signal::Lifecycle(event, None));
            }
            Lifecycle::BeforeUnload => {
                let (ack_tx, ack_rx) = mpsc::channel();
                if self.tx.send(Signal::Lifecycle(event, Some(ack_tx))).is_ok()
                    && ack_rx.recv_timeout(UNLOAD_ACK_TIMEOUT).is_err()
                {
                    warn!("draft flush before unload did not finish in time");
                }
            }
        }
    }

    /// Flush once and stop the loop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Signal::Shutdown);
            if thread.join().is_err() {
                warn!("autosave thread panicked");
            }
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
