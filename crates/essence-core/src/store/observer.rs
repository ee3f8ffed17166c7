use tracing::{debug, info};

use super::action::WizardAction;
use super::state::WizardState;

/// Middleware hook invoked after every dispatch.
///
/// `after` is the same snapshot as `before` when the action was a no-op.
pub trait StoreObserver: Send + Sync {
    fn on_dispatch(&self, action: &WizardAction, before: &WizardState, after: &WizardState);
}

/// Logs dispatched actions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn on_dispatch(&self, action: &WizardAction, before: &WizardState, after: &WizardState) {
        let changed = !before.same_content(after);
        debug!(
            action = action.name(),
            changed,
            session = %after.session_id,
            step = %after.current_step,
            "wizard dispatch"
        );

        if !changed {
            return;
        }

        if let Some(origin) = action.cascade_from() {
            let cleared: Vec<&'static str> = origin
                .downstream()
                .filter(|step| before.has_data_for(*step) && !after.has_data_for(*step))
                .map(|step| step.as_str())
                .collect();
            if !cleared.is_empty() {
                info!(
                    action = action.name(),
                    from = %origin,
                    cleared = ?cleared,
                    "cascade invalidated downstream steps"
                );
            }
        }

        if after.streaming_error.is_some() && before.streaming_error != after.streaming_error {
            info!(
                error = after.streaming_error.as_deref().unwrap_or_default(),
                "streaming stopped on error"
            );
        }
    }
}
