use super::{ComponentState, CounterOrchestrator};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub(super) const CAPTURE: &str = "capture";
pub(super) const DELIVERY: &str = "delivery";
pub(super) const POLLER: &str = "poller";
pub(super) const API: &str = "api";

impl CounterOrchestrator {
    /// Record a lifecycle transition for a component
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let previous = self
            .component_states
            .lock()
            .await
            .insert(component.to_string(), state.clone());

        if state == ComponentState::Failed {
            warn!("Component '{}' failed (was {:?})", component, previous);
        } else {
            debug!("Component '{}' state changed to: {:?}", component, state);
        }
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    /// Snapshot of every registered component, ordered by name
    pub async fn get_all_component_states(&self) -> BTreeMap<String, ComponentState> {
        self.component_states
            .lock()
            .await
            .iter()
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect()
    }

    /// Names of components currently in the `Failed` state
    pub async fn failed_components(&self) -> Vec<String> {
        self.component_states
            .lock()
            .await
            .iter()
            .filter(|(_, state)| **state == ComponentState::Failed)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
