use std::sync::Arc;

use fetcharr_config::Settings;
use fetcharr_core::{CapabilityRegistry, ItemStore, ItemWorkflow};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub registry: Arc<CapabilityRegistry>,
    pub workflow: Arc<ItemWorkflow>,
    pub settings: Arc<Settings>,
}
