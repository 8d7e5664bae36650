use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) presence: Presence,
}

impl AppState {
    pub(crate) fn new(api: ApiContext) -> Self {
        Self {
            api,
            presence: Presence::default(),
        }
    }
}

/// Count of open websocket clients.
#[derive(Clone, Default)]
pub(crate) struct Presence(Arc<AtomicUsize>);

impl Presence {
    pub(crate) fn join(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn leave(&self) -> usize {
        self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }
}
