use {
    tokio::sync::{
        Mutex,
        MutexGuard,
    },
    crate::{
        config::Layout,
        prelude::*,
        sheets::Spreadsheet,
        state::StateStore,
    },
};

/// Everything an event handler needs, built once at startup.
pub(crate) struct App {
    pub(crate) sheet: Arc<dyn Spreadsheet>,
    pub(crate) state: StateStore,
    pub(crate) layout: Layout,
    event_lock: Mutex<()>,
}

impl App {
    pub(crate) fn new(sheet: Arc<dyn Spreadsheet>, state: StateStore, layout: Layout) -> Self {
        Self { sheet, state, layout, event_lock: Mutex::default() }
    }

    /// Held for the whole handling of a command or results message so that events never interleave.
    pub(crate) async fn lock_event(&self) -> MutexGuard<'_, ()> {
        self.event_lock.lock().await
    }
}
