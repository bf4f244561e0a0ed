use cadsync_engine::SyncEngine;
use cadsync_store::CadStore;

pub struct AppState<S: CadStore> {
    pub engine: SyncEngine<S>,
}

impl<S: CadStore> AppState<S> {
    pub fn new(engine: SyncEngine<S>) -> Self {
        Self { engine }
    }
}
