use crate::storage::ArtifactStore;
use crowdcompute_engine::Engine;

pub struct AppState {
    pub engine: Engine,
    pub store: ArtifactStore,
    pub base_url: String,
}
