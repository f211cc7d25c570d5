mod model;
mod persistence;
mod restore;
mod store;

pub use model::{ControlState, ControlStatePatch, GroupState, OverlayState, StatePatch, Viewport, ViewportPatch};
pub use persistence::{
    FileStorage, MemoryStorage, PersistenceError, PersistenceResult, Storage, load_record, save_record,
};
#[cfg(target_arch = "wasm32")]
pub use persistence::WebStorage;
pub use restore::{RestoreReport, default_state, restore};
pub use store::StateStore;
