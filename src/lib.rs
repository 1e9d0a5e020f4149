pub mod bundle;
pub mod controls;
pub mod db;
pub mod drawers;
pub mod error;
pub mod events;
pub mod filters;
pub mod ipc;
pub mod presets;
pub mod schema;

pub use error::{FilterError, NormalizeError, StoreError};
pub use events::{normalize, EventInstant, EventRecord};
pub use filters::{ActiveFilterPayload, FilterConsumer, FilterEngine, FilterState};
pub use presets::{MemoryPresetStore, Preset, PresetStore, SqlitePresetStore};
pub use schema::{FieldDescriptor, FieldKind, Schema, SelectOption};
