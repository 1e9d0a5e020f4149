pub mod core;
pub mod events;
pub mod filters;
pub mod presets;
pub mod setup;
