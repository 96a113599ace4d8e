//! Shader variant prewarming: collect keyword combinations, resolve them into
//! the config, generate one material per combination and spawn everything in
//! throttled batches under every subset of the configured lights.

pub mod collector;
pub mod config;
pub mod generator;
pub mod keywords;
pub mod lights;
pub mod material;
pub mod placement;
pub mod plugin;
pub mod queue;
pub mod resolver;
pub mod scheduler;
pub mod spawn;
pub mod stack;
pub mod systems;

pub use plugin::PrewarmSettings;
pub use stack::PrewarmStackPlugin;
pub use systems::PrewarmAnchor;
