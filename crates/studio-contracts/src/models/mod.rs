mod registry;
mod selectors;

pub use registry::{capability, ModelRegistry, ModelSpec};
pub use selectors::{ModelSelection, ModelSelector};
