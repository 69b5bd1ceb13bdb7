pub mod model;

pub use model::{InstallConfig, LaunchConfig, ServerConfig, CONFIG_FILE};
