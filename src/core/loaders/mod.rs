pub mod eula;
pub mod installer;

pub use eula::{check_eula, LicensePrompt, StdinPrompt, EULA_FILE};
pub use installer::{LoaderInstaller, INSTALLER_FILE};
