pub mod discovery;

pub use discovery::{resolve_java_executable, version_output_matches, DEFAULT_JAVA};
