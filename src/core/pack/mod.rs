pub mod archive;
pub mod filter;
pub mod manifest;
pub mod pack_type;
pub mod resolver;

pub use archive::{ArchiveInstaller, ExtractionSummary};
pub use filter::PathFilter;
pub use manifest::{ManifestKind, ModEntry, PackManifest};
pub use pack_type::{CurseForgePack, ModrinthPack, Pack, PackContext, PackType};
pub use resolver::{ArtifactResolver, CurseForgeResolver, ModrinthResolver};
