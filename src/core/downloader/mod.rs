pub mod artifact;
pub mod client;
pub mod parallel;

pub use artifact::{ExpectedHash, HashAlgorithm, ResolvedArtifact};
pub use client::{ArtifactFetcher, HttpFetcher};
pub use parallel::{DownloadReport, ParallelDownloader};
