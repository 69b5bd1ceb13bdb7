// ─── ServerStarter Core ───
// Installs a modpack onto a server directory and keeps the server running.
//
// Architecture:
//   core/
//     config/     — install + launch configuration model
//     state/      — lock file (what is already installed)
//     downloader/ — fetcher trait, hashing, two-pass parallel downloads
//     pack/       — ignore filters, archive extraction, manifests, resolvers
//     loaders/    — loader installer, sponge bootstrapper, EULA
//     java/       — java executable discovery
//     launch/     — command assembly, crash window, process registry, supervisor

pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod pack;
pub mod platform;
pub mod state;
