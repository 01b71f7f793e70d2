//! Core library for trackdeck, a shared music/demo review tool.
//!
//! The heart of the crate is the track-data pipeline: computing compact
//! peak-amplitude summaries from audio, persisting them as durable artifacts,
//! detecting staleness against the source audio, and serving them through a
//! batched, concurrency-bounded retrieval path with a session-scoped client
//! cache and a self-healing duration reconciliation layer.

/// Typed HTTP handler layer over the artifact store.
pub mod api;
/// Application directory helpers.
pub mod app_dirs;
/// Supported audio file extensions.
pub mod audio_files;
/// TOML-backed application settings.
pub mod config;
/// Track-data generators: offline subprocess and on-demand download/decode.
pub mod generate;
mod http_client;
/// Logging setup.
pub mod logging;
/// Track load state machine, duration reconciliation, and folder sweeps.
pub mod player;
/// Offline batch precompute over a local directory tree.
pub mod precompute;
/// Running order documents.
pub mod running_order;
/// Blob storage abstraction and providers.
pub mod storage;
/// Track-data artifacts: peaks, store, staleness, batch retrieval, cache.
pub mod track_data;
