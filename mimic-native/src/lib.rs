//! # mimic-native
//!
//! Native backends for mimic-core.
//!
//! Provides:
//! - `CpalBackend` — microphone grants and capture contexts via cpal
//! - `CpalSink` — clip playback via cpal
//! - `HttpGameClient` — the analysis backend over HTTP
//! - `DeviceEnumerator` — audio device listing
//! - `permissions` — microphone access checks
//!
//! ## Usage
//! ```ignore
//! use mimic_core::{BattleConfig, CaptureConfig, CaptureEngine, MatchResources};
//! use mimic_native::CpalBackend;
//!
//! let engine = CaptureEngine::new(Arc::new(CpalBackend::new(None, 4096)), CaptureConfig::default())?;
//! let resources = MatchResources::prepare(&engine)?;
//! ```

pub mod cli;
pub mod config;
pub mod cpal_backend;
pub mod cpal_sink;
pub mod device_enumerator;
pub mod http_client;
pub mod permissions;
pub mod terminal;

pub use config::AppConfig;
pub use cpal_backend::CpalBackend;
pub use cpal_sink::CpalSink;
pub use device_enumerator::DeviceEnumerator;
pub use http_client::HttpGameClient;
pub use terminal::TerminalObserver;
