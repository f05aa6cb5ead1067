//! Episode continuity engine for a daily AI comic strip.
//!
//! Each registered comic series accumulates daily episodes: a generated
//! image plus a short narrative beat that stays visually and narratively
//! continuous with the episode before it. This crate provides:
//! - Content fingerprinting and deduplication of incoming story prompts
//! - Admission with an LLM content-policy gate and per-origin rate limiting
//! - The stateful chain producing episode N+1 from episode N's artifacts
//! - Stateless HMAC unsubscribe capabilities and episode email dispatch
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use strip_core::{AdmissionGate, Config, ContinuityEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = gemini::Gemini::new(&config.gemini_api_key);
//!     // Wire stores and providers once, pass them in explicitly...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod id;
pub mod notify;
pub mod prompt;
pub mod provider;
pub mod register;
pub mod store;
pub mod sweep;
pub mod testing;
pub mod token;

// Primary public API
pub use config::Config;
pub use engine::{Advanced, ContinuityEngine};
pub use error::{Error, Result};
pub use gate::{Admission, AdmissionGate};
pub use id::{ComicId, EpisodeId};
pub use notify::Dispatcher;
pub use register::{Registrar, RegistrarPolicy};
pub use store::{Comic, ComicStore, Episode, EpisodeStore, MemoryStore};
pub use sweep::{run_sweep, SweepPolicy, SweepReport};
pub use token::UnsubSigner;
