//! Regroove Core - live performance engine for tracker modules
//!
//! The engine wraps an opaque module renderer and turns passive playback
//! into an instrument: queued pattern jumps, pattern loops, per-channel
//! mixing, variable pitch, an effects chain, trigger pads, phrases and a
//! row-accurate performance recorder.
//!
//! # Architecture
//!
//! ```text
//! keyboard / MIDI ──► input mapping ──► Session::dispatch ──► EngineHandle
//!                                              ▲                   │ rtrb (SPSC)
//!                                              │                   ▼
//!                 Session::poll ◄── rtrb ── AudioProcessor (audio thread)
//!               (performance, phrases)     drain → render → effects
//! ```

pub mod action;
pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod files;
pub mod input;
pub mod metadata;
pub mod pads;
pub mod performance;
pub mod phrase;
pub mod session;
pub mod types;

pub use action::{Action, ActionEvent, DispatchContext};
pub use session::{Session, SessionError};
pub use types::*;
