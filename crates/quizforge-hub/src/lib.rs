//! Session registry for Quizforge.
//!
//! A session is two actors: the engine that owns the game and the hub
//! that owns the connections. This crate provides the hub and the
//! process-wide [`SessionDirectory`] that creates sessions and finds them
//! by id.
//!
//! # Architecture
//!
//! ```text
//! SessionDirectory
//!   └── HubHandle ──▶ hub task ──▶ engine task
//!                       │
//!                       └── Participant outbound queues ──▶ write pumps
//! ```
//!
//! All traffic between the pieces goes over channels. The only lock is the
//! directory's map.

mod config;
mod directory;
mod error;
mod hub;

pub use config::{DEFAULT_ACTION_CAPACITY, DEFAULT_COMMAND_CAPACITY, HubConfig};
pub use directory::{SessionDirectory, SessionEntry};
pub use error::HubError;
pub use hub::{HubHandle, HubInfo, Outbound, Participant, SessionOptions, spawn_session};
