//! # Quizforge
//!
//! Real-time session server for multiplayer turn-based quiz games.
//!
//! Players and a session leader connect over WebSocket with a bearer
//! token, create or join a session, and then play: the leader starts the
//! game, players take turns choosing questions and race to claim them, the
//! leader judges the answers. The server is authoritative for turn order,
//! scoring and timing.
//!
//! ## Layers
//!
//! ```text
//! quizforge            server, handshake, connection adapter
//!   ├── quizforge-hub        session registry + directory
//!   │     └── quizforge-engine     game rules, turn order, scoring
//!   ├── quizforge-session    bearer credential verification
//!   ├── quizforge-protocol   wire envelopes and events
//!   ├── quizforge-content    quiz packages and the board
//!   ├── quizforge-timer      step deadlines
//!   └── quizforge-transport  WebSocket transport
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizforge::prelude::*;
//!
//! # async fn start() -> Result<(), QuizforgeError> {
//! let config = ServerConfig::load("quiz.toml")?;
//! let auth = JwtAuthenticator::new(config.jwt_secret.as_bytes())?;
//! let packs = MemoryPackLibrary::load_dir("packs")?;
//! let server = QuizforgeServerBuilder::new().config(config).build(auth, packs).await?;
//! server.run().await
//! # }
//! ```

mod adapter;
mod config;
mod error;
mod handler;
mod pack;
mod server;

pub use adapter::AdapterConfig;
pub use config::{ConfigError, MAX_PLAYERS_LIMIT, ServerConfig};
pub use error::QuizforgeError;
pub use handler::rejections;
pub use pack::{MemoryPackLibrary, PackLibrary};
pub use server::{QuizforgeServer, QuizforgeServerBuilder};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{
        AdapterConfig, ConfigError, MemoryPackLibrary, PackLibrary, QuizforgeError, QuizforgeServer,
        QuizforgeServerBuilder, ServerConfig,
    };
    pub use quizforge_content::{Package, Question, Round, Theme};
    pub use quizforge_engine::Timings;
    pub use quizforge_protocol::{Identity, PlayerId, Role, SessionId};
    pub use quizforge_session::{Authenticator, JwtAuthenticator, SessionError};
}
