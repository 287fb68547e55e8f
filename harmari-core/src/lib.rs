//! harmari-core: shared configuration and the canonical ranking model.
//!
//! This crate holds everything the gateway and the persistence layer agree
//! on without depending on each other:
//! - Environment-based configuration
//! - The game server whitelist
//! - The normalized ranking card model and its normalization rules

pub mod config;
pub mod ranking;
pub mod servers;

pub use config::{Config, ConfigError, load_dotenv};
pub use ranking::{ChangeType, RankScore, RankingCard, UNKNOWN, format_thousands, parse_count};
pub use servers::{GAME_SERVERS, is_known_server};
