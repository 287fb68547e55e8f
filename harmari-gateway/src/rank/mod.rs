//! The ranking lookup subsystem.
//!
//! `coordinator` decides fast-path vs. slow-path, persists waiters and
//! launches at most one background poll per query; `client` talks to the
//! remote job API; `cache` serves the fast path from the replicated table;
//! `notify` fans a resolved outcome out to every waiter; `card` renders the
//! result for Discord.

pub mod cache;
pub mod card;
pub mod cleanup;
pub mod client;
pub mod coordinator;
pub mod notify;
