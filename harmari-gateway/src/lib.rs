pub mod discord;
pub mod rank;
pub mod state;

pub use rank::client::{RankApiClient, RankApiError};
pub use rank::coordinator::{Requester, SubmitError, SubmitOutcome};
pub use state::AppState;
