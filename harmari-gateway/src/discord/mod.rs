//! Discord client: slash command registration and the event handler shell.

mod interactions;

use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::CreateCommand;
use serenity::model::application::{Command, Interaction};
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info};

use crate::state::AppState;

/// Discord bot handler
///
/// The handler is glue only: input collection happens in the modal flow in
/// `interactions.rs`, and everything after that is delegated to
/// `rank::coordinator::submit`.
pub struct Bot {
    pub(super) state: Arc<AppState>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let command = CreateCommand::new(interactions::RANK_COMMAND)
            .description("캐릭터의 랭킹 정보를 조회합니다");
        if let Err(e) = Command::create_global_command(&ctx.http, command).await {
            error!("Failed to register the rank command: {}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        self.handle_interaction(ctx, interaction).await;
    }
}

/// Build the serenity client. Slash commands and modals arrive over the
/// interaction gateway, so no privileged intents are needed.
pub async fn build_discord_client(
    token: &str,
    state: Arc<AppState>,
) -> serenity::Result<Client> {
    Client::builder(token, GatewayIntents::empty())
        .event_handler(Bot::new(state))
        .await
}
