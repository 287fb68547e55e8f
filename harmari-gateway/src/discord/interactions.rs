//! Interaction handling: the rank command modal flow.
//!
//! Serenity requires a single `EventHandler` impl, so this file provides
//! the `interaction_create` body as a method on `Bot` that the EventHandler
//! impl in `mod.rs` delegates to.

use serenity::builder::{
    CreateActionRow, CreateInputText, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateModal,
};
use serenity::model::application::{
    ActionRowComponent, InputTextStyle, Interaction, ModalInteraction,
};
use serenity::prelude::*;
use tracing::{error, warn};

use crate::rank::card::format_ranking_card;
use crate::rank::coordinator::{self, Requester, SubmitOutcome};

use super::Bot;

pub(super) const RANK_COMMAND: &str = "랭크";
const RANK_MODAL_ID: &str = "rank-modal";

impl Bot {
    pub(super) async fn handle_interaction(&self, ctx: Context, interaction: Interaction) {
        if let Some(command) = interaction.as_command()
            && command.data.name == RANK_COMMAND
        {
            let modal = CreateModal::new(RANK_MODAL_ID, "캐릭터 랭킹 조회").components(vec![
                CreateActionRow::InputText(
                    CreateInputText::new(InputTextStyle::Short, "서버 이름", "server")
                        .required(true),
                ),
                CreateActionRow::InputText(
                    CreateInputText::new(InputTextStyle::Short, "캐릭터 이름", "character")
                        .required(true),
                ),
            ]);
            if let Err(e) = command
                .create_response(&ctx.http, CreateInteractionResponse::Modal(modal))
                .await
            {
                error!("Failed to open the rank modal: {}", e);
            }
            return;
        }

        if let Some(modal) = interaction.as_modal_submit()
            && modal.data.custom_id == RANK_MODAL_ID
        {
            self.handle_rank_modal(&ctx, modal).await;
        }
    }

    async fn handle_rank_modal(&self, ctx: &Context, modal: &ModalInteraction) {
        let Some((server, character)) = extract_query(modal) else {
            respond_ephemeral(ctx, modal, "서버 이름과 캐릭터 이름을 모두 입력해주세요.").await;
            return;
        };

        let requester = Requester {
            user_id: modal.user.id,
            channel_id: modal.channel_id,
            guild_id: modal.guild_id,
        };

        match coordinator::submit(&self.state, &ctx.http, &requester, &server, &character).await {
            Ok(SubmitOutcome::Cached(card)) => {
                let response = CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().content(format_ranking_card(&card)),
                );
                if let Err(e) = modal.create_response(&ctx.http, response).await {
                    error!("Failed to send cached ranking card: {}", e);
                }
            }
            Ok(SubmitOutcome::Queued) => {
                respond_ephemeral(ctx, modal, "조회 요청이 접수되었습니다.").await;
            }
            Err(e) => {
                respond_ephemeral(ctx, modal, &e.user_message()).await;
            }
        }
    }
}

/// Pull the two text inputs out of the submitted modal. Values the user
/// left as pure whitespace count as missing.
fn extract_query(modal: &ModalInteraction) -> Option<(String, String)> {
    let mut server = None;
    let mut character = None;

    for row in &modal.data.components {
        for component in &row.components {
            if let ActionRowComponent::InputText(input) = component {
                let value = input.value.clone().filter(|v| !v.trim().is_empty());
                match input.custom_id.as_str() {
                    "server" => server = value,
                    "character" => character = value,
                    _ => {}
                }
            }
        }
    }

    Some((server?, character?))
}

async fn respond_ephemeral(ctx: &Context, modal: &ModalInteraction, content: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );
    if let Err(e) = modal.create_response(&ctx.http, response).await {
        warn!("Failed to respond to the rank modal: {}", e);
    }
}
