//! Markdown rendering of a ranking card for Discord.

use harmari_core::{RankScore, RankingCard, format_thousands};

fn section(title: &str, emoji: &str, score: &RankScore) -> String {
    format!(
        "### {} {}\n> **랭킹** : {}\n> **점수** : {}\n> **변동** : {} {}",
        emoji,
        title,
        score.rank,
        score.power,
        score.change_marker(),
        format_thousands(score.change.abs()),
    )
}

/// Render the full card: header, one section per category, realtime notice.
pub fn format_ranking_card(card: &RankingCard) -> String {
    format!(
        "## [ {} ] {} - {}\n\n{}\n\n{}\n\n{}\n\n-# 정보는 거의 실시간 조회 중입니다. (약간의 오차가 있을 수 있음)",
        card.server,
        card.character,
        card.class,
        section("전투력", "⚔️", &card.combat),
        section("매력", "✨", &card.charm),
        section("생활력", "🌿", &card.life),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmari_core::RankScore;

    fn sample_card() -> RankingCard {
        RankingCard {
            character: "Foo".to_string(),
            server: "데이안".to_string(),
            class: "전사".to_string(),
            combat: RankScore::normalize(Some("1234"), Some("123456"), Some("12"), Some("up")),
            charm: RankScore::normalize(Some("5678"), Some("4000"), Some("-3"), Some("down")),
            life: RankScore::normalize(None, None, None, None),
        }
    }

    #[test]
    fn card_renders_header_and_sections() {
        let text = format_ranking_card(&sample_card());

        assert!(text.starts_with("## [ 데이안 ] Foo - 전사"));
        assert!(text.contains("### ⚔️ 전투력"));
        assert!(text.contains("> **랭킹** : 1,234위"));
        assert!(text.contains("> **점수** : 123,456"));
        assert!(text.contains("> **변동** : 🔺 12"));
        assert!(text.contains("### ✨ 매력"));
        // Delta is rendered as an absolute value next to the marker
        assert!(text.contains("> **변동** : 🔻 3"));
        assert!(text.contains("### 🌿 생활력"));
        assert!(text.contains("> **랭킹** : 알 수 없음"));
        assert!(text.contains("> **변동** : - 0"));
    }
}
