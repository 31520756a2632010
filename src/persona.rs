//! Persona prompt assembly
//!
//! Renders a character's persona template into the prompt the serving layer
//! sends to the model: the template's placeholders are substituted with the
//! rolling conversation-history window and the incoming user message. Pure
//! string assembly; the model call itself lives outside this crate.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// How many of the most recent exchanges stay in the prompt by default
pub const DEFAULT_HISTORY_WINDOW: usize = 2;

/// One user/character exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub character: String,
}

/// A character's prompt template, as stored with the character
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonaTemplate {
    pub character_name: String,
    pub template: String,
}

/// Render a persona prompt.
///
/// Substitutes `{history}` with the formatted tail of the conversation
/// (limited to `window` exchanges) and `{message}` with the incoming user
/// message. Unknown placeholders pass through untouched; a template without
/// placeholders simply renders as-is, so malformed templates degrade rather
/// than fail.
pub fn render_prompt(
    persona: &PersonaTemplate,
    history: &[Exchange],
    message: &str,
    window: usize,
) -> String {
    let tail_start = history.len().saturating_sub(window);
    let formatted_history = history[tail_start..]
        .iter()
        .map(|exchange| {
            format!(
                "User: {}\n{}: {}",
                exchange.user, persona.character_name, exchange.character
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    persona
        .template
        .replace("{history}", &formatted_history)
        .replace("{message}", message)
}

/// Load a character's persona template
pub async fn load_template(pool: &PgPool, character_id: Uuid) -> Result<Option<PersonaTemplate>> {
    let persona = sqlx::query_as::<_, PersonaTemplate>(
        r#"
        SELECT name AS character_name, persona_template AS template
        FROM characters
        WHERE id = $1 AND is_deleted = false
        "#,
    )
    .bind(character_id)
    .fetch_optional(pool)
    .await?;

    Ok(persona)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> PersonaTemplate {
        PersonaTemplate {
            character_name: "Shirley".to_string(),
            template: "You are Shirley.\n{history}\nUser: {message}\nShirley:".to_string(),
        }
    }

    fn exchange(user: &str, character: &str) -> Exchange {
        Exchange {
            user: user.to_string(),
            character: character.to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_message() {
        let prompt = render_prompt(&persona(), &[], "hi there", DEFAULT_HISTORY_WINDOW);
        assert!(prompt.contains("User: hi there"));
        assert!(!prompt.contains("{message}"));
        assert!(!prompt.contains("{history}"));
    }

    #[test]
    fn test_history_window_keeps_only_recent_exchanges() {
        let history = vec![
            exchange("one", "r1"),
            exchange("two", "r2"),
            exchange("three", "r3"),
        ];

        let prompt = render_prompt(&persona(), &history, "next", 2);
        assert!(!prompt.contains("User: one"));
        assert!(prompt.contains("User: two"));
        assert!(prompt.contains("Shirley: r3"));
    }

    #[test]
    fn test_template_without_placeholders_renders_verbatim() {
        let fixed = PersonaTemplate {
            character_name: "Echo".to_string(),
            template: "static persona".to_string(),
        };
        assert_eq!(
            render_prompt(&fixed, &[], "ignored", DEFAULT_HISTORY_WINDOW),
            "static persona"
        );
    }

    #[test]
    fn test_empty_history_renders_empty_block() {
        let prompt = render_prompt(&persona(), &[], "msg", DEFAULT_HISTORY_WINDOW);
        assert!(prompt.starts_with("You are Shirley.\n\nUser: msg"));
    }
}
