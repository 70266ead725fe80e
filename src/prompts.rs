use crate::gateway::ChatPrompt;
use crate::models::Character;

pub struct Prompts;

impl Prompts {
    pub const ROLEPLAY_PREAMBLE: &'static str = "You are role-playing as the character described below. Stay in character at all times, answer in the first person, and keep replies short enough to be read aloud. Do not use markdown, lists, emoji, or stage directions.";

    /// Builds the single-turn prompt for one user message. Earlier turns of
    /// the conversation are deliberately not included.
    pub fn character_chat(character: &Character, message: &str) -> ChatPrompt {
        ChatPrompt {
            system: format!(
                "{}\n\nCharacter name: {}\n\n{}",
                Prompts::ROLEPLAY_PREAMBLE,
                character.name,
                character.system_prompt.trim()
            ),
            user: message.trim().to_string(),
        }
    }
}
