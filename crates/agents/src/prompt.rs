use crate::{memory::ShortTermMemory, model::ChatMessage};

/// Build the completion messages for one chat turn.
///
/// The persona is appended to the system prompt; the secondary prompt carries
/// the recent conversation so the model keeps context between turns.
pub fn build_messages(
    system_prompt: &str,
    identity: Option<&str>,
    secondary_prompt: &str,
    memory: &ShortTermMemory,
    user_input: &str,
) -> Vec<ChatMessage> {
    let mut system = system_prompt.to_string();
    if let Some(identity) = identity {
        system.push_str("\nCurrent identity: ");
        system.push_str(identity);
    }

    let mut secondary = secondary_prompt.to_string();
    if !memory.is_empty() {
        secondary.push_str("\nRecent conversation:");
        for msg in memory.recent() {
            secondary.push('\n');
            secondary.push_str(msg.role.as_str());
            secondary.push_str(": ");
            secondary.push_str(&msg.content);
        }
    }

    let mut messages = vec![ChatMessage::system(system)];
    if !secondary.trim().is_empty() {
        messages.push(ChatMessage::system(secondary));
    }
    messages.push(ChatMessage::user(user_input));
    messages
}
