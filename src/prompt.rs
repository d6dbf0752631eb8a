//! Builds the outbound message list: system prompt followed by history.
use crate::history::Message;
use crate::identity::Identity;

const NAME_PLACEHOLDER: &str = "{name}";

/// Restricts the assistant to L'Oréal beauty topics and asks it to use the user's name.
pub const SYSTEM_PROMPT_TEMPLATE: &str = "You are a friendly and knowledgeable L'Oréal beauty advisor. \
Only answer questions about L'Oréal products, skincare, haircare, makeup, fragrance, and beauty routines or recommendations. \
If a question is unrelated to L'Oréal or beauty, politely explain that you can only help with L'Oréal products and beauty topics, \
and invite the user to ask something in that area. \
The user's name is {name}. Address {name} by name when it feels natural and keep your answers personal, clear, and concise.";

pub const WELCOME_TEMPLATE: &str = "Hello {name}! I'm your L'Oréal beauty advisor. \
Ask me anything about skincare, makeup, haircare, or fragrance and I'll help you find the right products and routine.";

pub fn system_prompt(identity: &Identity) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace(NAME_PLACEHOLDER, identity.name())
}

pub fn welcome_message(identity: &Identity) -> String {
    WELCOME_TEMPLATE.replace(NAME_PLACEHOLDER, identity.name())
}

/// Returns `[system, ...history]`; history is passed through unchanged.
pub fn build(identity: &Identity, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(system_prompt(identity)));
    messages.extend(history.iter().cloned());
    messages
}
