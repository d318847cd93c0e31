//! Chat-with-an-animal sessions.
//!
//! The language model is an external collaborator behind [`ChatCompletion`]:
//! role-tagged messages and sampling parameters in, text out. Conversations
//! live in an explicit [`ChatSessionStore`] owned by the caller, one session
//! per animal. A failed request never surfaces as an error; the animal
//! answers with a short apology instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ChatSettings;

pub const CONNECTION_TROUBLE_REPLY: &str =
    "Sorry, I'm having trouble connecting to my animal knowledge. Let's try again in a moment!";
pub const NO_ANSWER_REPLY: &str = "I couldn't find an answer for that. Let's try a different question!";
pub const TECHNICAL_TROUBLE_REPLY: &str =
    "I'm having a little trouble with my animal brain right now. Let's chat again in a moment!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    /// The service answered with an error payload
    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Chat service returned no answer")]
    EmptyResponse,
}

/// Chat-completion collaborator
pub trait ChatCompletion: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

/// Scripted collaborator for tests and offline use
pub struct FakeChatClient {
    responses: Mutex<Vec<Result<String, ChatError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChatClient {
    /// Responses are returned in order; the last one repeats
    pub fn new(responses: Vec<Result<String, ChatError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn always_error(error: ChatError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }
}

impl ChatCompletion for FakeChatClient {
    fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        match responses.len() {
            0 => Err(ChatError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}

/// Conversation with one animal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub animal: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(animal: &str) -> Self {
        Self { animal: animal.to_string(), messages: Vec::new() }
    }

    /// The most recent `window` messages
    pub fn recent(&self, window: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(window);
        &self.messages[start..]
    }
}

/// Per-conversation message store, keyed by animal
#[derive(Debug, Default)]
pub struct ChatSessionStore {
    sessions: HashMap<String, ChatSession>,
}

impl ChatSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, animal: &str) -> &[ChatMessage] {
        self.sessions
            .get(animal)
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_messages(&mut self, animal: &str, messages: Vec<ChatMessage>) {
        self.session_mut(animal).messages = messages;
    }

    pub fn session_mut(&mut self, animal: &str) -> &mut ChatSession {
        self.sessions
            .entry(animal.to_string())
            .or_insert_with(|| ChatSession::new(animal))
    }

    pub fn clear(&mut self, animal: &str) {
        self.sessions.remove(animal);
    }
}

/// Character sheet the assistant plays. Supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimalPersona {
    pub name: String,
    pub scientific_name: String,
    pub personality_traits: Vec<String>,
    pub habitat_description: String,
    pub diet_type: String,
    pub lifespan: String,
    pub conservation_status: String,
    pub conservation_challenges: Vec<String>,
    pub category: String,
    pub special_abilities: Vec<String>,
    pub voice_characteristics: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    pub user_age: Option<u8>,
    pub include_conservation: bool,
    pub include_scientific: bool,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            user_age: None,
            include_conservation: true,
            include_scientific: true,
        }
    }
}

fn content_level(user_age: Option<u8>) -> &'static str {
    match user_age {
        None => "balanced and educational",
        Some(age) if age < 8 => "simple and fun, avoiding complex terms",
        Some(age) if age < 13 => "educational but accessible for pre-teens",
        Some(_) => "detailed and scientifically accurate",
    }
}

pub fn build_system_prompt(persona: &AnimalPersona, options: &PromptOptions) -> String {
    let mut prompt = format!(
        "You are {} ({}), a friendly zoo animal with these personality traits: {}.\n\n",
        persona.name,
        persona.scientific_name,
        persona.personality_traits.join(", ")
    );

    prompt.push_str("YOUR KNOWLEDGE:\n");
    prompt.push_str(&format!("- You live in {}\n", persona.habitat_description));
    prompt.push_str(&format!(
        "- You're a {} with a lifespan of about {} years\n",
        persona.diet_type, persona.lifespan
    ));
    prompt.push_str(&format!("- Your conservation status: {}\n", persona.conservation_status));
    if options.include_conservation {
        prompt.push_str(&format!(
            "- Conservation challenges you face: {}\n",
            persona.conservation_challenges.join(", ")
        ));
    }
    if options.include_scientific {
        prompt.push_str(&format!(
            "- Scientific details: You belong to the {} category with special abilities like {}\n",
            persona.category,
            persona.special_abilities.join(", ")
        ));
    }

    prompt.push_str("\nYOUR ROLE:\n");
    prompt.push_str(&format!(
        "- Answer in a {} voice, staying in character\n",
        persona.voice_characteristics
    ));
    prompt.push_str(&format!("- Be {} in your explanations\n", content_level(options.user_age)));
    prompt.push_str("- Share fun facts about yourself and your species when relevant\n");
    prompt.push_str("- Promote conservation awareness and ecological understanding\n");
    prompt.push_str("- Keep answers concise (1-3 paragraphs) and engaging\n");
    prompt.push_str(
        "- If asked about something you don't know, respond as your animal character might, \
         rather than saying you don't have that information\n",
    );
    prompt
}

/// Asks an animal persona questions through a collaborator
pub struct AnimalChat<'c> {
    client: &'c dyn ChatCompletion,
    settings: ChatSettings,
}

impl<'c> AnimalChat<'c> {
    pub fn new(client: &'c dyn ChatCompletion, settings: ChatSettings) -> Self {
        Self { client, settings }
    }

    /// One question, one request, no retry. Both the question and the reply
    /// (or the fallback apology) are appended to the session.
    pub fn ask(
        &self,
        session: &mut ChatSession,
        persona: &AnimalPersona,
        message: &str,
        options: &PromptOptions,
    ) -> String {
        let mut messages = Vec::with_capacity(self.settings.history_window + 2);
        messages.push(ChatMessage::system(build_system_prompt(persona, options)));
        messages.extend(
            session
                .recent(self.settings.history_window)
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        messages.push(ChatMessage::user(message));

        let request = ChatRequest {
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let reply = match self.client.complete(&request) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(ChatError::EmptyResponse) => {
                debug!("Empty reply for {}", session.animal);
                NO_ANSWER_REPLY.to_string()
            }
            Err(ChatError::Api(e)) => {
                warn!("Chat service error for {}: {}", session.animal, e);
                CONNECTION_TROUBLE_REPLY.to_string()
            }
            Err(e) => {
                warn!("Chat request failed for {}: {}", session.animal, e);
                TECHNICAL_TROUBLE_REPLY.to_string()
            }
        };

        session.messages.push(ChatMessage::user(message));
        session.messages.push(ChatMessage::assistant(reply.clone()));
        reply
    }
}
