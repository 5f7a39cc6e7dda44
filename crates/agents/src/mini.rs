use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    rand::seq::IndexedRandom,
    tokio::sync::Mutex,
    tracing::{debug, info},
};

use {
    nexus_config::ChatConfig,
    nexus_protocol::{Event, TextPayload, topics},
};

use crate::{
    backend::{BackendError, ChatBackend, ChatRequest},
    intent::parse_home_intent,
    memory::ShortTermMemory,
    model::{LlmProvider, Role},
    prompt::build_messages,
    providers::OpenRouterProvider,
};

/// Event type of replies produced by this backend.
pub const MINI_OUTPUT: &str = "mesh.output";
pub const MINI_SOURCE: &str = "mesh:mini";

struct SessionState {
    identity: Option<String>,
    memory: ShortTermMemory,
}

/// The "mini" backend: home intents are answered directly, everything else
/// goes to the LLM with a per-session persona and short-term memory.
pub struct MiniBackend {
    provider: Option<Arc<dyn LlmProvider>>,
    system_prompt: String,
    secondary_prompt: String,
    memory_size: usize,
    identities: Vec<String>,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl MiniBackend {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &ChatConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            secondary_prompt: config.secondary_prompt.clone(),
            memory_size: config.memory_size,
            identities: config.identities.clone(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Build with the OpenRouter provider when an API key is configured.
    pub fn from_config(config: &ChatConfig) -> Self {
        let provider = OpenRouterProvider::from_config(config)
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>);
        match &provider {
            Some(p) => info!(provider = p.name(), model = p.id(), "mini backend ready"),
            None => info!("mini backend has no provider, chat will echo"),
        }
        Self::new(provider, config)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn reply(&self, request: &ChatRequest, topic: &str, payload: serde_json::Value) -> Event {
        Event::builder(MINI_OUTPUT, MINI_SOURCE, topic, payload)
            .session(request.session_id.as_deref())
            .corr_id(Some(&request.corr_id))
            .build()
    }
}

#[async_trait]
impl ChatBackend for MiniBackend {
    async fn handle(&self, request: &ChatRequest) -> Result<Vec<Event>, BackendError> {
        if let Some(cmd) = parse_home_intent(&request.text) {
            debug!(topic = ?cmd.topic, "home intent");
            let payload = serde_json::to_value(&cmd).unwrap_or_default();
            return Ok(vec![self.reply(request, topics::HOME_COMMAND, payload)]);
        }

        let provider = self.provider.as_ref().ok_or(BackendError::NotConfigured)?;
        let key = request.session_id.clone().unwrap_or_default();

        let messages = {
            let mut sessions = self.sessions.lock().await;
            let state = sessions.entry(key.clone()).or_insert_with(|| SessionState {
                identity: self.identities.choose(&mut rand::rng()).cloned(),
                memory: ShortTermMemory::new(self.memory_size),
            });
            build_messages(
                &self.system_prompt,
                state.identity.as_deref(),
                &self.secondary_prompt,
                &state.memory,
                &request.text,
            )
        };

        let reply = provider.complete(&messages).await?;

        if let Some(state) = self.sessions.lock().await.get_mut(&key) {
            state.memory.add(Role::User, request.text.clone());
            state.memory.add(Role::Assistant, reply.clone());
        }

        Ok(vec![self.reply(
            request,
            topics::CHAT_OUTPUT,
            TextPayload::new(reply).to_value(),
        )])
    }

    async fn end_session(&self, session_id: &str) {
        if self.sessions.lock().await.remove(session_id).is_some() {
            debug!(session_id, "dropped session memory");
        }
    }
}
