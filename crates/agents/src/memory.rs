use std::collections::VecDeque;

use crate::model::{ChatMessage, Role};

/// Bounded window over the most recent messages of one conversation.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    size: usize,
    buffer: VecDeque<ChatMessage>,
}

impl ShortTermMemory {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buffer: VecDeque::with_capacity(size),
        }
    }

    /// Append a message, evicting the oldest once full.
    pub fn add(&mut self, role: Role, content: impl Into<String>) {
        if self.size == 0 {
            return;
        }
        if self.buffer.len() == self.size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(ChatMessage::new(role, content));
    }

    pub fn recent(&self) -> impl Iterator<Item = &ChatMessage> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
