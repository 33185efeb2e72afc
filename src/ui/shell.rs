use crate::ui::effects::{MessageIcon, PromptAnswer, Shell, UiEffect};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Headless shell: every effect becomes a log line and prompts are
/// dismissed, since nobody is there to answer them.
#[derive(Debug, Default)]
pub struct LoggingShell;

impl Shell for LoggingShell {
    fn apply(&mut self, effects: &[UiEffect]) {
        for effect in effects {
            match effect {
                UiEffect::TrayInfo { title, text } => tracing::info!("[tray] {}: {}", title, text),
                UiEffect::TrayError { title, text } => {
                    tracing::warn!("[tray] {}: {}", title, text)
                }
                UiEffect::ShowMessageBox(message) => match message.icon {
                    MessageIcon::Info => tracing::info!("[dialog] {}: {}", message.title, message.text),
                    MessageIcon::Warning | MessageIcon::Error => {
                        tracing::warn!("[dialog] {}: {}", message.title, message.text)
                    }
                },
                UiEffect::SetDetailConfig(config) => tracing::debug!(
                    "[detail] {} with {} peer(s)",
                    config.name,
                    config.peers.len()
                ),
                other => tracing::debug!("[ui] {:?}", other),
            }
        }
    }

    fn prompt(&mut self, title: &str, _text: &str) -> PromptAnswer {
        tracing::info!("[prompt] {} (dismissed, no user attached)", title);
        PromptAnswer::Dismissed
    }
}

#[derive(Debug, Default)]
struct Recording {
    batches: Vec<Vec<UiEffect>>,
    prompts: Vec<String>,
    answers: VecDeque<PromptAnswer>,
}

/// Shell that keeps every batch it receives. Clones share the recording so
/// a caller can inspect it after handing the shell to the UI context.
#[derive(Debug, Clone, Default)]
pub struct RecordingShell {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answer for the next prompt; unqueued prompts are dismissed.
    pub fn answer_next(&self, answer: PromptAnswer) {
        self.lock().answers.push_back(answer);
    }

    pub fn batches(&self) -> Vec<Vec<UiEffect>> {
        self.lock().batches.clone()
    }

    pub fn effects(&self) -> Vec<UiEffect> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    pub fn count(&self, predicate: impl Fn(&UiEffect) -> bool) -> usize {
        self.lock()
            .batches
            .iter()
            .flatten()
            .filter(|effect| predicate(effect))
            .count()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    pub fn clear(&self) {
        let mut recording = self.lock();
        recording.batches.clear();
        recording.prompts.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Shell for RecordingShell {
    fn apply(&mut self, effects: &[UiEffect]) {
        self.lock().batches.push(effects.to_vec());
    }

    fn prompt(&mut self, title: &str, _text: &str) -> PromptAnswer {
        let mut recording = self.lock();
        recording.prompts.push(title.to_string());
        recording
            .answers
            .pop_front()
            .unwrap_or(PromptAnswer::Dismissed)
    }
}
