//! Chat command handling shared by the Telegram and WhatsApp adapters.
//!
//! Each chat ("conversation") is bound to at most one current session. Plain
//! text goes to the simulated patient; slash commands manage the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::simulation::{SessionStore, StoreError, SummaryRecord};

/// A parsed chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Cases,
    Case(String),
    Diagnose(String),
    End,
    Status,
    Text(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };

        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (rest, ""),
        };
        // Telegram group commands arrive as /case@stetholink_bot
        let word = word.split('@').next().unwrap_or(word).to_lowercase();

        match word.as_str() {
            "start" | "help" => Self::Help,
            "cases" => Self::Cases,
            "case" => Self::Case(args.to_string()),
            "diagnose" | "diagnosis" => Self::Diagnose(args.to_string()),
            "end" | "giveup" => Self::End,
            "status" => Self::Status,
            _ => Self::Text(text.to_string()),
        }
    }
}

/// Routes chat messages to the session store.
pub struct BotHandler {
    store: Arc<dyn SessionStore>,
    /// Conversation key → current session id.
    conversations: Mutex<HashMap<String, String>>,
}

impl BotHandler {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    fn current_session(&self, conversation: &str) -> Option<String> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation)
            .cloned()
    }

    fn bind(&self, conversation: &str, session_id: &str) {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.to_string(), session_id.to_string());
    }

    fn unbind(&self, conversation: &str) {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conversation);
    }

    /// Handle one incoming message and produce the reply text.
    ///
    /// `conversation` identifies the chat, `subject` the student.
    pub fn handle(&self, conversation: &str, subject: &str, text: &str) -> String {
        match Command::parse(text) {
            Command::Help => self.help(),
            Command::Cases => self.case_list(),
            Command::Case(case_type) => self.start_case(conversation, subject, &case_type),
            Command::Diagnose(submission) => {
                if submission.is_empty() {
                    return "Tell me your diagnosis, e.g. /diagnose dengue fever".to_string();
                }
                self.conclude(conversation, &submission)
            }
            Command::End => self.conclude(conversation, ""),
            Command::Status => self.status(conversation),
            Command::Text(text) if text.is_empty() => self.help(),
            Command::Text(text) => self.ask(conversation, &text),
        }
    }

    fn help(&self) -> String {
        format!(
            "Welcome to StethoLink patient simulations.\n\n\
             /case <name> - start a case\n\
             /diagnose <diagnosis> - submit your diagnosis\n\
             /status - current score\n\
             /end - give up on the current case\n\n{}",
            self.case_list()
        )
    }

    fn case_list(&self) -> String {
        let lines: Vec<String> = self
            .store
            .catalog()
            .list()
            .into_iter()
            .map(|case| format!("• {} - {}: {}", case.case_type, case.title, case.summary))
            .collect();
        format!("Available cases:\n{}", lines.join("\n"))
    }

    fn start_case(&self, conversation: &str, subject: &str, case_type: &str) -> String {
        if case_type.is_empty() {
            return format!("Which case? Use /case <name>.\n\n{}", self.case_list());
        }

        match self.store.create(subject, case_type) {
            Ok(session) => {
                let abandoned = self.abandon_current(conversation);
                self.bind(conversation, &session.id);
                info!("💬 {} started {} via chat", subject, session.case_type);
                let case = self.store.catalog().get(&session.case_type);
                let opening = match case {
                    Some(case) => format!(
                        "🩺 {}\n{}\n\nPatient: {}",
                        case.fixture().title,
                        case.fixture().summary,
                        case.fixture().initial_prompt
                    ),
                    None => "Case started.".to_string(),
                };
                match abandoned {
                    Some(previous) => format!("(Ended your previous {previous} case.)\n\n{opening}"),
                    None => opening,
                }
            }
            Err(StoreError::UnknownCase(_)) => {
                format!("I don't know the case \"{case_type}\".\n\n{}", self.case_list())
            }
            Err(e) => {
                warn!("Failed to start case for {}: {}", subject, e);
                "Couldn't start that case, please try again.".to_string()
            }
        }
    }

    /// Give up on the chat's current session, if it is still running.
    /// Returns the abandoned case type.
    fn abandon_current(&self, conversation: &str) -> Option<String> {
        let session_id = self.current_session(conversation)?;
        self.unbind(conversation);
        match self.store.conclude(&session_id, "") {
            Ok(record) => Some(record.case_type),
            Err(e) => {
                debug!("Previous session {} not concluded: {}", session_id, e);
                None
            }
        }
    }

    /// Forget conversations whose session no longer exists in the store.
    pub fn prune_stale(&self) -> usize {
        let mut conversations = self.conversations.lock().unwrap_or_else(PoisonError::into_inner);
        let before = conversations.len();
        conversations.retain(|_, session_id| self.store.get(session_id).is_ok());
        before - conversations.len()
    }

    fn ask(&self, conversation: &str, text: &str) -> String {
        let Some(session_id) = self.current_session(conversation) else {
            return format!("Pick a case first with /case <name>.\n\n{}", self.case_list());
        };

        match self.store.interact(&session_id, text) {
            Ok(exchange) => format!("Patient: {}", exchange.response),
            Err(e) => self.session_error(conversation, e),
        }
    }

    fn conclude(&self, conversation: &str, submission: &str) -> String {
        let Some(session_id) = self.current_session(conversation) else {
            return "There's no case in progress. Start one with /case <name>.".to_string();
        };

        let result = self.store.conclude(&session_id, submission);
        match result {
            Ok(record) => {
                self.unbind(conversation);
                format_summary(&record)
            }
            Err(e) => self.session_error(conversation, e),
        }
    }

    fn status(&self, conversation: &str) -> String {
        let Some(session_id) = self.current_session(conversation) else {
            return "There's no case in progress. Start one with /case <name>.".to_string();
        };

        match self.store.get(&session_id) {
            Ok(session) => format!(
                "Case: {}\nScore: {}\nQuestions asked: {}\nTranscript entries: {}",
                session.case_type,
                session.score,
                session.transcript.len() / 2,
                session.transcript.len()
            ),
            Err(e) => self.session_error(conversation, e),
        }
    }

    fn session_error(&self, conversation: &str, err: StoreError) -> String {
        self.unbind(conversation);
        match err {
            StoreError::NotFound(_) => {
                "That case has expired. Start a new one with /case <name>.".to_string()
            }
            StoreError::InvalidState(_) => {
                "That case is already finished. Start a new one with /case <name>.".to_string()
            }
            StoreError::UnknownCase(case_type) => {
                format!("The case \"{case_type}\" is no longer available.")
            }
        }
    }
}

/// Periodically drop conversation bindings to evicted sessions.
pub fn spawn_pruner(handler: Arc<BotHandler>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let pruned = handler.prune_stale();
            if pruned > 0 {
                debug!("Dropped {} stale conversation binding(s)", pruned);
            }
        }
    })
}

pub fn format_summary(record: &SummaryRecord) -> String {
    let verdict = if record.correctness {
        "✅ Correct!".to_string()
    } else if record.submission.is_empty() {
        "Case ended without a diagnosis.".to_string()
    } else {
        format!("❌ Not quite. You said \"{}\".", record.submission)
    };
    format!(
        "{}\nExpected diagnosis: {}\nScore: {}\nTranscript entries: {}\nTime taken: {}m {}s",
        verdict,
        record.expected_diagnosis,
        record.final_score,
        record.transcript_length,
        record.elapsed_seconds / 60,
        record.elapsed_seconds % 60
    )
}
