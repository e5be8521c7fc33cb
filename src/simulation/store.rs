//! Session store: the in-process map from session id to session record.
//!
//! Handlers and bots receive the store as an `Arc<dyn SessionStore>` instead
//! of reaching for a global. Every operation takes the map lock exactly once,
//! so each operation is atomic with respect to the others.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::simulation::fixture::{Case, CaseCatalog};
use crate::simulation::session::{Actor, Session, SessionStatus, SessionSummary, SummaryRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session {0} is already concluded")]
    InvalidState(String),
    #[error("unknown case type: {0}")]
    UnknownCase(String),
}

/// Outcome of one question/answer round.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: String,
    pub score: u32,
    pub session: Session,
}

pub trait SessionStore: Send + Sync {
    fn catalog(&self) -> &CaseCatalog;

    /// Start a fresh active session for `case_type`.
    fn create(&self, subject_id: &str, case_type: &str) -> Result<Session, StoreError>;

    fn get(&self, id: &str) -> Result<Session, StoreError>;

    /// Append exactly one transcript entry.
    ///
    /// Requester entries add the case's fixed score increment and mark the
    /// matched rule as asked. Respondent entries never touch the score.
    fn append_interaction(&self, id: &str, actor: Actor, text: &str) -> Result<Session, StoreError>;

    /// Record a question, pick the canned answer and record it too.
    fn interact(&self, id: &str, text: &str) -> Result<Exchange, StoreError>;

    fn conclude(&self, id: &str, submission: &str) -> Result<SummaryRecord, StoreError>;

    /// Snapshot of a subject's active sessions, oldest first.
    fn list_active(&self, subject_id: &str) -> Vec<SessionSummary>;

    /// Drop sessions idle for longer than `ttl`. Returns how many went.
    fn reap_expired(&self, ttl: Duration) -> usize;

    fn session_count(&self) -> usize;
}

/// Mutex-guarded `HashMap` implementation of [`SessionStore`].
pub struct InMemorySessionStore {
    catalog: Arc<CaseCatalog>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new(catalog: Arc<CaseCatalog>) -> Self {
        Self {
            catalog,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against an active session and its case under the map lock.
    fn with_active<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session, &Case) -> T,
    ) -> Result<T, StoreError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if session.status == SessionStatus::Concluded {
            return Err(StoreError::InvalidState(id.to_string()));
        }
        let case = self
            .catalog
            .get(&session.case_type)
            .ok_or_else(|| StoreError::UnknownCase(session.case_type.clone()))?;
        Ok(f(session, case))
    }

    /// Drop every session whose last activity is before `cutoff`.
    pub fn reap_idle_since(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.last_activity >= cutoff);
        before - sessions.len()
    }
}

fn record_question(session: &mut Session, case: &Case, text: &str) {
    // Increments come from fixture files; cap instead of overflowing
    let score = session.score.saturating_add(case.fixture().score_increment);
    session.record(Actor::Requester, text);
    session.score = score;
    if let Some(rule) = case.matching_rule(text) {
        session.asked_prompts.insert(rule.key.clone());
    }
}

impl SessionStore for InMemorySessionStore {
    fn catalog(&self) -> &CaseCatalog {
        &self.catalog
    }

    fn create(&self, subject_id: &str, case_type: &str) -> Result<Session, StoreError> {
        let case = self
            .catalog
            .get(case_type)
            .ok_or_else(|| StoreError::UnknownCase(case_type.to_string()))?;

        // Store the catalog's spelling so later lookups are exact
        let session = Session::new(subject_id, &case.fixture().case_type);
        let mut sessions = self.lock();
        sessions.insert(session.id.clone(), session.clone());

        info!(
            "🩺 Session {} started: subject={} case={} ({} tracked)",
            session.id,
            subject_id,
            session.case_type,
            sessions.len()
        );
        Ok(session)
    }

    fn get(&self, id: &str) -> Result<Session, StoreError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn append_interaction(&self, id: &str, actor: Actor, text: &str) -> Result<Session, StoreError> {
        self.with_active(id, |session, case| {
            match actor {
                Actor::Requester => record_question(session, case, text),
                Actor::Respondent => session.record(Actor::Respondent, text),
            }
            debug!("Session {}: {} entry appended, score={}", session.id, actor, session.score);
            session.clone()
        })
    }

    fn interact(&self, id: &str, text: &str) -> Result<Exchange, StoreError> {
        self.with_active(id, |session, case| {
            // Pick the answer before this question marks its rule as asked
            let response = case.reply(text, &session.asked_prompts).text.to_string();
            record_question(session, case, text);
            session.record(Actor::Respondent, &response);
            debug!(
                "Session {}: exchange #{}, score={}",
                session.id,
                session.transcript.len() / 2,
                session.score
            );
            Exchange {
                response,
                score: session.score,
                session: session.clone(),
            }
        })
    }

    fn conclude(&self, id: &str, submission: &str) -> Result<SummaryRecord, StoreError> {
        self.with_active(id, |session, case| {
            let now = Utc::now();
            let record = SummaryRecord {
                session_id: session.id.clone(),
                case_type: session.case_type.clone(),
                submission: submission.trim().to_string(),
                expected_diagnosis: case.fixture().expected_diagnosis.clone(),
                correctness: case.is_correct(submission),
                final_score: session.score,
                transcript_length: session.transcript.len(),
                elapsed_seconds: (now - session.created_at).num_seconds(),
                concluded_at: now,
            };
            session.status = SessionStatus::Concluded;
            session.last_activity = now;
            session.summary = Some(record.clone());

            info!(
                "🏁 Session {} concluded: correct={} score={} turns={}",
                session.id, record.correctness, record.final_score, record.transcript_length
            );
            record
        })
    }

    fn list_active(&self, subject_id: &str) -> Vec<SessionSummary> {
        let sessions = self.lock();
        let mut active: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| s.subject_id == subject_id && s.is_active())
            .map(|s| {
                let title = self
                    .catalog
                    .get(&s.case_type)
                    .map(|case| case.fixture().title.as_str())
                    .unwrap_or_default();
                s.summarize(title)
            })
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.session_id.cmp(&b.session_id)));
        active
    }

    fn reap_expired(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.reap_idle_since(cutoff)
    }

    fn session_count(&self) -> usize {
        self.lock().len()
    }
}
