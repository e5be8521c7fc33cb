//! Session records tracked by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// The student asking questions.
    Requester,
    /// The scripted patient.
    Respondent,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requester => write!(f, "requester"),
            Self::Respondent => write!(f, "respondent"),
        }
    }
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requester" => Ok(Self::Requester),
            "respondent" => Ok(Self::Respondent),
            other => Err(format!("unknown actor '{other}' (expected requester or respondent)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Concluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub actor: Actor,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of concluding a session. Computed once and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub session_id: String,
    pub case_type: String,
    pub submission: String,
    pub expected_diagnosis: String,
    pub correctness: bool,
    pub final_score: u32,
    pub transcript_length: usize,
    pub elapsed_seconds: i64,
    pub concluded_at: DateTime<Utc>,
}

/// One tracked interaction between a student and a case fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub subject_id: String,
    pub case_type: String,
    /// Append-only while the session is active.
    pub transcript: Vec<TranscriptEntry>,
    /// Rule keys already triggered in this session.
    pub asked_prompts: BTreeSet<String>,
    pub score: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub summary: Option<SummaryRecord>,
}

/// Snapshot row used by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub subject_id: String,
    pub case_type: String,
    pub title: String,
    pub score: u32,
    pub transcript_length: usize,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(subject_id: &str, case_type: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            case_type: case_type.to_string(),
            transcript: Vec::new(),
            asked_prompts: BTreeSet::new(),
            score: 0,
            status: SessionStatus::Active,
            created_at: now,
            last_activity: now,
            summary: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Append one entry and bump the activity clock.
    pub(crate) fn record(&mut self, actor: Actor, text: &str) {
        let now = Utc::now();
        self.transcript.push(TranscriptEntry {
            actor,
            text: text.to_string(),
            timestamp: now,
        });
        self.last_activity = now;
    }

    pub fn summarize(&self, title: &str) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            subject_id: self.subject_id.clone(),
            case_type: self.case_type.clone(),
            title: title.to_string(),
            score: self.score,
            transcript_length: self.transcript.len(),
            status: self.status,
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active_and_empty() {
        let session = Session::new("student_1", "dengue");
        assert!(session.is_active());
        assert!(session.transcript.is_empty());
        assert_eq!(session.score, 0);
        assert!(session.summary.is_none());
        assert_eq!(session.created_at, session.last_activity);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Session::new("s", "dengue");
        let b = Session::new("s", "dengue");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_appends_in_order() {
        let mut session = Session::new("s", "dengue");
        session.record(Actor::Requester, "first");
        session.record(Actor::Respondent, "second");

        assert_eq!(session.transcript.len(), 2);
        assert_eq!(session.transcript[0].actor, Actor::Requester);
        assert_eq!(session.transcript[0].text, "first");
        assert_eq!(session.transcript[1].actor, Actor::Respondent);
        assert!(session.last_activity >= session.created_at);
    }

    #[test]
    fn test_actor_parse() {
        assert_eq!("requester".parse::<Actor>().unwrap(), Actor::Requester);
        assert_eq!(" Respondent ".parse::<Actor>().unwrap(), Actor::Respondent);
        assert!("doctor".parse::<Actor>().is_err());
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let session = Session::new("student_1", "dengue");
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["subjectId"], "student_1");
        assert_eq!(json["caseType"], "dengue");
        assert_eq!(json["status"], "active");
        assert!(json["askedPrompts"].as_array().unwrap().is_empty());
    }
}
