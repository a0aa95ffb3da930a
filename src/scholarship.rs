use crate::calc::attendance_tally;
use crate::model::AcademyData;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-3-flash-preview";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Justification used whenever the external evaluation is unavailable.
pub const FALLBACK_JUSTIFICATION: &str =
    "Awarded on attendance records alone; the evaluation service could not be reached.";

/// Per-student stats handed to the evaluator for the current month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub presents: usize,
    pub lates: usize,
    pub absents: usize,
    pub payment_punctuality: String,
    pub active: bool,
}

pub fn build_summaries(data: &AcademyData, today: NaiveDate) -> Vec<StudentSummary> {
    let month = today.month();
    let year = today.year();
    data.students
        .iter()
        .map(|s| {
            let tally = attendance_tally(data, &s.id);
            let payment_punctuality = match data.payment_for(&s.id, month, year) {
                Some(p) if p.surcharge == 0.0 => "on time (week 1)".to_string(),
                Some(p) => format!("late (surcharge +{})", p.surcharge),
                None => "unpaid".to_string(),
            };
            StudentSummary {
                id: s.id.clone(),
                name: s.display_name(),
                presents: tally.presents,
                lates: tally.lates,
                absents: tally.absents,
                payment_punctuality,
                active: s.active,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winners {
    pub first_place_id: String,
    pub second_place_id: String,
    pub justification: String,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluation api key is not configured")]
    MissingApiKey,
    #[error("evaluation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("evaluation reply was not usable: {0}")]
    BadReply(String),
    #[error("need at least two students to evaluate")]
    RosterTooSmall,
}

/// Capability interface for picking the month's two winners. The
/// external model and the local heuristic are interchangeable behind it.
pub trait Evaluator {
    fn evaluate(&self, month_name: &str, summaries: &[StudentSummary]) -> Result<Winners, EvalError>;
}

/// Backend that asks a generative model for a structured verdict.
pub struct GeminiEvaluator {
    api_key: Option<String>,
    http: reqwest::blocking::Client,
}

impl GeminiEvaluator {
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { api_key, http }
    }

    fn prompt(month_name: &str, summaries: &[StudentSummary]) -> String {
        format!(
            "As the director of a dance academy, decide who earns this month's scholarships.\n\
             \n\
             Priority criteria:\n\
             1. Perfect attendance (10 pts per class attended).\n\
             2. Punctuality in class (5 pts).\n\
             3. Payment punctuality (vital):\n\
                - paid in week 1: +20 extra points\n\
                - paid in week 2: +5 points\n\
                - paid in week 3 or later: 0 points\n\
             \n\
             Stats for {}:\n\
             {}\n\
             \n\
             Pick the first place (full scholarship) and second place (half scholarship).\n\
             Write a short, motivating justification for the winners.",
            month_name,
            serde_json::to_string_pretty(summaries).unwrap_or_else(|_| "[]".to_string())
        )
    }
}

impl Evaluator for GeminiEvaluator {
    fn evaluate(&self, month_name: &str, summaries: &[StudentSummary]) -> Result<Winners, EvalError> {
        let key = self.api_key.as_deref().ok_or(EvalError::MissingApiKey)?;
        let url = format!("{}/{}:generateContent?key={}", GEMINI_ENDPOINT, GEMINI_MODEL, key);
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(month_name, summaries) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "firstPlaceId": { "type": "STRING" },
                        "secondPlaceId": { "type": "STRING" },
                        "justification": { "type": "STRING" }
                    },
                    "required": ["firstPlaceId", "secondPlaceId", "justification"]
                }
            }
        });

        let reply: serde_json::Value = self
            .http
            .post(&url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        let text = reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EvalError::BadReply("reply carries no candidate text".to_string()))?;
        serde_json::from_str(text).map_err(|e| EvalError::BadReply(e.to_string()))
    }
}

/// Deterministic stand-in: top two by presence count, stable on ties.
pub fn fallback_winners(summaries: &[StudentSummary]) -> Result<Winners, EvalError> {
    if summaries.len() < 2 {
        return Err(EvalError::RosterTooSmall);
    }
    let mut by_presence: Vec<&StudentSummary> = summaries.iter().collect();
    by_presence.sort_by(|a, b| b.presents.cmp(&a.presents));
    Ok(Winners {
        first_place_id: by_presence[0].id.clone(),
        second_place_id: by_presence[1].id.clone(),
        justification: FALLBACK_JUSTIFICATION.to_string(),
    })
}

/// Runs the evaluator once and degrades to the heuristic on any failure.
/// Replies naming students outside the roster, or the same student
/// twice, count as failures. Returns the winners and whether the
/// fallback produced them.
pub fn evaluate_with_fallback(
    evaluator: &dyn Evaluator,
    month_name: &str,
    summaries: &[StudentSummary],
) -> Result<(Winners, bool), EvalError> {
    if summaries.len() < 2 {
        return Err(EvalError::RosterTooSmall);
    }
    match evaluator.evaluate(month_name, summaries) {
        Ok(winners) => {
            let known = |id: &str| summaries.iter().any(|s| s.id == id);
            if known(&winners.first_place_id)
                && known(&winners.second_place_id)
                && winners.first_place_id != winners.second_place_id
            {
                Ok((winners, false))
            } else {
                warn!("evaluation reply named students outside the roster; using presence fallback");
                fallback_winners(summaries).map(|w| (w, true))
            }
        }
        Err(e) => {
            warn!(error = %e, "scholarship evaluation failed; using presence fallback");
            fallback_winners(summaries).map(|w| (w, true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceRecord, AttendanceStatus, PaymentRecord, PaymentStatus, Student};

    struct FixedEvaluator(Result<Winners, &'static str>);

    impl Evaluator for FixedEvaluator {
        fn evaluate(&self, _month: &str, _summaries: &[StudentSummary]) -> Result<Winners, EvalError> {
            match &self.0 {
                Ok(w) => Ok(w.clone()),
                Err(msg) => Err(EvalError::BadReply(msg.to_string())),
            }
        }
    }

    fn summary(id: &str, presents: usize) -> StudentSummary {
        StudentSummary {
            id: id.to_string(),
            name: format!("Student {}", id),
            presents,
            lates: 0,
            absents: 0,
            payment_punctuality: "unpaid".to_string(),
            active: true,
        }
    }

    fn winners(first: &str, second: &str) -> Winners {
        Winners {
            first_place_id: first.to_string(),
            second_place_id: second.to_string(),
            justification: "model verdict".to_string(),
        }
    }

    #[test]
    fn build_summaries_labels_payment_punctuality() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("date");
        let mut data = AcademyData::default();
        for id in ["a", "b", "c"] {
            data.students.push(Student {
                id: id.to_string(),
                first_name: id.to_uppercase(),
                last_name: "Doe".to_string(),
                phone: "555-0100".to_string(),
                dob: "2010-01-01".to_string(),
                monthly_fee: 400.0,
                registration_date: "2026-01-01".to_string(),
                conditions: String::new(),
                active: true,
            });
        }
        data.attendance.push(AttendanceRecord {
            student_id: "a".to_string(),
            date: "2026-03-02".to_string(),
            status: AttendanceStatus::Present,
        });
        data.payments.push(PaymentRecord {
            student_id: "a".to_string(),
            month: 3,
            year: 2026,
            payment_date: None,
            base_amount: 400.0,
            surcharge: 0.0,
            total_paid: 400.0,
            status: PaymentStatus::Paid,
        });
        data.payments.push(PaymentRecord {
            student_id: "b".to_string(),
            month: 3,
            year: 2026,
            payment_date: None,
            base_amount: 400.0,
            surcharge: 30.0,
            total_paid: 430.0,
            status: PaymentStatus::Paid,
        });

        let summaries = build_summaries(&data, today);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].payment_punctuality, "on time (week 1)");
        assert_eq!(summaries[0].presents, 1);
        assert_eq!(summaries[1].payment_punctuality, "late (surcharge +30)");
        assert_eq!(summaries[2].payment_punctuality, "unpaid");
    }

    #[test]
    fn accepts_a_valid_model_verdict() {
        let summaries = vec![summary("a", 1), summary("b", 5)];
        let evaluator = FixedEvaluator(Ok(winners("a", "b")));
        let (w, used_fallback) =
            evaluate_with_fallback(&evaluator, "March", &summaries).expect("winners");
        assert!(!used_fallback);
        assert_eq!(w.first_place_id, "a");
        assert_eq!(w.justification, "model verdict");
    }

    #[test]
    fn falls_back_when_the_evaluator_fails() {
        let summaries = vec![summary("a", 1), summary("b", 5), summary("c", 3)];
        let evaluator = FixedEvaluator(Err("boom"));
        let (w, used_fallback) =
            evaluate_with_fallback(&evaluator, "March", &summaries).expect("winners");
        assert!(used_fallback);
        assert_eq!(w.first_place_id, "b");
        assert_eq!(w.second_place_id, "c");
        assert_eq!(w.justification, FALLBACK_JUSTIFICATION);
    }

    #[test]
    fn falls_back_when_the_verdict_names_an_unknown_student() {
        let summaries = vec![summary("a", 2), summary("b", 1)];
        let evaluator = FixedEvaluator(Ok(winners("a", "ghost")));
        let (w, used_fallback) =
            evaluate_with_fallback(&evaluator, "March", &summaries).expect("winners");
        assert!(used_fallback);
        assert_eq!(w.first_place_id, "a");
        assert_eq!(w.second_place_id, "b");
    }

    #[test]
    fn falls_back_when_the_verdict_repeats_a_student() {
        let summaries = vec![summary("a", 2), summary("b", 1)];
        let evaluator = FixedEvaluator(Ok(winners("a", "a")));
        let (_, used_fallback) =
            evaluate_with_fallback(&evaluator, "March", &summaries).expect("winners");
        assert!(used_fallback);
    }

    #[test]
    fn fallback_presence_ties_keep_roster_order() {
        let summaries = vec![summary("a", 3), summary("b", 3), summary("c", 3)];
        let w = fallback_winners(&summaries).expect("winners");
        assert_eq!(w.first_place_id, "a");
        assert_eq!(w.second_place_id, "b");
    }

    #[test]
    fn under_two_students_is_an_error_not_a_fallback() {
        let summaries = vec![summary("a", 3)];
        let evaluator = FixedEvaluator(Err("boom"));
        assert!(matches!(
            evaluate_with_fallback(&evaluator, "March", &summaries),
            Err(EvalError::RosterTooSmall)
        ));
    }

    #[test]
    fn missing_api_key_fails_before_any_network_io() {
        let evaluator = GeminiEvaluator {
            api_key: None,
            http: reqwest::blocking::Client::new(),
        };
        let summaries = vec![summary("a", 1), summary("b", 2)];
        assert!(matches!(
            evaluator.evaluate("March", &summaries),
            Err(EvalError::MissingApiKey)
        ));
    }
}
