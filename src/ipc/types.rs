use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::ScholarshipResult;
use crate::scholarship::Evaluator;
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    pub evaluator: Box<dyn Evaluator>,
    /// Last evaluation outcome; in-memory only, gone on restart.
    pub last_evaluation: Option<ScholarshipResult>,
    /// Pinned "today" for deterministic day-of-month rules in tests.
    pub today_override: Option<NaiveDate>,
}

impl AppState {
    pub fn today(&self) -> NaiveDate {
        self.today_override
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
