// Step trace accumulator
//
// At most one record is open (`running`) at a time. Beginning a new step
// while one is still open closes the old one as an error first.

use crate::workflow::state::{StepName, StepRecord, StepStatus};
use chrono::Utc;
use serde_json::{Map, Value};
use std::fmt::Display;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct StepTrace {
    records: Vec<StepRecord>,
}

fn into_details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

impl StepTrace {
    /// Append a `running` record for `step`.
    pub fn begin(&mut self, step: StepName, action: impl Into<String>) {
        if self.is_open() {
            warn!(next = %step, "Step started while another was still running");
            self.close_open("step abandoned before completion");
        }

        self.records.push(StepRecord {
            step,
            action: action.into(),
            status: StepStatus::Running,
            result: String::new(),
            details: Map::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        });
    }

    /// Mark the open record completed. Returns false when nothing was open.
    pub fn complete(&mut self, result: impl Into<String>, details: Value) -> bool {
        match self.open_record() {
            Some(record) => {
                record.status = StepStatus::Completed;
                record.result = result.into();
                record.details.extend(into_details(details));
                record.finished_at = Some(Utc::now());
                true
            }
            None => {
                warn!("complete called with no running step");
                false
            }
        }
    }

    /// Mark the open record errored with the full error text.
    pub fn fail(&mut self, error: &dyn Display, result: impl Into<String>, details: Value) -> bool {
        match self.open_record() {
            Some(record) => {
                let message = error.to_string();
                record.status = StepStatus::Error;
                record.result = result.into();
                record.details.extend(into_details(details));
                record
                    .details
                    .insert("error".to_string(), Value::String(message.clone()));
                record.error = Some(message);
                record.finished_at = Some(Utc::now());
                true
            }
            None => {
                warn!(error = %error, "fail called with no running step");
                false
            }
        }
    }

    /// Record a stage that was visited but had nothing to do.
    pub fn skip(&mut self, step: StepName, result: impl Into<String>, details: Value) {
        self.begin(step, "Skipped");
        let mut details = into_details(details);
        details.insert("skipped".to_string(), Value::Bool(true));
        self.complete(result, Value::Object(details));
    }

    /// Close any record still running as an error.
    pub fn close_open(&mut self, reason: &str) {
        if let Some(record) = self.open_record() {
            record.status = StepStatus::Error;
            record.result = "Step did not finish".to_string();
            record.error = Some(reason.to_string());
            record.finished_at = Some(Utc::now());
        }
    }

    pub fn is_open(&self) -> bool {
        self.records
            .last()
            .map(|r| r.status == StepStatus::Running)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn into_records(mut self) -> Vec<StepRecord> {
        self.close_open("workflow ended with step still running");
        self.records
    }

    fn open_record(&mut self) -> Option<&mut StepRecord> {
        self.records
            .last_mut()
            .filter(|r| r.status == StepStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_begin_then_complete() {
        let mut trace = StepTrace::default();
        trace.begin(StepName::ClassifyIntent, "Classifying query");
        assert!(trace.is_open());
        assert_eq!(trace.last().unwrap().status, StepStatus::Running);

        assert!(trace.complete("Detected intent: plan", json!({"intent": "plan"})));
        let record = trace.last().unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.details["intent"], "plan");
        assert!(record.finished_at.is_some());
        assert!(!trace.is_open());
    }

    #[test]
    fn test_fail_records_error_detail() {
        let mut trace = StepTrace::default();
        trace.begin(StepName::WebSearch, "Searching");
        trace.fail(&"Search API key not configured", "Web search failed", json!({"query": "q"}));

        let record = trace.last().unwrap();
        assert_eq!(record.status, StepStatus::Error);
        assert_eq!(record.error.as_deref(), Some("Search API key not configured"));
        assert_eq!(record.details["error"], "Search API key not configured");
        assert_eq!(record.details["query"], "q");
    }

    #[test]
    fn test_only_one_open_record() {
        let mut trace = StepTrace::default();
        trace.begin(StepName::RetrieveContext, "Retrieving");
        trace.begin(StepName::CreatePlan, "Planning");

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.records()[0].status, StepStatus::Error);
        assert_eq!(trace.records()[1].status, StepStatus::Running);
        assert_eq!(
            trace.records().iter().filter(|r| r.status == StepStatus::Running).count(),
            1
        );
    }

    #[test]
    fn test_complete_without_open_step_is_ignored() {
        let mut trace = StepTrace::default();
        assert!(!trace.complete("nothing", Value::Null));
        assert!(trace.is_empty());

        trace.begin(StepName::ClassifyIntent, "Classifying");
        trace.complete("done", Value::Null);
        assert!(!trace.complete("again", Value::Null));
        assert_eq!(trace.last().unwrap().result, "done");
    }

    #[test]
    fn test_skip_is_completed_and_flagged() {
        let mut trace = StepTrace::default();
        trace.skip(StepName::CreatePlan, "Skipped - not a planning request", json!({"intent": "chat"}));

        let record = trace.last().unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert!(record.is_skipped());
        assert_eq!(record.details["intent"], "chat");
    }

    #[test]
    fn test_into_records_closes_open_step() {
        let mut trace = StepTrace::default();
        trace.begin(StepName::GenerateResponse, "Composing");
        let records = trace.into_records();
        assert_eq!(records[0].status, StepStatus::Error);
    }
}
