use iat_core::ResponseRecord;
use serde::{Deserialize, Serialize};

/// Append-only record of accepted answers, in trial completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseLog {
    records: Vec<ResponseRecord>,
}

impl ResponseLog {
    pub(crate) fn append(&mut self, record: ResponseRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<ResponseRecord> {
        self.records
    }
}

/// Everything handed to the submission collaborator when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRun {
    pub experiment: u32,
    pub participant: String,
    /// Display timestamp of the first stimulus.
    pub begin_time_ms: u64,
    /// Whether auto-balance swapped the block order for this run.
    pub counterbalanced: bool,
    pub responses: ResponseLog,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stimulus: u32, rt: u64) -> ResponseRecord {
        ResponseRecord {
            stimulus,
            response: 37,
            response_time_ms: rt,
            time_shown_ms: 0,
        }
    }

    #[test]
    fn appends_keep_completion_order() {
        let mut log = ResponseLog::default();
        log.append(record(3, 410));
        log.append(record(1, 520));
        log.append(record(3, 390));
        let order: Vec<u32> = log.iter().map(|r| r.stimulus).collect();
        assert_eq!(order, vec![3, 1, 3]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn log_serializes_as_plain_array() {
        let mut log = ResponseLog::default();
        log.append(record(5, 612));
        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["response_time_ms"], 612);
    }
}
