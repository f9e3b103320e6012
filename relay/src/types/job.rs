use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of sync work a job requests.
///
/// Reconciliation jobs exist for aggressive replays after a cursor reset;
/// the orchestrator currently runs them through the same path as standard
/// jobs since the reset handling already restarts from an empty cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobType {
    Standard,
    Reconciliation,
}

/// Ephemeral work unit carried by the job queue.
///
/// Jobs are destroyed on dequeue and never persisted beyond the queue.
/// Duplicates are expected; the per-item lock and the cursor protocol make
/// re-processing safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub item_id: Uuid,
    pub job_type: SyncJobType,
    /// Opaque correlation id threaded through log output.
    pub trace_id: String,
}

impl SyncJob {
    /// Creates a standard sync job with a freshly minted trace id.
    pub fn standard(item_id: Uuid) -> Self {
        SyncJob {
            item_id,
            job_type: SyncJobType::Standard,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a reconciliation job with a freshly minted trace id.
    pub fn reconciliation(item_id: Uuid) -> Self {
        SyncJob {
            item_id,
            job_type: SyncJobType::Reconciliation,
            trace_id: Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_payload_roundtrip() {
        let job = SyncJob::standard(Uuid::new_v4());

        let payload = serde_json::to_string(&job).unwrap();
        assert!(payload.contains("\"job_type\":\"standard\""));

        let decoded: SyncJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.item_id, job.item_id);
        assert_eq!(decoded.job_type, SyncJobType::Standard);
        assert_eq!(decoded.trace_id, job.trace_id);
    }
}
