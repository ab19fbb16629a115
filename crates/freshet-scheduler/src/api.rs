//! Typed submission contract between the request gateway and the scheduler.
//!
//! The gateway authenticates callers; the scheduler only carries the
//! session credential through. Paradigm names on the wire are the
//! screaming-snake forms (`FILL_NODES`, `ROUND_ROBIN`, `SINGLE_NODE`).

use serde::{Deserialize, Serialize};

use freshet_state::{Allocation, AllocationParadigm, JobState, ModelRequest};

/// A model-run submission as received from the request gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitRequest {
    pub cpu_count: u32,
    pub allocation_paradigm: AllocationParadigm,
    pub hydrofabric_id: String,
    pub forcings_id: String,
    pub realization_config_id: String,
    #[serde(default)]
    pub partition_config_id: Option<String>,
    /// Session credential, passed through untouched (auth lives in the
    /// gateway).
    pub session_secret: String,
}

impl SubmitRequest {
    /// The scheduler-internal request, credential stripped.
    pub fn into_model_request(self) -> ModelRequest {
        ModelRequest {
            cpu_count: self.cpu_count,
            paradigm: self.allocation_paradigm,
            hydrofabric_id: self.hydrofabric_id,
            forcings_id: self.forcings_id,
            realization_config_id: self.realization_config_id,
            partition_config_id: self.partition_config_id,
        }
    }
}

/// Response to a submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitResponse {
    pub success: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data_id: Option<String>,
}

impl SubmitResponse {
    /// An accepted submission: the job is queued and its output dataset
    /// id is fixed up front.
    pub fn accepted(job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        let output_data_id = format!("{job_id}-output");
        Self {
            success: true,
            reason: "job queued".to_string(),
            message: None,
            job_id: Some(job_id),
            output_data_id: Some(output_data_id),
        }
    }

    pub fn denied(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            message: Some(message.into()),
            job_id: None,
            output_data_id: None,
        }
    }
}

/// Point-in-time view of a job, as returned by `GetStatus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub allocations: Vec<Allocation>,
    pub exit_code: Option<i32>,
    pub failure_reason: Option<String>,
}
