use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Task as returned by the service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(alias = "name")]
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Body for POST /tasks and PUT /tasks/{id}
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskRequest {
    pub title: String,
    pub description: Option<String>,
}

// Error payload sent with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

// Body for POST /tasks/{id}/logs and PUT /logs/{id}
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRequest {
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub memo: Option<String>,
}

// Time log attached to a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: String,
    pub task_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub duration_min: Option<i64>,
    pub memo: Option<String>,
}
