//! Job Store (C3): typed wrapper over the job repository enforcing the
//! status DAG, monotonic progress, and terminal-state immutability (§3,
//! §4.3). Invariant violations are programmer errors, not caller errors,
//! and surface as `PipelineError::Invariant` (→ `internal`, §7).

use sqlx::SqlitePool;

use crate::data::sqlite::repositories::job as job_repo;
use crate::domain::error::PipelineError;

/// Closed set of job kinds (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    AssistantResponse,
    ChartBuild,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssistantResponse => "assistant_response",
            Self::ChartBuild => "chart_build",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assistant_response" => Some(Self::AssistantResponse),
            "chart_build" => Some(Self::ChartBuild),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Started,
    Progress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "started" => Some(Self::Started),
            "progress" => Some(Self::Progress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Edges of the status DAG (§4.3): queued→started→progress→completed|failed,
    /// plus progress→progress for repeated updates during a long-running job.
    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Started)
                | (Self::Started, Self::Progress)
                | (Self::Started, Self::Completed)
                | (Self::Started, Self::Failed)
                | (Self::Progress, Self::Progress)
                | (Self::Progress, Self::Completed)
                | (Self::Progress, Self::Failed)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub conversation_id: Option<String>,
    pub parameters: serde_json::Value,
    pub status: JobStatus,
    pub progress: i64,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    fn from_row(row: job_repo::JobRow) -> Result<Self, PipelineError> {
        let job_type = JobType::parse(&row.job_type)
            .ok_or_else(|| PipelineError::Invariant(format!("unknown job type {}", row.job_type)))?;
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| PipelineError::Invariant(format!("unknown job status {}", row.status)))?;
        let parameters = serde_json::from_str(&row.parameters)
            .map_err(|e| PipelineError::Invariant(format!("malformed job parameters: {e}")))?;
        let result = row
            .result
            .map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(|e| PipelineError::Invariant(format!("malformed job result: {e}")))?;

        Ok(Self {
            id: row.id,
            job_type,
            conversation_id: row.conversation_id,
            parameters,
            status,
            progress: row.progress,
            result,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Orchestrates job lifecycle transitions over the SQLite repository.
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: &str,
        job_type: JobType,
        conversation_id: Option<&str>,
        parameters: &serde_json::Value,
    ) -> Result<Job, PipelineError> {
        let row = job_repo::create_job(
            &self.pool,
            id,
            job_type.as_str(),
            conversation_id,
            &parameters.to_string(),
        )
        .await?;
        Job::from_row(row)
    }

    pub async fn get(&self, id: &str) -> Result<Job, PipelineError> {
        let row = job_repo::get_job(&self.pool, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("job {id}")))?;
        Job::from_row(row)
    }

    /// Advance a job to `started`/`progress`, enforcing the status DAG and
    /// monotonic progress.
    pub async fn advance(&self, id: &str, status: JobStatus, progress: i64) -> Result<(), PipelineError> {
        let current = self.get(id).await?;

        if current.status.is_terminal() {
            return Err(PipelineError::Invariant(format!(
                "job {id} is already terminal ({}), cannot advance to {}",
                current.status.as_str(),
                status.as_str()
            )));
        }
        if !current.status.can_advance_to(status) {
            return Err(PipelineError::Invariant(format!(
                "job {id} cannot advance from {} to {}",
                current.status.as_str(),
                status.as_str()
            )));
        }
        if !(0..=100).contains(&progress) {
            return Err(PipelineError::Invariant(format!(
                "progress {progress} out of range 0..=100"
            )));
        }
        if progress < current.progress {
            return Err(PipelineError::Invariant(format!(
                "job {id} progress must be monotonic: {progress} < {}",
                current.progress
            )));
        }
        if progress == 100 && status != JobStatus::Completed {
            return Err(PipelineError::Invariant(format!(
                "job {id} cannot reach progress=100 without status=completed (got {})",
                status.as_str()
            )));
        }

        job_repo::update_job_progress(&self.pool, id, status.as_str(), progress).await?;
        Ok(())
    }

    /// Move a job to `completed`, setting its result exactly once.
    pub async fn complete(&self, id: &str, result: &serde_json::Value) -> Result<(), PipelineError> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(PipelineError::Invariant(format!("job {id} is already terminal")));
        }
        job_repo::complete_job(&self.pool, id, &result.to_string()).await?;
        Ok(())
    }

    /// Move a job to `failed`, setting its error exactly once.
    pub async fn fail(&self, id: &str, error: &str) -> Result<(), PipelineError> {
        let current = self.get(id).await?;
        if current.status.is_terminal() {
            return Err(PipelineError::Invariant(format!("job {id} is already terminal")));
        }
        job_repo::fail_job(&self.pool, id, error).await?;
        Ok(())
    }

    pub async fn list_for_conversation(&self, conversation_id: &str) -> Result<Vec<Job>, PipelineError> {
        let rows = job_repo::list_jobs_for_conversation(&self.pool, conversation_id).await?;
        rows.into_iter().map(Job::from_row).collect()
    }
}
