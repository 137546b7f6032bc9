use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle of one device's effort to install one firmware release.
///
/// Transitions move forward through the declared order; any non-terminal
/// state may jump straight to `Failed`; nothing leaves `Success` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UpdateStatus {
    Pending,
    Downloading,
    Installing,
    Success,
    Failed,
}

impl UpdateStatus {
    fn rank(self) -> u8 {
        match self {
            UpdateStatus::Pending => 0,
            UpdateStatus::Downloading => 1,
            UpdateStatus::Installing => 2,
            UpdateStatus::Success => 3,
            UpdateStatus::Failed => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateStatus::Success | UpdateStatus::Failed)
    }

    /// Same-status updates are allowed (progress reports while downloading).
    pub fn can_advance_to(self, next: UpdateStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAttempt {
    pub id: i64,
    /// Device row id.
    pub device_id: String,
    pub firmware_id: i64,
    pub status: UpdateStatus,
    pub bytes_downloaded: i64,
    pub error_message: Option<String>,
    /// First entry into `downloading`.
    pub download_started_at: Option<i64>,
    /// First entry into `installing`.
    pub download_completed_at: Option<i64>,
    /// Entry into `success` or `failed`.
    pub finished_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Ledger query filters; all optional, newest attempts first.
#[derive(Debug, Default, Deserialize)]
pub struct AttemptQuery {
    pub device_id: Option<String>,
    pub firmware_id: Option<i64>,
    pub status: Option<UpdateStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AttemptQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 1000)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
