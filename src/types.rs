//! Core types for album-dl

use serde::{Deserialize, Serialize};

/// Unique identifier for a task
///
/// Opaque string, either supplied by the caller or generated with [`TaskId::generate`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a TaskId from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Which engine executes a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Album download into an archive
    Download,
    /// Resize of a downloaded album through a profile
    Resize,
}

impl TaskKind {
    /// Database/text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Download => "download",
            TaskKind::Resize => "resize",
        }
    }

    /// Parse the database representation
    pub fn from_db_str(kind: &str) -> Option<Self> {
        match kind {
            "download" => Some(TaskKind::Download),
            "resize" => Some(TaskKind::Resize),
            _ => None,
        }
    }
}

/// Task status
///
/// Transitions are monotonic: `Pending -> InProgress -> {Completed | Error}`.
/// Nothing leaves `Completed` or `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created and waiting in the queue
    Pending,
    /// Currently executing
    InProgress,
    /// Finished successfully
    Completed,
    /// Failed, cancelled or interrupted
    Error,
}

impl TaskStatus {
    /// Database/text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    /// Parse the database representation (unknown values read as `Error`)
    pub fn from_db_str(status: &str) -> Self {
        match status {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Error,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    /// Statuses a task may be in immediately before moving to `self`
    pub fn predecessors(&self) -> &'static [TaskStatus] {
        match self {
            TaskStatus::Pending => &[],
            TaskStatus::InProgress => &[TaskStatus::Pending],
            TaskStatus::Completed | TaskStatus::Error => &[TaskStatus::InProgress],
        }
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        next.predecessors().contains(self)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of queued work
///
/// Created once at enqueue time and consumed exactly once by the dispatch loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    /// Sync a remote album into a new archive
    Download {
        /// Task record id
        task_id: TaskId,
        /// Remote album id
        album_id: String,
        /// Remote album name (for display and the album output record)
        album_name: String,
    },
    /// Resize every image of a downloaded album through a profile
    Resize {
        /// Task record id
        task_id: TaskId,
        /// Local downloaded-album record id
        downloaded_album_id: i64,
        /// Resize profile id
        profile_id: i64,
    },
}

impl TaskRequest {
    /// The task this request belongs to
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskRequest::Download { task_id, .. } | TaskRequest::Resize { task_id, .. } => {
                task_id
            }
        }
    }

    /// Which engine handles this request
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::Download { .. } => TaskKind::Download,
            TaskRequest::Resize { .. } => TaskKind::Resize,
        }
    }
}

/// What a successful engine run produced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Archive written by the task
    pub archive_path: std::path::PathBuf,
    /// Size of the archive in bytes
    pub size_bytes: u64,
    /// Assets downloaded or images resized
    pub processed_count: u64,
}

/// Media type of a remote asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    /// Still image
    Image,
    /// Video clip
    Video,
    /// Audio file
    Audio,
    /// Anything else the server reports
    #[serde(other)]
    Other,
}

/// Reference to an asset on the remote server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Remote asset id
    pub id: String,
    /// Original filename as uploaded
    #[serde(rename = "originalFileName")]
    pub original_filename: String,
    /// Media type
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl AssetRef {
    /// Whether this asset is a still image
    pub fn is_image(&self) -> bool {
        self.media_type == MediaType::Image
    }
}

/// Album as listed by the remote server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Remote album id
    pub id: String,
    /// Album display name
    #[serde(rename = "albumName")]
    pub name: String,
    /// Number of assets reported by the server
    #[serde(rename = "assetCount", default)]
    pub asset_count: u64,
}

/// Album with its full asset listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    /// Remote album id
    pub id: String,
    /// Album display name
    #[serde(rename = "albumName")]
    pub name: String,
    /// All assets in the album (images and videos)
    #[serde(default)]
    pub assets: Vec<AssetRef>,
}

/// Image orientation used by resize profile filters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Width strictly greater than height
    Horizontal,
    /// Height greater than or equal to width
    Vertical,
}

impl Orientation {
    /// Classify dimensions: width > height is horizontal, everything else vertical
    pub fn of(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }
}

/// Event broadcast on the notification channel
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Status or progress change of a task
    TaskUpdate {
        /// Task id
        task_id: TaskId,
        /// Task kind
        kind: TaskKind,
        /// Status at the time of the event
        status: TaskStatus,
        /// Current step or failure message
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Items processed so far
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u64>,
        /// Total items, once known
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Executor shut down
    Shutdown,
}
