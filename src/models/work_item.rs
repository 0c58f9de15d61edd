//! Work item: the node type of the Initiative/Epic/Feature/Story/Task
//! hierarchy (spec §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Node kind in the hierarchy. Allowed parent->child pairs are enforced by
/// `engine::work_items` (spec §3.2), not by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Initiative,
    Epic,
    Feature,
    Story,
    Task,
}

impl ItemType {
    /// The child kind this item type is allowed to parent, if any
    /// (spec §3.2). `Task` is a leaf.
    #[must_use]
    pub fn allowed_child(self) -> Option<Self> {
        match self {
            Self::Initiative => Some(Self::Epic),
            Self::Epic => Some(Self::Feature),
            Self::Feature => Some(Self::Story),
            Self::Story => Some(Self::Task),
            Self::Task => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiative => "initiative",
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Task => "task",
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiative" => Ok(Self::Initiative),
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "story" => Ok(Self::Story),
            "task" => Ok(Self::Task),
            other => Err(format!("unknown item_type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotStarted,
    InProgress,
    Blocked,
    Completed,
    Cancelled,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Priority boost applied by hybrid search (spec §4.6.2).
    #[must_use]
    pub fn hybrid_boost(self) -> f64 {
        match self {
            Self::Critical => 1.3,
            Self::High => 1.2,
            Self::Medium => 1.0,
            Self::Low => 0.9,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A node in the work-item hierarchy (spec §3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub item_type: ItemType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub sequence_number: String,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Never surfaced in tool outputs (spec §6.2); present only on the
    /// in-memory/store round trip.
    #[serde(default, skip_serializing)]
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_metadata")]
    pub metadata: String,
}

fn default_metadata() -> String {
    "{}".to_string()
}

impl WorkItem {
    /// Build a fresh item with spec §4.5.1 defaults. `sequence_number`,
    /// `order_index`, and `vector` are filled in by the engine afterward.
    #[must_use]
    pub fn new(item_type: ItemType, title: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item_type,
            title,
            description,
            status: Status::NotStarted,
            priority: Priority::Medium,
            progress_percentage: 0.0,
            parent_id: None,
            dependencies: Vec::new(),
            sequence_number: String::new(),
            order_index: 0,
            tags: Vec::new(),
            acceptance_criteria: Vec::new(),
            vector: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            metadata: default_metadata(),
        }
    }

    /// Text used to compute `vector` (spec §4.5.1): `title + " " + description`.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Applies status/progress coherence (spec §3.1, P4): completing an
    /// item forces `progress_percentage=100` and stamps `completed_at`.
    pub fn apply_status(&mut self, status: Status) {
        self.status = status;
        if status == Status::Completed {
            self.progress_percentage = 100.0;
            self.completed_at.get_or_insert_with(Utc::now);
        }
    }

    /// `auto_calculate_status` rule (spec §4.5.2): 0 -> not_started,
    /// (0,100) -> in_progress, 100 -> completed.
    pub fn apply_progress(&mut self, progress: f64, auto_calculate_status: bool) {
        self.progress_percentage = progress.clamp(0.0, 100.0);
        if auto_calculate_status {
            if self.progress_percentage <= 0.0 {
                self.status = Status::NotStarted;
            } else if self.progress_percentage >= 100.0 {
                self.apply_status(Status::Completed);
            } else {
                self.status = Status::InProgress;
            }
        }
    }
}
