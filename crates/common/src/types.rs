//! Wire model for the Beacon recording service

use serde::{Deserialize, Serialize};

/// Issue marker telling the server a skipped item must not count as a defect
pub const NOT_ISSUE: &str = "NOT_ISSUE";

/// Reported outcome of a launch or item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Passed,
    Failed,
    Skipped,
    Stopped,
    Interrupted,
    Cancelled,
    Info,
    Warn,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Passed => write!(f, "passed"),
            ItemStatus::Failed => write!(f, "failed"),
            ItemStatus::Skipped => write!(f, "skipped"),
            ItemStatus::Stopped => write!(f, "stopped"),
            ItemStatus::Interrupted => write!(f, "interrupted"),
            ItemStatus::Cancelled => write!(f, "cancelled"),
            ItemStatus::Info => write!(f, "info"),
            ItemStatus::Warn => write!(f, "warn"),
        }
    }
}

/// Kind of reported execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Suite,
    Test,
    Step,
}

impl Default for ItemType {
    fn default() -> Self {
        Self::Test
    }
}

/// Key/value attribute attached to a launch or item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAttribute {
    pub key: Option<String>,
    pub value: String,
    #[serde(default)]
    pub system: bool,
}

impl ItemAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            system: false,
        }
    }

    pub fn system(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            system: true,
        }
    }
}

/// Request to create the root launch record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartLaunchRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Client-side start timestamp, epoch seconds
    pub start_time: i64,
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,
    #[serde(default)]
    pub rerun: bool,
}

impl StartLaunchRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            start_time: chrono::Utc::now().timestamp(),
            attributes: Vec::new(),
            rerun: false,
        }
    }

    pub fn with_attributes(mut self, attributes: Vec<ItemAttribute>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Server acknowledgement of launch creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchCreatedResponse {
    /// Remote-assigned launch identifier
    pub id: String,
    /// Sequential launch number within the project, when the server tracks one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
}

/// Request to start a reported item under a launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartItemRequest {
    pub name: String,
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: i64,
    /// Resolved launch identifier; filled in by the coordinator before dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_id: Option<String>,
    #[serde(default)]
    pub attributes: Vec<ItemAttribute>,
    /// Marks the item as a retry of a previously reported execution
    #[serde(default)]
    pub retry: bool,
}

impl StartItemRequest {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
            description: None,
            start_time: chrono::Utc::now().timestamp(),
            launch_id: None,
            attributes: Vec::new(),
            retry: false,
        }
    }
}

/// Server acknowledgement of item creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreatedResponse {
    /// Remote-assigned item identifier
    pub id: String,
}

/// Request to finish a reported item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishItemRequest {
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    /// Issue marker, e.g. [`NOT_ISSUE`] for skips that are not defects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_id: Option<String>,
}

impl FinishItemRequest {
    pub fn new(status: ItemStatus) -> Self {
        Self {
            end_time: chrono::Utc::now().timestamp(),
            status: Some(status),
            issue: None,
            launch_id: None,
        }
    }
}

/// Request to finish the launch record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishLaunchRequest {
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

impl FinishLaunchRequest {
    pub fn new() -> Self {
        Self {
            end_time: chrono::Utc::now().timestamp(),
            status: None,
        }
    }
}

impl Default for FinishLaunchRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic completion acknowledgement for finish operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
