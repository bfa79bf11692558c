use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute names read for the secondary ranking key.
pub const MANIPULATION: &str = "manipulation";
pub const SIGHT: &str = "sight";

/// Label of a type of work workers can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkCategory(pub String);

impl WorkCategory {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkCategory {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkCategory {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for host-owned workers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an independent worker partition, e.g. a map or location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority a worker holds for a category. Zero means unassigned; the upper
/// bound is defined by the host.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub u8);

impl Priority {
    pub const UNASSIGNED: Priority = Priority(0);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Desired headcount and priority for one category.
///
/// Either field at zero marks the category as not configured; it is skipped
/// entirely rather than treated as a zero-worker assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySettings {
    pub desired_count: u32,
    pub priority: Priority,
}

impl CategorySettings {
    pub fn new(desired_count: u32, priority: Priority) -> Self {
        Self {
            desired_count,
            priority,
        }
    }

    pub fn is_active(&self) -> bool {
        self.desired_count > 0 && self.priority.is_assigned()
    }
}
