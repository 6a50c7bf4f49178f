//! Agent types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, AgentStatus, CoreError};

/// The closed set of roles an agent can take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[default]
    Orchestrator,
    Coder,
    Stylist,
    Researcher,
    Builder,
}

impl AgentRole {
    /// Wire/storage label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "Orchestrator",
            Self::Coder => "Coder",
            Self::Stylist => "Stylist",
            Self::Researcher => "Researcher",
            Self::Builder => "Builder",
        }
    }

    /// Map a free-form role label (as produced by a planner) onto the closed set.
    ///
    /// Matching ignores case and surrounding whitespace. Labels outside the set
    /// fall back to [`AgentRole::Orchestrator`].
    pub fn from_label(label: &str) -> Self {
        label.trim().parse().unwrap_or_default()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orchestrator" => Ok(Self::Orchestrator),
            "coder" => Ok(Self::Coder),
            "stylist" => Ok(Self::Stylist),
            "researcher" => Ok(Self::Researcher),
            "builder" => Ok(Self::Builder),
            _ => Err(CoreError::UnknownLabel {
                kind: "agent role",
                value: s.to_string(),
            }),
        }
    }
}

/// A named worker persona created from a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier.
    pub id: AgentId,

    /// Display name, unique within a plan.
    pub name: String,

    /// Role the agent plays.
    pub role: AgentRole,

    /// Current status.
    #[serde(default)]
    pub status: AgentStatus,

    /// When the agent was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Create a new idle Agent.
    pub fn new(name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: AgentId::generate(),
            name: name.into(),
            role,
            status: AgentStatus::Idle,
            created_at: Utc::now(),
        }
    }

    /// Builder method to set a specific ID.
    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }
}
