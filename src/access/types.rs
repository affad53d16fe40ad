use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Status codes the lock controller reports in `STATUS:<VALUE>;` frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusKind {
    /// Correct PIN entered, lock released
    Open,
    /// Incorrect PIN entered
    Wrong,
    /// Failed-attempt threshold exceeded, keypad locked out
    Lock,
}

impl StatusKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(StatusKind::Open),
            "WRONG" => Some(StatusKind::Wrong),
            "LOCK" => Some(StatusKind::Lock),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            StatusKind::Open => "OPEN",
            StatusKind::Wrong => "WRONG",
            StatusKind::Lock => "LOCK",
        }
    }

    /// Log-table label for this status
    pub fn description(&self) -> &'static str {
        match self {
            StatusKind::Open => "Unlock Success",
            StatusKind::Wrong => "Incorrect PIN Attempt",
            StatusKind::Lock => "Failed Attempts Limit",
        }
    }

    /// Headline shown on the status card
    pub fn banner(&self) -> &'static str {
        match self {
            StatusKind::Open => "ACCESS GRANTED",
            StatusKind::Wrong => "WRONG PIN",
            StatusKind::Lock => "SYSTEM LOCKED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StatusKind::Open => Severity::Success,
            StatusKind::Wrong => Severity::Warning,
            StatusKind::Lock => Severity::Alarm,
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Success,
    Warning,
    Alarm,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Alarm => "ALARM",
        }
    }
}

/// One decoded status frame.
///
/// `timestamp` is the host clock at the moment the frame completed, not
/// anything reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEvent {
    kind: StatusKind,
    timestamp: DateTime<Local>,
    description: &'static str,
}

impl AccessEvent {
    pub fn new(kind: StatusKind, timestamp: DateTime<Local>) -> Self {
        Self {
            kind,
            timestamp,
            description: kind.description(),
        }
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

/// Projection of the newest logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CurrentStatus {
    /// Nothing has been decoded yet this session
    NoData,
    Latest {
        kind: StatusKind,
        timestamp: DateTime<Local>,
    },
}

impl CurrentStatus {
    pub fn kind(&self) -> Option<StatusKind> {
        match self {
            CurrentStatus::NoData => None,
            CurrentStatus::Latest { kind, .. } => Some(*kind),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, CurrentStatus::NoData)
    }
}

impl From<&AccessEvent> for CurrentStatus {
    fn from(event: &AccessEvent) -> Self {
        CurrentStatus::Latest {
            kind: event.kind,
            timestamp: event.timestamp,
        }
    }
}
