use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Late,
    ExcusedSick,
    ExcusedPermission,
    Unmarked,
}

impl AttendanceStatus {
    /// Present and Late are the only statuses where the student is physically in class.
    pub fn is_attending(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::ExcusedSick => "excusedSick",
            AttendanceStatus::ExcusedPermission => "excusedPermission",
            AttendanceStatus::Unmarked => "unmarked",
        }
    }

    /// Accepts the wire names plus the short forms the scanner UI sends.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "present" | "Present" => Some(AttendanceStatus::Present),
            "late" | "Late" => Some(AttendanceStatus::Late),
            "excusedSick" | "excused-sick" | "sick" => Some(AttendanceStatus::ExcusedSick),
            "excusedPermission" | "excused-permission" | "permission" => {
                Some(AttendanceStatus::ExcusedPermission)
            }
            "unmarked" | "" => Some(AttendanceStatus::Unmarked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    Attire,
    Conduct,
    Tidiness,
}

impl ViolationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "attire" => Some(ViolationKind::Attire),
            "conduct" => Some(ViolationKind::Conduct),
            "tidiness" => Some(ViolationKind::Tidiness),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub attributes: BTreeMap<String, bool>,
    #[serde(default)]
    pub violations: BTreeSet<ViolationKind>,
    #[serde(default)]
    pub teachers_note: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_selected: bool,
}

impl AttendanceRecord {
    pub fn unmarked(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            status: AttendanceStatus::Unmarked,
            attributes: BTreeMap::new(),
            violations: BTreeSet::new(),
            teachers_note: String::new(),
            timestamp: None,
            is_selected: false,
        }
    }

    /// Persisted content only: selection is transient and the timestamp follows status.
    pub fn same_content(&self, other: &AttendanceRecord) -> bool {
        self.status == other.status
            && self.attributes == other.attributes
            && self.violations == other.violations
            && self.teachers_note == other.teachers_note
    }

    pub fn has_blank_note(&self) -> bool {
        self.teachers_note.trim().is_empty()
    }
}
