//! Core types for the climb log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as i64)
    }

    /// Whole seconds elapsed between two timestamps.
    pub fn seconds_until(self, later: Timestamp) -> i64 {
        (later.0 - self.0) / 1000
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Kind of climbing a gym offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GymType {
    Bouldering,
    Lead,
    Mixed,
}

/// A climbing gym from the static catalog.
///
/// Read-only reference data. The store never owns or mutates gyms; it only
/// records gym ids as foreign references.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gym {
    pub id: String,
    pub name: String,
    pub city: String,
    pub district: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub gym_type: GymType,
    #[serde(default)]
    pub price_from: Option<u32>,
    #[serde(default)]
    pub hours_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image_uri: Option<String>,
}

/// Outcome of a single climb attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimbResult {
    Conquer,
    Fail,
}

/// One logged attempt on a route within a session.
///
/// Immutable once created; the only permitted change is deletion from the
/// active session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimbEntry {
    pub id: String,
    pub session_id: String,
    /// Grade token, normally one of [`V_GRADES`](crate::grades::V_GRADES).
    pub grade: String,
    pub result: ClimbResult,
    /// Number of tries, at least 1.
    pub attempts: u32,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub media_uri: Option<String>,
    pub created_at: Timestamp,
}

/// Input for creating a new entry (before id/session/timestamp assigned).
#[derive(Clone, Debug)]
pub struct EntryInput {
    pub grade: String,
    pub result: ClimbResult,
    pub attempts: u32,
    pub note: Option<String>,
    pub media_uri: Option<String>,
}

impl EntryInput {
    pub fn new(grade: impl Into<String>, result: ClimbResult, attempts: u32) -> Self {
        Self {
            grade: grade.into(),
            result,
            attempts,
            note: None,
            media_uri: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_media(mut self, uri: impl Into<String>) -> Self {
        self.media_uri = Some(uri.into());
        self
    }
}

/// One continuous visit to a gym.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Constant local-user placeholder; there is no multi-user model.
    pub user_id: String,
    pub gym_id: String,
    pub start_time: Timestamp,
    /// None while the session is ongoing. Set exactly once on completion.
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub note: Option<String>,
    /// Insertion order is creation order.
    #[serde(default)]
    pub entries: Vec<ClimbEntry>,
}

impl Session {
    /// A session without an end time is the (at most one) active session.
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Grading scale in use. Only the V scale exists in this version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradeSystem {
    VGrade,
}

/// Default visibility for shared content. Not enforced by any core logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Private,
    Public,
}

/// User settings, mutated only via partial-update merge.
///
/// `user_name` and `avatar_uri` were added after the first release, so both
/// default-fill when loading older persisted payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub grade_system: GradeSystem,
    pub default_privacy: Privacy,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub avatar_uri: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grade_system: GradeSystem::VGrade,
            default_privacy: Privacy::Private,
            user_name: None,
            avatar_uri: None,
        }
    }
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Clone, Debug, Default)]
pub struct SettingsPatch {
    pub grade_system: Option<GradeSystem>,
    pub default_privacy: Option<Privacy>,
    pub user_name: Option<String>,
    pub avatar_uri: Option<String>,
}

impl SettingsPatch {
    /// Shallow-merge this patch into `settings`.
    pub fn apply_to(&self, settings: &Settings) -> Settings {
        Settings {
            grade_system: self.grade_system.unwrap_or(settings.grade_system),
            default_privacy: self.default_privacy.unwrap_or(settings.default_privacy),
            user_name: self.user_name.clone().or_else(|| settings.user_name.clone()),
            avatar_uri: self.avatar_uri.clone().or_else(|| settings.avatar_uri.clone()),
        }
    }
}

/// Recency and frequency of visits to one gym.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGymVisit {
    pub gym_id: String,
    pub last_visit_time: Timestamp,
    pub visit_count: u32,
}

/// Statistics derived from one session's entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub conquer_count: usize,
    pub fail_count: usize,
    /// Highest conquered grade, falling back to the highest attempted grade.
    pub highest_grade: Option<String>,
    /// Percentage 0-100, rounded. Zero when there are no entries.
    pub completion_rate: u32,
    pub total_attempts: u32,
    /// Seconds between start and end. Zero while the session is ongoing.
    pub duration: i64,
    /// Media references of entries that carry one, in entry order.
    pub photos: Vec<String>,
}
