use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tuning for the verification grace window granted at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriodConfig {
    /// Days granted to complete verification after registration.
    pub initial_days: i64,
    /// Remaining days at or below which the status turns `warning`.
    pub warning_days: i64,
    /// Remaining days at or below which the status turns `critical`.
    pub critical_days: i64,
    /// Days past the deadline after which the account is suspended.
    pub suspension_after_days: i64,
}

impl Default for GracePeriodConfig {
    fn default() -> Self {
        GracePeriodConfig {
            initial_days: 30,
            warning_days: 7,
            critical_days: 3,
            suspension_after_days: 90,
        }
    }
}

/// Where an institution stands relative to its verification deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraceStatus {
    Active,
    Warning,
    Critical,
    Expired,
    Suspended,
}

impl GraceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            GraceStatus::Active => "active",
            GraceStatus::Warning => "warning",
            GraceStatus::Critical => "critical",
            GraceStatus::Expired => "expired",
            GraceStatus::Suspended => "suspended",
        }
    }

    /// Platform features withheld while unverified, surfaced in status views.
    pub const fn restrictions(self) -> &'static [&'static str] {
        match self {
            GraceStatus::Active => &[],
            GraceStatus::Warning => &["verification_reminder_banner"],
            GraceStatus::Critical => &["verification_urgent_banner"],
            GraceStatus::Expired => &["student_enrollment_locked", "course_creation_locked"],
            GraceStatus::Suspended => &["account_suspended"],
        }
    }
}

/// Snapshot computed for institution status responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraceView {
    pub status: GraceStatus,
    pub days_remaining: i64,
    pub deadline: DateTime<Utc>,
    pub restrictions: &'static [&'static str],
}

pub fn deadline_from(config: &GracePeriodConfig, registered_at: DateTime<Utc>) -> DateTime<Utc> {
    registered_at + Duration::days(config.initial_days)
}

/// Whole days until the deadline, rounded up; negative once it has passed.
pub fn days_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds();
    let days = seconds.div_euclid(86_400);
    if seconds.rem_euclid(86_400) > 0 {
        days + 1
    } else {
        days
    }
}

pub fn status_for(
    config: &GracePeriodConfig,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> GraceStatus {
    let remaining = days_remaining(deadline, now);
    if remaining < 0 {
        if -remaining >= config.suspension_after_days {
            GraceStatus::Suspended
        } else {
            GraceStatus::Expired
        }
    } else if remaining <= config.critical_days {
        GraceStatus::Critical
    } else if remaining <= config.warning_days {
        GraceStatus::Warning
    } else {
        GraceStatus::Active
    }
}

/// Push a deadline out, e.g. when an approved appeal grants more time.
pub fn extend(deadline: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    deadline + Duration::days(days)
}

pub fn view(config: &GracePeriodConfig, deadline: DateTime<Utc>, now: DateTime<Utc>) -> GraceView {
    let status = status_for(config, deadline, now);
    GraceView {
        status,
        days_remaining: days_remaining(deadline, now),
        deadline,
        restrictions: status.restrictions(),
    }
}
