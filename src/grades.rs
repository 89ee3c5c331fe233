//! Grade ordering and per-session statistics.
//!
//! Pure functions over [`ClimbEntry`] lists; nothing here touches the store
//! or storage.

use crate::types::{ClimbEntry, ClimbResult, Session, SessionSummary};
use std::cmp::Ordering;

/// The V scale, lowest to highest difficulty.
pub const V_GRADES: [&str; 13] = [
    "VB", "V0", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V10+",
];

fn grade_index(grade: &str) -> Option<usize> {
    V_GRADES.iter().position(|g| *g == grade)
}

/// Compare two grade tokens by their position on the V scale.
///
/// A token not on the scale sorts below every recognized grade; two
/// unrecognized tokens compare equal. Entries normally always carry a valid
/// token, so the unranked branch is a fallback, not a feature.
pub fn compare_grades(a: &str, b: &str) -> Ordering {
    match (grade_index(a), grade_index(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ia), Some(ib)) => ia.cmp(&ib),
    }
}

/// Highest grade among `entries`, optionally restricted to conquers.
///
/// Returns None when the filtered set is empty. Ties keep the first maximum
/// encountered in entry order.
pub fn highest_grade(entries: &[ClimbEntry], only_conquer: bool) -> Option<&str> {
    let mut highest: Option<&str> = None;
    for entry in entries {
        if only_conquer && entry.result != ClimbResult::Conquer {
            continue;
        }
        match highest {
            None => highest = Some(&entry.grade),
            Some(current) => {
                if compare_grades(&entry.grade, current) == Ordering::Greater {
                    highest = Some(&entry.grade);
                }
            }
        }
    }
    highest
}

/// Derive the summary statistics for one session.
pub fn session_summary(session: &Session) -> SessionSummary {
    let entries = &session.entries;
    let conquer_count = entries
        .iter()
        .filter(|e| e.result == ClimbResult::Conquer)
        .count();
    let fail_count = entries
        .iter()
        .filter(|e| e.result == ClimbResult::Fail)
        .count();
    let total = conquer_count + fail_count;

    let completion_rate = if total > 0 {
        (conquer_count as f64 / total as f64 * 100.0).round() as u32
    } else {
        0
    };

    let highest = highest_grade(entries, true)
        .or_else(|| highest_grade(entries, false))
        .map(String::from);

    SessionSummary {
        conquer_count,
        fail_count,
        highest_grade: highest,
        completion_rate,
        total_attempts: entries.iter().map(|e| e.attempts).sum(),
        duration: match session.end_time {
            Some(end) => session.start_time.seconds_until(end),
            None => 0,
        },
        photos: entries
            .iter()
            .filter_map(|e| e.media_uri.clone())
            .collect(),
    }
}

/// Format a second count as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hrs > 0 {
        format!("{}:{:02}:{:02}", hrs, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
