//! Wall-clock reconstruction for diary legs.
//!
//! Diaries store dwell and travel durations; start instants are derived.
//! Every day begins at 00:00, activity and trip starts accumulate stay and
//! travel minutes, and times rolling past midnight simply keep counting
//! (writers render them modulo 24 h).

use dg_core::Diary;

/// Start minute (from day start) of every activity and every trip.
///
/// Returns `(activity_starts, trip_starts)`, aligned with
/// `diary.activities` and `diary.trips`.
pub fn leg_start_minutes(diary: &Diary) -> (Vec<f64>, Vec<f64>) {
    let mut activity_starts = Vec::with_capacity(diary.activities.len());
    let mut trip_starts = Vec::with_capacity(diary.trips.len());

    let mut clock = 0.0f64;
    for (i, activity) in diary.activities.iter().enumerate() {
        activity_starts.push(clock);
        clock += activity.stay_minutes.unwrap_or(0.0);

        if i < diary.trips.len() {
            trip_starts.push(clock);
            clock += diary.trips[i].time_minutes.unwrap_or(0.0);
        }
    }
    (activity_starts, trip_starts)
}

/// Render minutes-from-day-start as `HH:MM`, wrapping past midnight.
pub fn format_hhmm(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as u64;
    let h = (total / 60) % 24;
    let m = total % 60;
    format!("{h:02}:{m:02}")
}
