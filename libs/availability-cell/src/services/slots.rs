use chrono::{NaiveTime, Timelike};

use crate::models::BreakWindow;

fn minutes_since_midnight(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

fn format_hhmm(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Generates the bookable slot starts for one working day as "HH:MM" strings.
///
/// The cursor walks from opening in steps of `duration_minutes`; a slot is
/// emitted iff it ends at or before closing. Break windows are half-open
/// `[start, end)` hard exclusions: any slot that would overlap one is
/// suppressed and the cursor resumes at the break end. Degenerate input
/// (non-positive duration, opening at or past closing, duration longer than
/// the whole window) yields no slots.
pub fn generate_slots(
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    duration_minutes: i32,
    break_times: &[BreakWindow],
) -> Vec<String> {
    let opening = minutes_since_midnight(opening_time);
    let closing = minutes_since_midnight(closing_time);

    if duration_minutes <= 0 || opening >= closing || duration_minutes > closing - opening {
        return Vec::new();
    }

    let mut windows: Vec<(i32, i32)> = break_times
        .iter()
        .map(|b| {
            (
                minutes_since_midnight(b.start_time),
                minutes_since_midnight(b.end_time),
            )
        })
        .filter(|(start, end)| start < end)
        .collect();
    windows.sort_by_key(|&(start, _)| start);

    let mut slots = Vec::new();
    let mut cursor = opening;

    while cursor + duration_minutes <= closing {
        // Overlap with a break jumps the cursor to the break end. The cursor
        // strictly increases on every iteration, so the walk always ends.
        if let Some(&(_, break_end)) = windows
            .iter()
            .find(|&&(bs, be)| cursor < be && cursor + duration_minutes > bs)
        {
            cursor = break_end;
            continue;
        }

        slots.push(format_hhmm(cursor));
        cursor += duration_minutes;
    }

    slots
}
