use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Whole seconds until the deadline, clamped to zero once it has passed.
pub(crate) fn remaining_whole_seconds(deadline: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (deadline - now).whole_seconds().max(0)
}

pub(crate) fn duration_until(deadline: OffsetDateTime) -> std::time::Duration {
    let remaining = deadline - OffsetDateTime::now_utc();
    if remaining.is_negative() {
        std::time::Duration::ZERO
    } else {
        remaining.unsigned_abs()
    }
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}
