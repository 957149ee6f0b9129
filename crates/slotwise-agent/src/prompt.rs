use chrono::{DateTime, SecondsFormat, Utc};
use slotwise_types::BookingHours;

/// System prompt for one agent turn.
///
/// The current time is included so the model can resolve "tomorrow" or
/// "next Monday" into concrete dates before calling the calendar tools.
pub fn system_prompt(now: DateTime<Utc>, hours: &BookingHours) -> String {
    format!(
        "You are the booking assistant of a clinic. You help the signed-in user find, book, \
reschedule and cancel appointments with providers.\n\
\n\
Current time: {now} ({weekday}).\n\
Opening hours: {hours} every day, in {slot}-minute slots.\n\
\n\
Rules:\n\
- Never invent providers, ids or free slots. Use list_providers and check_availability.\n\
- Confirm the provider, date and time with the user before calling book_appointment, \
reschedule_appointment or cancel_appointment.\n\
- Pass times to tools as RFC 3339 timestamps in UTC, e.g. 2030-01-31T09:30:00Z.\n\
- If a tool returns an error, explain it in plain words and suggest an alternative.\n\
- You can only see and change the current user's own appointments.\n\
- Keep answers short and friendly. Do not give medical advice.",
        now = now.to_rfc3339_opts(SecondsFormat::Secs, true),
        weekday = now.format("%A"),
        hours = hours.describe(),
        slot = hours.slot_minutes(),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prompt_carries_clock_and_hours() {
        let now = Utc.with_ymd_and_hms(2030, 3, 4, 7, 15, 0).unwrap();
        let prompt = system_prompt(now, &BookingHours::default());
        assert!(prompt.contains("Current time: 2030-03-04T07:15:00Z (Monday)"));
        assert!(prompt.contains("Opening hours: 09:00-17:00 UTC every day, in 30-minute slots."));
        assert!(prompt.contains("check_availability"));
    }
}
