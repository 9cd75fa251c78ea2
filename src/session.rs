// =============================================================================
// Trading session clock (US/Eastern)
// =============================================================================

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

use crate::runtime_config::SessionHours;
use crate::types::Bar;

/// True during the regular weekday session.  Exchange holidays are not
/// modelled.
pub fn is_market_open(now: DateTime<Utc>, hours: &SessionHours) -> bool {
    let et = now.with_timezone(&Eastern);
    if matches!(et.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minute = et.hour() * 60 + et.minute();
    minute >= hours.open_minute && minute < hours.close_minute
}

/// Eastern calendar date of a timestamp.
pub fn session_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Eastern).date_naive()
}

/// Trailing bars that share the last bar's Eastern date.  `bars` must be in
/// time order.
pub fn current_session(bars: &[Bar]) -> &[Bar] {
    let Some(last) = bars.last() else {
        return bars;
    };
    let day = session_date(last.timestamp);
    let start = bars
        .iter()
        .rposition(|b| session_date(b.timestamp) != day)
        .map_or(0, |i| i + 1);
    &bars[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(ts: DateTime<Utc>) -> Bar {
        Bar {
            timestamp: ts,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn open_during_regular_hours_only() {
        let hours = SessionHours::default();
        // Wednesday 2024-07-10: EDT is UTC-4.
        let open = Utc.with_ymd_and_hms(2024, 7, 10, 14, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 7, 10, 13, 29, 0).unwrap();
        let at_close = Utc.with_ymd_and_hms(2024, 7, 10, 20, 0, 0).unwrap();
        assert!(is_market_open(open, &hours));
        assert!(!is_market_open(before, &hours));
        assert!(!is_market_open(at_close, &hours));
    }

    #[test]
    fn closed_on_weekends() {
        let saturday = Utc.with_ymd_and_hms(2024, 7, 13, 15, 0, 0).unwrap();
        assert!(!is_market_open(saturday, &SessionHours::default()));
    }

    #[test]
    fn current_session_uses_eastern_date() {
        let bars = vec![
            // 2024-07-09 15:55 ET
            bar_at(Utc.with_ymd_and_hms(2024, 7, 9, 19, 55, 0).unwrap()),
            // 2024-07-09 23:30 ET, still the 9th in New York
            bar_at(Utc.with_ymd_and_hms(2024, 7, 10, 3, 30, 0).unwrap()),
            // 2024-07-10 09:30 ET
            bar_at(Utc.with_ymd_and_hms(2024, 7, 10, 13, 30, 0).unwrap()),
            bar_at(Utc.with_ymd_and_hms(2024, 7, 10, 13, 35, 0).unwrap()),
        ];
        assert_eq!(current_session(&bars).len(), 2);
        assert_eq!(current_session(&bars[..2]).len(), 2);
        assert!(current_session(&[]).is_empty());
    }
}
