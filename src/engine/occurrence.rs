// ==========================================
// 排课核心 - 上课实例状态派生
// ==========================================
// 读路径: 今天及以后的停课视为"当前已停课"
// 每次读取重新计算，不落库
// ==========================================

use crate::domain::cancellation::{ClassCancellation, OccurrenceStatus};
use chrono::NaiveDate;

pub struct OccurrenceStatusResolver;

impl OccurrenceStatusResolver {
    pub fn resolve(cancellations: &[ClassCancellation], today: NaiveDate) -> OccurrenceStatus {
        let (mut upcoming, mut past): (Vec<NaiveDate>, Vec<NaiveDate>) = cancellations
            .iter()
            .map(|c| c.date)
            .partition(|date| *date >= today);
        upcoming.sort();
        past.sort();

        OccurrenceStatus {
            is_cancelled: !upcoming.is_empty(),
            upcoming_cancelled_dates: upcoming,
            past_cancelled_dates: past,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancellation(date: NaiveDate) -> ClassCancellation {
        ClassCancellation::new(
            "c1",
            date,
            "调课",
            "t1",
            date.and_hms_opt(0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_today_counts_as_upcoming() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let past = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let status =
            OccurrenceStatusResolver::resolve(&[cancellation(past), cancellation(today)], today);
        assert!(status.is_cancelled);
        assert_eq!(status.upcoming_cancelled_dates, vec![today]);
        assert_eq!(status.past_cancelled_dates, vec![past]);
    }

    #[test]
    fn test_only_past_is_not_cancelled() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let past = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let status = OccurrenceStatusResolver::resolve(&[cancellation(past)], today);
        assert!(!status.is_cancelled);
        assert!(status.upcoming_cancelled_dates.is_empty());
    }
}
