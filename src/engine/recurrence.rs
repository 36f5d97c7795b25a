// ==========================================
// 排课核心 - 周循环与停课日期校验
// ==========================================
// 红线:
// - 停课日期必须严格晚于今天
// - 停课日期必须在学期 [start_date, end_date] 内
// - 停课日期的星期必须属于该班某个时间段的星期
// 三类违规全部收集后一次性判定，不在第一个错误处返回
// ==========================================

use crate::domain::term::Term;
use crate::domain::types::Weekday;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// 停课日期校验报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValidationReport {
    /// 去重、升序后的全部请求日期
    pub dates: Vec<NaiveDate>,
    pub past_dates: Vec<NaiveDate>,
    pub outside_term_dates: Vec<NaiveDate>,
    pub invalid_weekday_dates: Vec<NaiveDate>,
}

impl DateValidationReport {
    pub fn is_valid(&self) -> bool {
        self.past_dates.is_empty()
            && self.outside_term_dates.is_empty()
            && self.invalid_weekday_dates.is_empty()
    }
}

pub struct RecurrenceValidator;

impl RecurrenceValidator {
    /// 同一请求内重复的日期合并为一个
    pub fn normalize_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
        dates
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 逐日校验停课日期
    ///
    /// # 参数
    /// - dates: 请求的停课日期（可重复、无序）
    /// - today: 当前日期（不可停课）
    /// - term: 教学班所属学期
    /// - weekdays: 教学班排课覆盖的星期
    pub fn validate_cancellation_dates(
        dates: &[NaiveDate],
        today: NaiveDate,
        term: &Term,
        weekdays: &[Weekday],
    ) -> DateValidationReport {
        let allowed: HashSet<Weekday> = weekdays.iter().copied().collect();
        let mut report = DateValidationReport {
            dates: Self::normalize_dates(dates),
            ..Default::default()
        };

        for date in report.dates.clone() {
            if date <= today {
                report.past_dates.push(date);
            }
            if !term.contains(date) {
                report.outside_term_dates.push(date);
            }
            if !allowed.contains(&Weekday::from(date.weekday())) {
                report.invalid_weekday_dates.push(date);
            }
        }

        report
    }

    /// 学期内某星期集合的全部上课日期（升序）
    pub fn occurrences_in_term(term: &Term, weekdays: &[Weekday]) -> Vec<NaiveDate> {
        let allowed: HashSet<Weekday> = weekdays.iter().copied().collect();
        let mut dates = Vec::new();
        let mut cursor = term.start_date;
        while cursor <= term.end_date {
            if allowed.contains(&Weekday::from(cursor.weekday())) {
                dates.push(cursor);
            }
            cursor += Duration::days(1);
        }
        dates
    }

    /// 今天之后的下一次上课日期（不考虑停课）
    pub fn next_occurrence(
        term: &Term,
        weekdays: &[Weekday],
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        Self::occurrences_in_term(term, weekdays)
            .into_iter()
            .find(|d| *d > today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn spring_term() -> Term {
        Term {
            term_id: "2024-1".to_string(),
            year: 2024,
            sequence_number: 1,
            start_date: d(2024, 3, 1),
            end_date: d(2024, 7, 15),
        }
    }

    #[test]
    fn test_duplicate_dates_collapsed() {
        let report = RecurrenceValidator::validate_cancellation_dates(
            &[d(2024, 3, 6), d(2024, 3, 6)],
            d(2024, 2, 20),
            &spring_term(),
            &[Weekday::Wednesday],
        );
        assert!(report.is_valid());
        assert_eq!(report.dates, vec![d(2024, 3, 6)]);
    }

    #[test]
    fn test_all_violations_accumulated() {
        let report = RecurrenceValidator::validate_cancellation_dates(
            &[d(2024, 8, 7), d(2024, 3, 7), d(2024, 3, 13), d(2024, 3, 6)],
            d(2024, 3, 6),
            &spring_term(),
            &[Weekday::Wednesday],
        );
        assert!(!report.is_valid());
        // 今天本身不可停课
        assert_eq!(report.past_dates, vec![d(2024, 3, 6)]);
        assert_eq!(report.outside_term_dates, vec![d(2024, 8, 7)]);
        assert_eq!(report.invalid_weekday_dates, vec![d(2024, 3, 7)]);
    }

    #[test]
    fn test_term_bounds_inclusive() {
        // 2024-03-01 周五, 2024-07-15 周一
        let report = RecurrenceValidator::validate_cancellation_dates(
            &[d(2024, 3, 1), d(2024, 7, 15)],
            d(2024, 2, 1),
            &spring_term(),
            &[Weekday::Monday, Weekday::Friday],
        );
        assert!(report.is_valid());
    }

    #[test]
    fn test_next_occurrence() {
        let next = RecurrenceValidator::next_occurrence(
            &spring_term(),
            &[Weekday::Wednesday],
            d(2024, 3, 6),
        );
        assert_eq!(next, Some(d(2024, 3, 13)));
    }
}
