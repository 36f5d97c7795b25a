// ==========================================
// 排课核心 - 时间段规则引擎
// ==========================================
// 红线: 同一星期内任意两个时间段不得重叠
// 判定顺序: 区间合法 → 完全重复 → 重叠
// ==========================================
// 职责: 纯计算，不访问数据库
// ==========================================

use crate::domain::time_interval::{intervals_overlap, TimeInterval};

/// 时间段规则违反
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalViolation {
    /// end_time <= start_time
    InvalidRange,
    /// 同一星期已存在起止完全相同的时间段
    Duplicate { existing: TimeInterval },
    /// 同一星期已存在重叠的时间段
    Overlap { conflicting: TimeInterval },
}

pub struct IntervalRules;

impl IntervalRules {
    /// 校验候选时间段
    ///
    /// # 参数
    /// - candidate: 待写入的时间段
    /// - existing: 同一星期的其他时间段（更新时已排除自身）
    pub fn check(
        candidate: &TimeInterval,
        existing: &[TimeInterval],
    ) -> Result<(), IntervalViolation> {
        let range = candidate.range();
        if !range.is_valid() {
            return Err(IntervalViolation::InvalidRange);
        }

        let same_day: Vec<&TimeInterval> = existing
            .iter()
            .filter(|other| other.day_of_week == candidate.day_of_week)
            .filter(|other| other.interval_id != candidate.interval_id)
            .collect();

        // 完全重复优先于一般重叠
        if let Some(dup) = same_day
            .iter()
            .find(|other| other.start_time == range.start && other.end_time == range.end)
        {
            return Err(IntervalViolation::Duplicate {
                existing: (*dup).clone(),
            });
        }

        match same_day
            .iter()
            .filter(|other| intervals_overlap(&other.range(), &range))
            .min_by_key(|other| other.start_time)
        {
            Some(hit) => Err(IntervalViolation::Overlap {
                conflicting: (*hit).clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Weekday;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday(start: NaiveTime, end: NaiveTime) -> TimeInterval {
        TimeInterval::new(start, end, Weekday::Monday)
    }

    #[test]
    fn test_invalid_range_rejected() {
        let candidate = monday(t(10, 0), t(9, 0));
        assert_eq!(
            IntervalRules::check(&candidate, &[]),
            Err(IntervalViolation::InvalidRange)
        );
        let zero = monday(t(9, 0), t(9, 0));
        assert_eq!(
            IntervalRules::check(&zero, &[]),
            Err(IntervalViolation::InvalidRange)
        );
    }

    #[test]
    fn test_overlap_with_existing() {
        let a = monday(t(8, 0), t(9, 40));
        let b = monday(t(8, 30), t(9, 0));
        match IntervalRules::check(&b, &[a.clone()]) {
            Err(IntervalViolation::Overlap { conflicting }) => {
                assert_eq!(conflicting.interval_id, a.interval_id)
            }
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_duplicate_is_distinct_error() {
        let a = monday(t(8, 0), t(9, 40));
        let b = monday(t(8, 0), t(9, 40));
        assert!(matches!(
            IntervalRules::check(&b, &[a]),
            Err(IntervalViolation::Duplicate { .. })
        ));
    }

    #[test]
    fn test_adjacent_and_other_day_allowed() {
        let a = monday(t(8, 0), t(9, 0));
        let adjacent = monday(t(9, 0), t(10, 0));
        let tuesday = TimeInterval::new(t(8, 0), t(9, 0), Weekday::Tuesday);
        assert!(IntervalRules::check(&adjacent, &[a.clone()]).is_ok());
        assert!(IntervalRules::check(&tuesday, &[a]).is_ok());
    }

    #[test]
    fn test_update_excludes_self() {
        let a = monday(t(8, 0), t(9, 0));
        let mut moved = a.clone();
        moved.end_time = t(9, 30);
        assert!(IntervalRules::check(&moved, &[a]).is_ok());
    }
}
