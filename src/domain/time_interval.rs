// ==========================================
// 排课核心 - 时间段领域模型
// ==========================================
// 时间段 = 某个星期几上的一段固定钟点 [start, end)
// 重叠判定只在此处实现 (intervals_overlap)
// ==========================================

use crate::domain::types::Weekday;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// 钟点存储/展示格式
pub const CLOCK_FORMAT: &str = "%H:%M";

// ==========================================
// TimeRange - 半开区间 [start, end)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// end 必须严格晚于 start
    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }
}

/// 半开区间重叠判定
///
/// 覆盖三种情况: 包含对方起点、包含对方终点、完全包含。
/// 首尾相接 (08:00-09:00 与 09:00-10:00) 不算重叠。
pub fn intervals_overlap(a: &TimeRange, b: &TimeRange) -> bool {
    a.start < b.end && b.start < a.end
}

// ==========================================
// TimeInterval - 标准时间段
// ==========================================
// 对齐: time_intervals 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub interval_id: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub day_of_week: Weekday,
}

impl TimeInterval {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime, day_of_week: Weekday) -> Self {
        Self {
            interval_id: uuid::Uuid::new_v4().to_string(),
            start_time,
            end_time,
            day_of_week,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// 展示用标签，例如 "MONDAY 08:00-09:40"
    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.day_of_week,
            self.start_time.format(CLOCK_FORMAT),
            self.end_time.format(CLOCK_FORMAT)
        )
    }
}

/// 时间段局部更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeIntervalPatch {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub day_of_week: Option<Weekday>,
}

impl TimeIntervalPatch {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none() && self.day_of_week.is_none()
    }

    /// 合并到现有时间段，返回合并后的新值（不修改原值）
    pub fn apply_to(&self, current: &TimeInterval) -> TimeInterval {
        TimeInterval {
            interval_id: current.interval_id.clone(),
            start_time: self.start_time.unwrap_or(current.start_time),
            end_time: self.end_time.unwrap_or(current.end_time),
            day_of_week: self.day_of_week.unwrap_or(current.day_of_week),
        }
    }
}

/// 解析钟点字符串，接受 "HH:MM" 与 "HH:MM:SS"
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_clock_time(s).unwrap()
    }

    fn range(a: &str, b: &str) -> TimeRange {
        TimeRange::new(t(a), t(b))
    }

    #[test]
    fn test_overlap_contains_start() {
        assert!(intervals_overlap(&range("08:00", "09:40"), &range("09:00", "10:00")));
    }

    #[test]
    fn test_overlap_contains_end() {
        assert!(intervals_overlap(&range("08:00", "09:40"), &range("07:30", "08:30")));
    }

    #[test]
    fn test_overlap_full_containment() {
        // 场景: 周一 08:00-09:40 内嵌 08:30-09:00
        assert!(intervals_overlap(&range("08:00", "09:40"), &range("08:30", "09:00")));
        assert!(intervals_overlap(&range("08:30", "09:00"), &range("08:00", "09:40")));
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        assert!(!intervals_overlap(&range("08:00", "09:00"), &range("09:00", "10:00")));
        assert!(!intervals_overlap(&range("10:00", "11:00"), &range("08:00", "09:00")));
    }

    #[test]
    fn test_range_validity() {
        assert!(range("08:00", "08:01").is_valid());
        assert!(!range("08:00", "08:00").is_valid());
        assert!(!range("09:00", "08:00").is_valid());
    }

    #[test]
    fn test_patch_apply() {
        let current = TimeInterval::new(t("08:00"), t("09:40"), Weekday::Monday);
        let patch = TimeIntervalPatch {
            end_time: Some(t("10:00")),
            ..Default::default()
        };
        let merged = patch.apply_to(&current);
        assert_eq!(merged.interval_id, current.interval_id);
        assert_eq!(merged.start_time, t("08:00"));
        assert_eq!(merged.end_time, t("10:00"));
        assert_eq!(merged.day_of_week, Weekday::Monday);
        assert_eq!(merged.label(), "MONDAY 08:00-10:00");
    }

    #[test]
    fn test_parse_clock_time_with_seconds() {
        assert_eq!(parse_clock_time("13:30:00"), Some(t("13:30")));
        assert_eq!(parse_clock_time("25:00"), None);
    }
}
