// ==========================================
// 排课核心 - 领域类型定义
// ==========================================
// 星期、角色、操作者等跨模块共享的基础类型
// 星期换算统一在此处完成，其他模块不得自行映射
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 星期 (Weekday)
// ==========================================
// 编号采用 ISO 约定: 周一=1 ... 周日=7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// ISO 编号 (1-7)
    pub fn number(&self) -> u8 {
        match self {
            Weekday::Monday => 1,
            Weekday::Tuesday => 2,
            Weekday::Wednesday => 3,
            Weekday::Thursday => 4,
            Weekday::Friday => 5,
            Weekday::Saturday => 6,
            Weekday::Sunday => 7,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1..=7 => Some(Self::ALL[(n - 1) as usize]),
            _ => None,
        }
    }

    /// 数据库存储格式
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        }
    }

    /// 宽松解析
    ///
    /// 支持: 全称/缩写(不区分大小写)、ISO 编号、中文(周一/星期一)
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_number(n);
        }

        let upper = s.to_uppercase();
        let found = match upper.as_str() {
            "MONDAY" | "MON" | "周一" | "星期一" => Weekday::Monday,
            "TUESDAY" | "TUE" | "TUES" | "周二" | "星期二" => Weekday::Tuesday,
            "WEDNESDAY" | "WED" | "周三" | "星期三" => Weekday::Wednesday,
            "THURSDAY" | "THU" | "THUR" | "THURS" | "周四" | "星期四" => Weekday::Thursday,
            "FRIDAY" | "FRI" | "周五" | "星期五" => Weekday::Friday,
            "SATURDAY" | "SAT" | "周六" | "星期六" => Weekday::Saturday,
            "SUNDAY" | "SUN" | "周日" | "周天" | "星期日" | "星期天" => Weekday::Sunday,
            _ => return None,
        };
        Some(found)
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(w: chrono::Weekday) -> Self {
        match w {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 用户角色 (Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,   // 教务管理员
    Teacher, // 任课教师
    Student, // 学生
}

impl Role {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }

    /// 从目录服务的角色字符串解析（不区分大小写）
    ///
    /// 历史数据中教师角色存在 "professor" 写法，一并兼容
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" | "ADMINISTRATOR" => Some(Role::Admin),
            "TEACHER" | "PROFESSOR" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 操作者 (Actor)
// ==========================================
// 身份认证由外部完成，核心只接收已认证的 (user_id, role)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn teacher(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Teacher)
    }

    pub fn student(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Student)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    #[test]
    fn test_weekday_parse_variants() {
        assert_eq!(Weekday::parse("monday"), Some(Weekday::Monday));
        assert_eq!(Weekday::parse(" Wed "), Some(Weekday::Wednesday));
        assert_eq!(Weekday::parse("7"), Some(Weekday::Sunday));
        assert_eq!(Weekday::parse("星期四"), Some(Weekday::Thursday));
        assert_eq!(Weekday::parse("0"), None);
        assert_eq!(Weekday::parse("someday"), None);
    }

    #[test]
    fn test_weekday_from_chrono() {
        // 2024-03-06 是周三
        let d = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert_eq!(Weekday::from(d.weekday()), Weekday::Wednesday);
        assert_eq!(Weekday::Wednesday.number(), 3);
    }

    #[test]
    fn test_role_from_db_str() {
        assert_eq!(Role::from_db_str("admin"), Some(Role::Admin));
        assert_eq!(Role::from_db_str("Professor"), Some(Role::Teacher));
        assert_eq!(Role::from_db_str("STUDENT"), Some(Role::Student));
        assert_eq!(Role::from_db_str("guest"), None);
    }
}
