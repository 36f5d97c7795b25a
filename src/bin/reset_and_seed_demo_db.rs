use chrono::{Datelike, Duration, Local, NaiveTime};
use std::error::Error;
use std::fs;
use std::path::Path;

use class_scheduling::app::{get_default_db_path, AppState};
use class_scheduling::domain::{
    Actor, Building, ClassDraft, DirectoryUser, Role, Room, ScheduleDraft, Subject, Term, Weekday,
};

const ADMIN_ID: &str = "admin-01";
const TERM_ID: &str = "TERM-DEMO";

/// 标准节次（开始, 结束）
const PERIODS: [(u32, u32, u32, u32); 4] = [(8, 0, 9, 30), (10, 0, 11, 30), (14, 0, 15, 30), (16, 0, 17, 30)];

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    seed_directory(&state)?;
    let interval_ids = seed_intervals(&state)?;
    seed_classes(&state, &interval_ids)?;

    print_quick_counts(&state)?;
    eprintln!("Seeded {}", db_path);
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_directory(state: &AppState) -> Result<(), Box<dyn Error>> {
    let repo = &state.directory_repo;
    let today = Local::now().date_naive();

    // 学期覆盖今天前后各 60 天，便于演示停课
    repo.upsert_term(&Term {
        term_id: TERM_ID.to_string(),
        year: today.year(),
        sequence_number: 1,
        start_date: today - Duration::days(60),
        end_date: today + Duration::days(60),
    })?;

    for (building_id, name) in [("B-MAIN", "主教学楼"), ("B-LAB", "实验楼")] {
        repo.upsert_building(&Building {
            building_id: building_id.to_string(),
            name: name.to_string(),
        })?;
    }
    for (room_id, building_id, name, capacity) in [
        ("R-101", "B-MAIN", "101", 60),
        ("R-102", "B-MAIN", "102", 60),
        ("R-201", "B-MAIN", "201", 120),
        ("R-L1", "B-LAB", "实验室一", 30),
    ] {
        repo.upsert_room(&Room {
            room_id: room_id.to_string(),
            building_id: building_id.to_string(),
            name: name.to_string(),
            capacity: Some(capacity),
        })?;
    }
    for (subject_id, name) in [
        ("SUB-MATH", "高等数学"),
        ("SUB-LA", "线性代数"),
        ("SUB-PHY", "大学物理"),
    ] {
        repo.upsert_subject(&Subject {
            subject_id: subject_id.to_string(),
            name: name.to_string(),
        })?;
    }

    let mut users = vec![
        (ADMIN_ID.to_string(), "教务处".to_string(), Role::Admin),
        ("tch-01".to_string(), "王老师".to_string(), Role::Teacher),
        ("tch-02".to_string(), "李老师".to_string(), Role::Teacher),
    ];
    for i in 1..=12 {
        users.push((format!("stu-{:02}", i), format!("学生{:02}", i), Role::Student));
    }
    for (user_id, name, role) in users {
        repo.upsert_user(&DirectoryUser {
            email: format!("{}@example.edu", user_id),
            user_id,
            name,
            role,
        })?;
    }
    Ok(())
}

/// 周一至周五 × 4 个节次；返回 (星期, 节次序号) → interval_id
fn seed_intervals(state: &AppState) -> Result<Vec<(Weekday, usize, String)>, Box<dyn Error>> {
    let admin = Actor::admin(ADMIN_ID);
    let mut ids = Vec::new();
    for day in &Weekday::ALL[..5] {
        for (idx, (sh, sm, eh, em)) in PERIODS.iter().enumerate() {
            let start = NaiveTime::from_hms_opt(*sh, *sm, 0).ok_or("bad period")?;
            let end = NaiveTime::from_hms_opt(*eh, *em, 0).ok_or("bad period")?;
            let interval = state.time_interval_api.create(start, end, *day, &admin)?;
            ids.push((*day, idx, interval.interval_id));
        }
    }
    Ok(ids)
}

fn seed_classes(
    state: &AppState,
    interval_ids: &[(Weekday, usize, String)],
) -> Result<(), Box<dyn Error>> {
    let admin = Actor::admin(ADMIN_ID);
    let slot = |day: Weekday, period: usize| -> Result<String, Box<dyn Error>> {
        interval_ids
            .iter()
            .find(|(d, p, _)| *d == day && *p == period)
            .map(|(_, _, id)| id.clone())
            .ok_or_else(|| format!("缺少时间段 {} #{}", day, period).into())
    };

    let plans = [
        (
            "tch-01",
            "SUB-MATH",
            "高等数学 A 班",
            vec![(Weekday::Monday, 0, "R-201"), (Weekday::Wednesday, 0, "R-201")],
        ),
        (
            "tch-01",
            "SUB-LA",
            "线性代数 1 班",
            vec![(Weekday::Tuesday, 1, "R-101")],
        ),
        (
            "tch-02",
            "SUB-PHY",
            "大学物理实验",
            vec![(Weekday::Thursday, 2, "R-L1"), (Weekday::Friday, 2, "R-L1")],
        ),
    ];

    for (teacher_id, subject_id, name, slots) in plans {
        let mut drafts = Vec::new();
        for (day, period, room) in slots {
            drafts.push(ScheduleDraft::new(slot(day, period)?, room));
        }
        let detail = state.class_api.create_with_schedules(
            ClassDraft {
                subject_id: subject_id.to_string(),
                term_id: TERM_ID.to_string(),
                teacher_id: Some(teacher_id.to_string()),
                name: name.to_string(),
            },
            drafts,
            &admin,
        )?;

        for i in 1..=6 {
            state
                .directory_repo
                .enroll_student(&detail.class.class_id, &format!("stu-{:02}", i))?;
        }
    }
    Ok(())
}

fn print_quick_counts(state: &AppState) -> Result<(), Box<dyn Error>> {
    let admin = Actor::admin(ADMIN_ID);
    let intervals = state.time_interval_api.list(None)?;
    let classes = state.class_api.list_classes(Some(TERM_ID), &admin)?;
    eprintln!("time_intervals: {}", intervals.len());
    eprintln!("classes: {}", classes.len());
    for detail in classes {
        eprintln!(
            "  {} ({}): {} 条排课",
            detail.class.name,
            detail.class.class_id,
            detail.schedules.len()
        );
    }
    Ok(())
}
