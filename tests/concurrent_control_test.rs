// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证检查与写入之间的竞争由唯一约束兜底
// - 同一 (教学班, 日期) 并发停课只落一行
// - 同一 (时间段, 教室) 并发排课只有一个成功
// - 败者得到与串行请求相同的具体冲突错误
// ==========================================

mod helpers;
mod test_helpers;

#[cfg(test)]
mod concurrent_control_test {
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use class_scheduling::api::{ApiError, ErrorKind};
    use class_scheduling::app::AppState;
    use class_scheduling::domain::{Actor, ClassCancellation, ScheduleDraft, Weekday};
    use class_scheduling::engine::FixedClock;
    use class_scheduling::repository::{CancellationRepository, RepositoryError};

    use crate::helpers::api_test_helper::*;
    use crate::test_helpers::*;

    const THREADS: usize = 8;

    // ==========================================
    // 停课
    // ==========================================

    #[test]
    fn test_concurrent_cancel_same_date() {
        let env = ApiTestEnv::new().expect("无法创建测试环境");
        let wed = env.create_interval(Weekday::Wednesday, hm(8, 0), hm(9, 40));
        let x = env.create_class(TEACHER_WANG, SUBJECT_MATH, vec![ScheduleDraft::new(&wed, ROOM_101)]);
        let class_id = x.class.class_id.as_str();
        let barrier = Barrier::new(THREADS);

        let results: Vec<Result<usize, ApiError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let api = &env.state.cancellation_api;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        api.cancel(
                            class_id,
                            &[date(2024, 3, 6)],
                            &format!("并发停课 #{}", i),
                            &Actor::teacher(TEACHER_WANG),
                        )
                        .map(|rows| rows.len())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 1, "只有一个请求应当成功");
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::Conflict, "败者应为 Conflict: {:?}", err);
            match err {
                ApiError::AlreadyCancelled { class_id: id, dates } => {
                    assert_eq!(id, class_id);
                    assert_eq!(dates, &vec![date(2024, 3, 6)]);
                }
                other => panic!("败者应得到已停课的具体日期: {:?}", other),
            }
        }

        let rows = env
            .state
            .cancellation_api
            .list_cancellations(class_id, &env.admin())
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let env = ApiTestEnv::new().expect("无法创建测试环境");
        let wed = env.create_interval(Weekday::Wednesday, hm(8, 0), hm(9, 40));
        let x = env.create_class(TEACHER_WANG, SUBJECT_MATH, vec![ScheduleDraft::new(&wed, ROOM_101)]);

        // 另一条连接模拟绕过应用层检查的并发写入者
        let conn = open_test_connection(&env.state.db_path).unwrap();
        let repo = CancellationRepository::new(Arc::new(Mutex::new(conn)));
        let now = date(2024, 2, 20).and_hms_opt(8, 0, 0).unwrap();
        let row = |reason: &str| {
            ClassCancellation::new(&x.class.class_id, date(2024, 3, 6), reason, TEACHER_WANG, now)
        };

        repo.batch_insert(&[row("第一次")]).unwrap();
        let err = repo
            .batch_insert(&[row("第二次"), row("第三次")])
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(ApiError::from(err).kind(), ErrorKind::Conflict);

        // 批量写入整体回滚
        assert_eq!(repo.find_by_class(&x.class.class_id).unwrap().len(), 1);
    }

    // ==========================================
    // 排课
    // ==========================================

    #[test]
    fn test_concurrent_room_booking_two_processes() {
        let env = ApiTestEnv::new().expect("无法创建测试环境");
        let t = env.create_interval(Weekday::Monday, hm(8, 0), hm(9, 40));

        // 第二个 AppState 使用独立连接，相当于另一个进程
        let other = AppState::with_clock(
            env.state.db_path.clone(),
            Arc::new(FixedClock::on(date(2024, 2, 20))),
        )
        .unwrap();

        let barrier = Barrier::new(2);
        let requests = [
            (&env.state, TEACHER_WANG, SUBJECT_MATH),
            (&other, TEACHER_LI, SUBJECT_PHYS),
        ];

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = requests
                .iter()
                .map(|(state, teacher, subject)| {
                    let barrier = &barrier;
                    let t = t.as_str();
                    s.spawn(move || {
                        barrier.wait();
                        state.class_api.create_with_schedules(
                            class_draft(subject, None, subject),
                            vec![ScheduleDraft::new(t, ROOM_101)],
                            &Actor::teacher(*teacher),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "同一教室同一时间段只能排一个教学班");
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::Conflict, "败者应为 Conflict: {:?}", err);
            match err {
                ApiError::RoomConflict {
                    room_id,
                    time_interval_id,
                    class_id,
                } => {
                    assert_eq!(room_id, ROOM_101);
                    assert_eq!(time_interval_id, &t);
                    assert_eq!(class_id, &winners[0].class.class_id, "应指出占用教室的教学班");
                }
                other => panic!("败者应得到教室冲突: {:?}", other),
            }
        }

        // 败者的教学班行随事务回滚
        let classes = env.state.class_api.list_classes(None, &env.admin()).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].class.class_id, winners[0].class.class_id);
        assert!(!env
            .state
            .availability_api
            .is_room_available(ROOM_101, &t)
            .unwrap());
    }
}
