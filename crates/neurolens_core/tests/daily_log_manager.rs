use neurolens_core::db::open_db_in_memory;
use neurolens_core::{
    CyclePhase, DailyLog, DailyLogManager, DateKey, LogId, LogRepository, LogServiceError,
    ManagerConfig, ManualClock, RepoError, RepoResult, SaveStatus, ScratchStore,
    SqliteLogRepository, SqliteScratchStore, SymptomKey, TODAY_DRAFT_KEY,
};
use rusqlite::Connection;
use std::cell::Cell;

const JAN_10_NOON_MS: i64 = 1_736_510_400_000;

type SqliteManager<'a> =
    DailyLogManager<SqliteLogRepository<'a>, SqliteScratchStore<'a>, &'a ManualClock>;

fn day(value: &str) -> DateKey {
    DateKey::parse(value).unwrap()
}

fn open_manager<'a>(conn: &'a Connection, clock: &'a ManualClock) -> SqliteManager<'a> {
    open_manager_with(conn, clock, ManagerConfig::default())
}

fn open_manager_with<'a>(
    conn: &'a Connection,
    clock: &'a ManualClock,
    config: ManagerConfig,
) -> SqliteManager<'a> {
    DailyLogManager::open(
        "user-1",
        SqliteLogRepository::try_new(conn).unwrap(),
        SqliteScratchStore::try_new(conn).unwrap(),
        clock,
        config,
    )
    .unwrap()
}

/// Delegates to SQLite but can be told to fail reads or writes.
struct FlakyRepo<'c> {
    inner: SqliteLogRepository<'c>,
    fail_writes: Cell<bool>,
    fail_reads: Cell<bool>,
}

impl<'c> FlakyRepo<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            inner: SqliteLogRepository::try_new(conn).unwrap(),
            fail_writes: Cell::new(false),
            fail_reads: Cell::new(false),
        }
    }
}

impl LogRepository for FlakyRepo<'_> {
    fn get_logs(&self, user_id: &str) -> RepoResult<Vec<DailyLog>> {
        if self.fail_reads.get() {
            return Err(RepoError::Backend("offline".to_string()));
        }
        self.inner.get_logs(user_id)
    }

    fn put_log(&self, user_id: &str, log: &DailyLog) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(RepoError::Backend("offline".to_string()));
        }
        self.inner.put_log(user_id, log)
    }

    fn delete_log(&self, user_id: &str, id: LogId) -> RepoResult<()> {
        self.inner.delete_log(user_id, id)
    }
}

struct BrokenScratch;

impl ScratchStore for BrokenScratch {
    fn read_slot(&self, _key: &str) -> RepoResult<Option<String>> {
        Err(RepoError::Backend("quota exceeded".to_string()))
    }

    fn write_slot(&self, _key: &str, _value: &str) -> RepoResult<()> {
        Err(RepoError::Backend("quota exceeded".to_string()))
    }
}

#[test]
fn saving_twice_on_same_day_updates_one_log_in_place() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);

    manager.set_rating(SymptomKey::SensoryOverload, 4).unwrap();
    manager.set_phase(CyclePhase::Luteal);
    manager.set_notes("loud office");
    let first = manager.save();

    assert!(first.created);
    assert_eq!(first.status, SaveStatus::Saved);
    assert_eq!(manager.history().len(), 1);
    let log = &manager.history()[0];
    assert_eq!(log.date_key.to_string(), "2025-01-10");
    assert_eq!(log.ratings.get(SymptomKey::SensoryOverload), 4);
    assert_eq!(log.phase, CyclePhase::Luteal);
    let first_saved_at = log.saved_at;

    clock.advance_ms(60_000);
    manager.set_notes("quiet office");
    let second = manager.save();

    assert!(!second.created);
    assert_eq!(second.log_id, first.log_id);
    assert_eq!(manager.history().len(), 1);
    assert_eq!(manager.history()[0].notes, "quiet office");
    assert!(manager.history()[0].saved_at > first_saved_at);

    let stored = SqliteLogRepository::try_new(&conn)
        .unwrap()
        .get_logs("user-1")
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, first.log_id);
    assert_eq!(stored[0].notes, "quiet office");
}

#[test]
fn saves_on_distinct_days_keep_one_log_per_day() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);

    manager.set_rating(SymptomKey::Hyperfocus, 2).unwrap();
    manager.save();
    manager.save();
    clock.set_today(day("2025-01-11"));
    clock.advance_ms(86_400_000);
    manager.set_rating(SymptomKey::Hyperfocus, 5).unwrap();
    manager.save();
    manager.save();

    let mut keys = manager
        .history()
        .iter()
        .map(|log| log.date_key.to_string())
        .collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, vec!["2025-01-10", "2025-01-11"]);
    assert_eq!(manager.history()[0].date_key, day("2025-01-11"));
}

#[test]
fn out_of_range_rating_is_rejected_and_draft_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);
    manager.set_rating(SymptomKey::SocialBurnout, 3).unwrap();
    let before = manager.draft().clone();

    for value in [6, -1, 100] {
        let err = manager
            .set_rating(SymptomKey::SocialBurnout, value)
            .unwrap_err();
        assert_eq!(
            err,
            LogServiceError::RatingOutOfRange {
                symptom: SymptomKey::SocialBurnout,
                value
            }
        );
    }
    assert_eq!(manager.draft(), &before);
}

#[test]
fn reopening_before_save_restores_most_recent_draft() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    {
        let mut manager = open_manager(&conn, &clock);
        manager.set_rating(SymptomKey::HighMasking, 1).unwrap();
        manager.set_rating(SymptomKey::HighMasking, 4).unwrap();
        manager.set_phase(CyclePhase::Follicular);
        manager.set_phase(CyclePhase::Ovulatory);
        manager.set_notes("first");
        manager.set_notes("second");
    }

    let reopened = open_manager(&conn, &clock);
    let draft = reopened.draft();
    assert_eq!(draft.ratings.get(SymptomKey::HighMasking), 4);
    assert_eq!(draft.phase, CyclePhase::Ovulatory);
    assert_eq!(draft.notes, "second");
    assert!(reopened.history().is_empty());
    assert_eq!(reopened.status(), SaveStatus::Unsaved);
}

#[test]
fn draft_from_previous_day_is_not_restored() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    {
        let mut manager = open_manager(&conn, &clock);
        manager.set_notes("yesterday's notes");
    }

    clock.set_today(day("2025-01-11"));
    let reopened = open_manager(&conn, &clock);
    assert_eq!(reopened.draft().notes, "");
    assert_eq!(reopened.draft().date_key, day("2025-01-11"));
}

#[test]
fn malformed_or_invalid_draft_is_ignored() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let scratch = SqliteScratchStore::try_new(&conn).unwrap();

    scratch.write_slot(TODAY_DRAFT_KEY, "{not json").unwrap();
    assert_eq!(open_manager(&conn, &clock).draft().notes, "");

    scratch
        .write_slot(
            TODAY_DRAFT_KEY,
            r#"{"date_key":"2025-01-10","ratings":{"hyperfocus":7},"phase":"luteal","notes":"x"}"#,
        )
        .unwrap();
    let manager = open_manager(&conn, &clock);
    assert_eq!(manager.draft().ratings.get(SymptomKey::Hyperfocus), 0);
    assert_eq!(manager.draft().phase, CyclePhase::NotApplicable);
}

#[test]
fn load_then_save_targets_today_instead_of_loaded_log() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);
    manager.set_rating(SymptomKey::ExecutiveDysfunction, 3).unwrap();
    manager.set_notes("tuesday");
    let past = manager.save();

    clock.set_today(day("2025-01-11"));
    clock.advance_ms(86_400_000);
    manager.load(past.log_id).unwrap();
    assert_eq!(manager.draft().notes, "tuesday");
    assert_eq!(manager.draft().date_key, day("2025-01-11"));
    assert_eq!(manager.active_log_id(), Some(past.log_id));
    assert!(!manager.is_dirty());

    let resaved = manager.save();
    assert!(resaved.created);
    assert_ne!(resaved.log_id, past.log_id);
    assert_eq!(resaved.date_key, day("2025-01-11"));
    assert_eq!(manager.history().len(), 2);

    let older_log = manager
        .history()
        .iter()
        .find(|log| log.id == past.log_id)
        .unwrap();
    assert_eq!(older_log.date_key, day("2025-01-10"));
    assert_eq!(older_log.saved_at, JAN_10_NOON_MS);
}

#[test]
fn load_then_save_on_same_day_keeps_todays_id() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);
    manager.set_notes("today");
    let today_log = manager.save();

    manager.start_new_log();
    manager.load(today_log.log_id).unwrap();
    let resaved = manager.save();
    assert_eq!(resaved.log_id, today_log.log_id);
    assert!(!resaved.created);
}

#[test]
fn load_unknown_log_is_an_error() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);

    let missing = uuid::Uuid::new_v4();
    assert_eq!(
        manager.load(missing).unwrap_err(),
        LogServiceError::LogNotFound(missing)
    );
}

#[test]
fn edits_mark_draft_dirty_and_clear_active_log() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);
    assert!(manager.is_dirty());

    let receipt = manager.save();
    assert!(!manager.is_dirty());
    assert_eq!(manager.active_log_id(), Some(receipt.log_id));

    manager.clear_rating(SymptomKey::Hyperfocus);
    assert!(manager.is_dirty());
    assert_eq!(manager.active_log_id(), None);
}

#[test]
fn start_new_log_resets_draft_to_defaults() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = open_manager(&conn, &clock);
    manager.set_rating(SymptomKey::SensoryOverload, 5).unwrap();
    manager.set_phase(CyclePhase::Menstrual);
    manager.set_notes("busy");

    manager.start_new_log();
    assert_eq!(manager.draft().ratings.total(), 0);
    assert_eq!(manager.draft().phase, CyclePhase::NotApplicable);
    assert_eq!(manager.draft().notes, "");
    assert_eq!(manager.status(), SaveStatus::Unsaved);
}

#[test]
fn failed_remote_write_keeps_local_history_and_reports_retryable_status() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let repo = FlakyRepo::new(&conn);
    let scratch = SqliteScratchStore::try_new(&conn).unwrap();
    let mut manager =
        DailyLogManager::open("user-1", &repo, scratch, &clock, ManagerConfig::default())
            .unwrap();

    repo.fail_writes.set(true);
    manager.set_notes("offline entry");
    let failed = manager.save();
    assert_eq!(failed.status, SaveStatus::Failed);
    assert_eq!(manager.status(), SaveStatus::Failed);
    assert!(manager.is_dirty());
    assert_eq!(manager.history().len(), 1);
    assert!(repo.get_logs("user-1").unwrap().is_empty());

    repo.fail_writes.set(false);
    let retried = manager.save();
    assert_eq!(retried.status, SaveStatus::Saved);
    assert_eq!(retried.log_id, failed.log_id);
    assert_eq!(repo.get_logs("user-1").unwrap().len(), 1);
}

#[test]
fn failed_write_defers_retention_deletes_until_a_save_commits() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-01"), JAN_10_NOON_MS);
    let repo = FlakyRepo::new(&conn);
    let config = ManagerConfig {
        max_retained_logs: 2,
        ..ManagerConfig::default()
    };
    let mut manager = DailyLogManager::open(
        "user-1",
        &repo,
        SqliteScratchStore::try_new(&conn).unwrap(),
        &clock,
        config,
    )
    .unwrap();

    let first = manager.save();
    clock.set_today(day("2025-01-02"));
    clock.advance_ms(1_000);
    manager.save();

    repo.fail_writes.set(true);
    clock.set_today(day("2025-01-03"));
    clock.advance_ms(1_000);
    let failed = manager.save();
    assert_eq!(failed.status, SaveStatus::Failed);
    assert_eq!(failed.evicted, vec![first.log_id]);
    assert_eq!(manager.history().len(), 2);
    assert_eq!(repo.get_logs("user-1").unwrap().len(), 2);

    repo.fail_writes.set(false);
    let retried = manager.save();
    assert_eq!(retried.status, SaveStatus::Saved);
    assert_eq!(retried.log_id, failed.log_id);

    let mut stored = repo
        .get_logs("user-1")
        .unwrap()
        .into_iter()
        .map(|log| log.date_key.to_string())
        .collect::<Vec<_>>();
    stored.sort();
    assert_eq!(stored, vec!["2025-01-02", "2025-01-03"]);
}

#[test]
fn save_after_degraded_open_reuses_stored_log_for_today() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let repo = FlakyRepo::new(&conn);
    let stored_id = {
        let mut manager = open_manager(&conn, &clock);
        manager.set_notes("morning");
        manager.save().log_id
    };

    repo.fail_reads.set(true);
    let mut manager = DailyLogManager::open(
        "user-1",
        &repo,
        SqliteScratchStore::try_new(&conn).unwrap(),
        &clock,
        ManagerConfig::default(),
    )
    .unwrap();
    assert!(manager.history().is_empty());

    repo.fail_reads.set(false);
    clock.advance_ms(60_000);
    manager.set_notes("evening");
    let first = manager.save();
    assert_eq!(first.status, SaveStatus::Saved);
    assert_eq!(first.log_id, stored_id);
    assert!(!first.created);
    assert_eq!(manager.save().status, SaveStatus::Saved);

    let stored = repo.get_logs("user-1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, stored_id);
    assert_eq!(stored[0].notes, "evening");
}

#[test]
fn history_read_failure_starts_with_empty_history() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let repo = FlakyRepo::new(&conn);
    repo.fail_reads.set(true);

    let manager = DailyLogManager::open(
        "user-1",
        repo,
        SqliteScratchStore::try_new(&conn).unwrap(),
        &clock,
        ManagerConfig::default(),
    )
    .unwrap();
    assert!(manager.history().is_empty());
}

#[test]
fn scratch_failures_do_not_block_in_memory_edits() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let mut manager = DailyLogManager::open(
        "user-1",
        SqliteLogRepository::try_new(&conn).unwrap(),
        BrokenScratch,
        &clock,
        ManagerConfig::default(),
    )
    .unwrap();

    manager.set_rating(SymptomKey::Hyperfocus, 5).unwrap();
    assert_eq!(manager.draft().ratings.get(SymptomKey::Hyperfocus), 5);
    assert_eq!(manager.save().status, SaveStatus::Saved);
}

#[test]
fn retention_cap_evicts_oldest_days_first() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-01"), JAN_10_NOON_MS);
    let config = ManagerConfig {
        max_retained_logs: 3,
        ..ManagerConfig::default()
    };
    let mut manager = open_manager_with(&conn, &clock, config);

    let mut evicted = Vec::new();
    for date in ["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05"] {
        clock.set_today(day(date));
        clock.advance_ms(1_000);
        evicted.extend(manager.save().evicted);
    }

    assert_eq!(evicted.len(), 2);
    let mut kept = manager
        .history()
        .iter()
        .map(|log| log.date_key.to_string())
        .collect::<Vec<_>>();
    kept.sort();
    assert_eq!(kept, vec!["2025-01-03", "2025-01-04", "2025-01-05"]);

    let stored = SqliteLogRepository::try_new(&conn)
        .unwrap()
        .get_logs("user-1")
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|log| !evicted.contains(&log.id)));
}

#[test]
fn retention_never_evicts_the_log_being_saved() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let config = ManagerConfig {
        max_retained_logs: 1,
        ..ManagerConfig::default()
    };
    let mut manager = open_manager_with(&conn, &clock, config);
    let later = manager.save();

    // Clock moved backwards, so today's key is older than the stored one.
    clock.set_today(day("2025-01-05"));
    clock.advance_ms(1_000);
    let earlier = manager.save();

    assert!(earlier.created);
    assert_eq!(earlier.evicted, vec![later.log_id]);
    assert_eq!(manager.history().len(), 1);
    assert_eq!(manager.history()[0].id, earlier.log_id);

    let stored = SqliteLogRepository::try_new(&conn)
        .unwrap()
        .get_logs("user-1")
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, earlier.log_id);
}

#[test]
fn loaded_values_are_restored_after_reopen() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let past = {
        let mut manager = open_manager(&conn, &clock);
        manager.set_rating(SymptomKey::SocialBurnout, 3).unwrap();
        manager.set_phase(CyclePhase::Menstrual);
        manager.set_notes("long meeting");
        manager.save()
    };

    clock.set_today(day("2025-01-11"));
    clock.advance_ms(86_400_000);
    {
        let mut manager = open_manager(&conn, &clock);
        manager.start_new_log();
        manager.load(past.log_id).unwrap();
    }

    let reopened = open_manager(&conn, &clock);
    let draft = reopened.draft();
    assert_eq!(draft.date_key, day("2025-01-11"));
    assert_eq!(draft.ratings.get(SymptomKey::SocialBurnout), 3);
    assert_eq!(draft.phase, CyclePhase::Menstrual);
    assert_eq!(draft.notes, "long meeting");
}

#[test]
fn reopening_loads_saved_history() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);
    let saved = {
        let mut manager = open_manager(&conn, &clock);
        manager.set_rating(SymptomKey::SensoryOverload, 4).unwrap();
        manager.set_notes("loud\noffice");
        manager.save()
    };

    let reopened = open_manager(&conn, &clock);
    let summaries = reopened.history_summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, saved.log_id);
    assert_eq!(summaries[0].total_stars, 4);
    assert_eq!(summaries[0].notes_preview.as_deref(), Some("loud office"));
}

#[test]
fn blank_user_id_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new(day("2025-01-10"), JAN_10_NOON_MS);

    let result = DailyLogManager::open(
        "   ",
        SqliteLogRepository::try_new(&conn).unwrap(),
        SqliteScratchStore::try_new(&conn).unwrap(),
        &clock,
        ManagerConfig::default(),
    );
    assert!(matches!(result, Err(LogServiceError::InvalidUserId(_))));
}
