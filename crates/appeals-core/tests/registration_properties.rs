use appeals_core::{
    Actor, Appeal, AppealRegistrar, AppealStore, AuditLog, AppealEventAction, DepartmentId,
    Directory, InProcessStore, JsonlStore, RegistrationError, RegistrationRequest, RetryPolicy,
    Scope, SectionId, scope_lock_path,
};
use chrono::{DateTime, TimeZone, Utc};
use fs2::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "appeals-core-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const SECTION: SectionId = SectionId(1);

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("fixed time")
}

fn directory() -> Directory {
    Directory::new()
        .with_department(DepartmentId(1), "Electronic", Some("e"))
        .with_department(DepartmentId(2), "Collegium", Some("Kol"))
        .with_section(SECTION, "Section A", 5)
        .with_section(SectionId(2), "Section B", 6)
}

fn clerk() -> Actor {
    Actor {
        user_id: Some(7),
        user_name: "clerk".to_string(),
        default_section: Some(SECTION),
    }
}

fn request(name: &str, year: i32) -> RegistrationRequest {
    RegistrationRequest {
        submitted_by_name: name.to_string(),
        department_id: None,
        section: None,
        submission_date: Some(at(year, 4, 15)),
        appeal_index_code: Some(3),
        now: at(year, 4, 15),
    }
}

fn in_process() -> AppealRegistrar<InProcessStore, Directory> {
    AppealRegistrar::new(InProcessStore::new(), directory()).with_retry(RetryPolicy::no_retry())
}

fn register<S: AppealStore>(registrar: &AppealRegistrar<S, Directory>, name: &str) -> Appeal {
    registrar
        .register(&clerk(), &request(name, 2026))
        .expect("registration should succeed")
}

#[test]
fn first_appeal_in_scope_gets_one() {
    let registrar = in_process();
    let first = register(&registrar, "Rauf");
    assert_eq!(first.sequence_number, 1);
    assert_eq!(first.registration_code, "3-25-5/1-R-1-3/2026");

    let next_year = registrar
        .register(&clerk(), &request("Rauf", 2027))
        .expect("registration should succeed");
    assert_eq!(next_year.sequence_number, 1);
    assert!(!next_year.is_repeat);
}

#[test]
fn non_repeats_number_one_through_n() {
    let registrar = in_process();
    let numbers: Vec<u32> = (0..6)
        .map(|i| register(&registrar, &format!("Person {i}")).sequence_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn repeat_groups_under_high_water_mark() {
    let registrar = in_process();
    register(&registrar, "Məmmədov Rauf");
    register(&registrar, "Əliyev Anar");
    register(&registrar, "Quliyev Samir");

    let repeat = register(&registrar, "  MƏMMƏDOV RAUF");
    assert!(repeat.is_repeat);
    assert_eq!(repeat.sequence_number, 3);
    // Number part links to the original submission, suffix counts submissions.
    assert_eq!(repeat.registration_code, "3-25-5/1- -1/2-3/2026");

    let third = register(&registrar, "Məmmədov Rauf");
    assert_eq!(third.sequence_number, 3);
    assert_eq!(third.registration_code, "3-25-5/1-M-1/3-3/2026");

    let fresh = register(&registrar, "New Person");
    assert_eq!(fresh.sequence_number, 4);
    assert!(!fresh.is_repeat);
}

#[test]
fn non_repeat_numbers_are_unique_within_scope() {
    let registrar = in_process();
    for name in ["A", "B", "A", "C", "B", "D", "", ""] {
        register(&registrar, name);
    }

    let rows = registrar.store().snapshot().expect("snapshot");
    let fresh: Vec<u32> = rows
        .iter()
        .filter(|row| !row.is_repeat)
        .map(|row| row.sequence_number)
        .collect();
    let distinct: BTreeSet<u32> = fresh.iter().copied().collect();
    assert_eq!(distinct.len(), fresh.len());
}

#[test]
fn soft_deleted_history_is_forgotten() {
    let registrar = in_process();
    let actor = clerk();
    let first = register(&registrar, "Rauf");
    let second = register(&registrar, "rauf");
    assert!(second.is_repeat);

    for appeal in [&first, &second] {
        registrar
            .soft_delete(&appeal.id, &actor, at(2026, 5, 1))
            .expect("delete should succeed");
    }

    let again = register(&registrar, "Rauf");
    assert!(!again.is_repeat);
    assert_eq!(again.sequence_number, 1);

    // Deleted rows keep what they were issued.
    let stored = registrar.find(&first.id).expect("row still stored");
    assert!(stored.is_deleted);
    assert_eq!(stored.registration_code, first.registration_code);
}

#[test]
fn blank_names_never_repeat() {
    let registrar = in_process();
    let first = register(&registrar, "");
    let second = register(&registrar, "   ");
    assert!(!first.is_repeat);
    assert!(!second.is_repeat);
    assert_eq!(second.sequence_number, 2);
    assert_eq!(second.registration_code, "3-25-5/1- -2-3/2026");
}

#[test]
fn department_sign_shapes_code() {
    let registrar = in_process();
    let mut electronic = request("Rauf", 2026);
    electronic.department_id = Some(DepartmentId(1));
    electronic.appeal_index_code = Some(10);
    let appeal = registrar.register(&clerk(), &electronic).expect("registers");
    assert_eq!(appeal.registration_code, "3-25-e/1-R-1-10/2026");

    let mut kol = request("Anar", 2026);
    kol.department_id = Some(DepartmentId(2));
    kol.appeal_index_code = None;
    let appeal = registrar.register(&clerk(), &kol).expect("registers");
    assert_eq!(appeal.registration_code, "3-25-5/1-Kol-2-0/2026");

    let mut unknown = request("Samir", 2026);
    unknown.department_id = Some(DepartmentId(99));
    unknown.section = Some(SectionId(42));
    let appeal = registrar.register(&clerk(), &unknown).expect("registers");
    assert_eq!(appeal.registration_code, "3-25-0/1-S-1-3/2026");
}

#[test]
fn missing_scope_is_reported() {
    let registrar = in_process();
    let err = registrar
        .register(&Actor::new("visitor"), &request("Rauf", 2026))
        .expect_err("no scope must fail");
    assert!(matches!(err, RegistrationError::MissingScope));
}

fn assert_one_through_n(mut numbers: Vec<u32>, n: u32) {
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=n).collect::<Vec<_>>());
}

fn register_concurrently<S>(registrar: Arc<AppealRegistrar<S, Directory>>, workers: usize) -> Vec<Appeal>
where
    S: AppealStore + 'static,
{
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let registrar = Arc::clone(&registrar);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registrar
                    .register(&clerk(), &request(&format!("Worker {worker}"), 2026))
                    .expect("concurrent registration should succeed")
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().expect("worker should not panic"))
        .collect()
}

#[test]
fn concurrent_in_process_registrations_have_no_gaps_or_duplicates() {
    let registrar = Arc::new(in_process());
    let appeals = register_concurrently(registrar, 16);
    assert_one_through_n(appeals.iter().map(|a| a.sequence_number).collect(), 16);
}

#[test]
fn concurrent_jsonl_registrations_on_default_settings_have_no_gaps_or_duplicates() {
    let temp = TempDirGuard::new("concurrent-jsonl");
    let registrar = Arc::new(
        AppealRegistrar::new(JsonlStore::new(temp.path().join("store")), directory())
            .with_retry(RetryPolicy::default()),
    );
    let appeals = register_concurrently(Arc::clone(&registrar), 32);
    assert_one_through_n(appeals.iter().map(|a| a.sequence_number).collect(), 32);

    let scope = Scope::new(2026, SECTION);
    let persisted = registrar.store().load_scope(&scope).expect("scope should load");
    assert_eq!(persisted.len(), 32);
    assert_eq!(persisted.max_sequence(&scope), 32);
}

fn hold_scope_lock(store: &JsonlStore, scope: &Scope) -> File {
    let lock_path = scope_lock_path(&store.scope_path(scope));
    fs::create_dir_all(lock_path.parent().expect("lock has parent")).expect("dir");
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .expect("lock file should open");
    file.try_lock_exclusive().expect("lock should be free");
    file
}

#[test]
fn held_scope_lock_surfaces_transient_error_after_retries() {
    let temp = TempDirGuard::new("busy-jsonl");
    let store =
        JsonlStore::new(temp.path().join("store")).with_lock_timeout(Duration::from_millis(10));
    let scope_path = store.scope_path(&Scope::new(2026, SECTION));
    let held = hold_scope_lock(&store, &Scope::new(2026, SECTION));

    let registrar = AppealRegistrar::new(store, directory()).with_retry(RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    });
    let err = registrar
        .register(&clerk(), &request("Rauf", 2026))
        .expect_err("held lock must fail");
    assert!(err.is_transient());
    assert!(!scope_path.exists());

    // Reads and other sections proceed while this scope is held.
    let check = registrar
        .check_duplicate("Rauf", 2026, SECTION)
        .expect("read does not wait on the lock");
    assert!(!check.exists);
    let mut elsewhere = request("Rauf", 2026);
    elsewhere.section = Some(SectionId(2));
    let appeal = registrar
        .register(&clerk(), &elsewhere)
        .expect("other scope is free");
    assert_eq!(appeal.sequence_number, 1);

    drop(held);
    let retried = registrar
        .register(&clerk(), &request("Rauf", 2026))
        .expect("released scope registers");
    assert_eq!(retried.sequence_number, 1);
}

#[test]
fn restore_after_reissue_is_refused_on_disk() {
    let temp = TempDirGuard::new("restore-conflict");
    let registrar = AppealRegistrar::new(JsonlStore::new(temp.path().join("store")), directory());
    let first = register(&registrar, "Rauf");
    registrar
        .soft_delete(&first.id, &clerk(), at(2026, 5, 1))
        .expect("delete should succeed");
    let second = register(&registrar, "Anar");
    assert_eq!(second.sequence_number, 1);

    let err = registrar
        .restore(&first.id, &clerk(), at(2026, 5, 2))
        .expect_err("number was reissued");
    assert!(matches!(err, RegistrationError::RestoreConflict { holder, .. } if holder == second.id));
    assert!(registrar.find(&first.id).expect("still stored").is_deleted);
}

#[test]
fn jsonl_store_survives_reopen_and_records_audit_events() {
    let temp = TempDirGuard::new("reopen");
    let root = temp.path().join("store");
    let audit_path = root.join("events.jsonl");

    let first = {
        let registrar = AppealRegistrar::new(JsonlStore::new(&root), directory())
            .with_audit_log(AuditLog::new(&audit_path));
        let first = register(&registrar, "Rauf");
        registrar
            .soft_delete(&first.id, &clerk(), at(2026, 6, 1))
            .expect("delete should succeed");
        registrar
            .restore(&first.id, &clerk(), at(2026, 6, 2))
            .expect("restore should succeed");
        first
    };

    let reopened = AppealRegistrar::new(JsonlStore::new(&root), directory());
    let repeat = register(&reopened, "RAUF");
    assert!(repeat.is_repeat);
    assert_eq!(repeat.sequence_number, 1);
    assert_eq!(repeat.registration_code, "3-25-5/1-R-1/2-3/2026");

    let events = AuditLog::new(&audit_path).events().expect("audit log reads");
    let actions: Vec<&AppealEventAction> = events.iter().map(|event| &event.action).collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.appeal_id == first.id));
    assert!(matches!(actions[0], AppealEventAction::Registered { sequence_number: 1, .. }));
    assert_eq!(actions[1], &AppealEventAction::Deleted);
    assert_eq!(actions[2], &AppealEventAction::Restored);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registrations_from_async_tasks_serialize_per_scope() {
    let registrar = Arc::new(in_process());
    let mut tasks = Vec::new();
    for i in 0..12 {
        let registrar = Arc::clone(&registrar);
        let section = if i % 2 == 0 { SECTION } else { SectionId(2) };
        tasks.push(tokio::task::spawn_blocking(move || {
            let mut req = request(&format!("Task {i}"), 2026);
            req.section = Some(section);
            registrar.register(&clerk(), &req)
        }));
    }

    let mut by_section: std::collections::BTreeMap<SectionId, Vec<u32>> = Default::default();
    for task in tasks {
        let appeal = task
            .await
            .expect("task should not panic")
            .expect("registration should succeed");
        by_section
            .entry(appeal.section)
            .or_default()
            .push(appeal.sequence_number);
    }

    for numbers in by_section.into_values() {
        assert_one_through_n(numbers, 6);
    }
}
