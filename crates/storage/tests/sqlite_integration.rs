use chrono::Duration;
use storage::repository::{AnswerDraft, AnswerDraftRepository, Storage};
use storage::sqlite::SqliteRepository;
use worksheet_core::model::{ProblemId, Subject, WorksheetId, WorksheetRef};
use worksheet_core::time::fixed_now;

fn worksheet(subject: Subject, id: u64) -> WorksheetRef {
    WorksheetRef::new(subject, WorksheetId::new(id))
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_round_trips_draft_entries() {
    let repo = connect("memdb_draft_roundtrip").await;
    let sheet = worksheet(Subject::Math, 7);
    let draft = AnswerDraft::new(
        sheet,
        [
            (ProblemId::new(3), "data:image/png;base64,AAAA"),
            (ProblemId::new(1), "B"),
            (ProblemId::new(2), ""),
        ],
        fixed_now(),
    );
    repo.save_draft(&draft).await.unwrap();

    let loaded = repo.load_draft(sheet).await.unwrap().expect("draft");
    assert_eq!(loaded.worksheet, sheet);
    assert_eq!(loaded.saved_at, fixed_now());
    let ids: Vec<u64> = loaded.entries.iter().map(|(id, _)| id.value()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(loaded.entries[1].1, "");
}

#[tokio::test]
async fn sqlite_save_replaces_whole_draft() {
    let repo = connect("memdb_draft_replace").await;
    let sheet = worksheet(Subject::English, 2);
    let first = AnswerDraft::new(
        sheet,
        [(ProblemId::new(1), "A"), (ProblemId::new(2), "B")],
        fixed_now(),
    );
    repo.save_draft(&first).await.unwrap();

    let later = fixed_now() + Duration::minutes(3);
    let second = AnswerDraft::new(sheet, [(ProblemId::new(2), "C")], later);
    repo.save_draft(&second).await.unwrap();

    let loaded = repo.load_draft(sheet).await.unwrap().expect("draft");
    assert_eq!(loaded.entries, vec![(ProblemId::new(2), "C".to_string())]);
    assert_eq!(loaded.saved_at, later);
}

#[tokio::test]
async fn sqlite_clear_removes_entries_and_keeps_other_worksheets() {
    let repo = connect("memdb_draft_clear").await;
    let math = worksheet(Subject::Math, 1);
    let korean = worksheet(Subject::Korean, 1);
    repo.save_draft(&AnswerDraft::new(math, [(ProblemId::new(1), "A")], fixed_now()))
        .await
        .unwrap();
    repo.save_draft(&AnswerDraft::new(korean, [(ProblemId::new(1), "가")], fixed_now()))
        .await
        .unwrap();

    repo.clear_draft(math).await.unwrap();
    repo.clear_draft(math).await.unwrap();

    assert!(repo.load_draft(math).await.unwrap().is_none());
    let remaining = repo.load_draft(korean).await.unwrap().expect("korean draft");
    assert_eq!(remaining.entries.len(), 1);

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM answer_draft_entries WHERE subject = 'math'",
    )
    .fetch_one(repo.pool())
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn storage_sqlite_migrates_once() {
    let url = "sqlite:file:memdb_draft_migrate?mode=memory&cache=shared";
    let storage = Storage::sqlite(url).await.expect("first open");
    let repo = SqliteRepository::connect(url).await.expect("connect");
    repo.migrate().await.expect("re-run migrations");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);

    let missing = storage
        .drafts
        .load_draft(worksheet(Subject::Math, 99))
        .await
        .unwrap();
    assert!(missing.is_none());
}
