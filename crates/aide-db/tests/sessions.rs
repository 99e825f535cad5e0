use aide_config::{Settings, Sources};
use aide_db::{
    Column, ColumnType, DbError, Engine, EngineOptions, Metadata, SessionFactory, TableDef, Value,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

fn notes_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata
        .register(
            TableDef::new("notes")
                .column(
                    Column::new("id", ColumnType::Integer)
                        .primary_key()
                        .autoincrement(),
                )
                .column(Column::new("author", ColumnType::Text).not_null())
                .column(Column::new("body", ColumnType::Text).not_null()),
        )
        .expect("notes table should register");
    metadata
}

fn file_factory(dir: &Path, options: EngineOptions) -> SessionFactory {
    let url = format!("sqlite:///{}", dir.join("aide.db").display());
    let engine = Engine::connect(&url, options).expect("file engine should build");
    let factory = SessionFactory::new(engine, notes_metadata());
    factory.create_schema().expect("schema should be created");
    factory
}

fn count_notes(factory: &SessionFactory) -> i64 {
    factory
        .with_session(|s| s.query_one("SELECT COUNT(*) FROM notes", &[]))
        .expect("count query should succeed")
        .and_then(|row| row.get(0).and_then(Value::as_i64))
        .expect("count should be an integer")
}

#[test]
fn committed_work_is_visible_to_later_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    let mut session = factory.new_session().unwrap();
    let inserted = session
        .execute(
            "INSERT INTO notes (author, body) VALUES ($1, $2)",
            &["ada".into(), "buy milk".into()],
        )
        .unwrap();
    assert_eq!(inserted, 1);
    assert!(session.in_transaction());
    session.commit().unwrap();
    session.close().unwrap();

    let rows = factory
        .with_session(|s| s.query("SELECT author, body FROM notes WHERE author = $1", &["ada".into()]))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].by_name("body").and_then(Value::as_str), Some("buy milk"));
}

#[test]
fn uncommitted_work_is_rolled_back_on_release() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    {
        let mut session = factory.new_session().unwrap();
        session
            .execute(
                "INSERT INTO notes (author, body) VALUES ($1, $2)",
                &["bob".into(), "draft".into()],
            )
            .unwrap();
    }

    assert_eq!(count_notes(&factory), 0);
}

#[derive(Debug)]
enum WorkError {
    Db(DbError),
    Rejected,
}

impl From<DbError> for WorkError {
    fn from(e: DbError) -> Self {
        WorkError::Db(e)
    }
}

#[test]
fn borrowed_session_is_released_after_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let options = EngineOptions {
        connection_timeout: Duration::from_secs(2),
        ..EngineOptions::default()
    };
    let factory = file_factory(tmp.path(), options);

    let result: Result<(), WorkError> = factory.with_session(|s| {
        s.execute(
            "INSERT INTO notes (author, body) VALUES ($1, $2)",
            &["eve".into(), "half done".into()],
        )?;
        Err(WorkError::Rejected)
    });
    assert!(matches!(result, Err(WorkError::Rejected)));

    assert_eq!(factory.engine().state().idle_connections, 1);
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn statement_errors_propagate_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    let result: Result<usize, WorkError> =
        factory.with_session(|s| Ok(s.execute("INSERT INTO missing_table VALUES ($1)", &[Value::Integer(1)])?));
    assert!(matches!(result, Err(WorkError::Db(DbError::Sqlite(_)))));

    // The connection is still usable afterwards.
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn concurrent_sessions_on_a_file_engine() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    std::thread::scope(|scope| {
        for author in ["worker-a", "worker-b"] {
            let factory = factory.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    factory
                        .with_session(|s| {
                            s.execute(
                                "INSERT INTO notes (author, body) VALUES ($1, $2)",
                                &[author.into(), format!("note {i}").into()],
                            )?;
                            s.commit()
                        })
                        .expect("insert should succeed");
                }
            });
        }
    });

    assert_eq!(count_notes(&factory), 50);
    let per_author = factory
        .with_session(|s| {
            s.query(
                "SELECT author, COUNT(*) AS n FROM notes GROUP BY author ORDER BY author",
                &[],
            )
        })
        .unwrap();
    assert_eq!(per_author.len(), 2);
    for row in per_author {
        assert_eq!(row.by_name("n").and_then(Value::as_i64), Some(25));
    }
}

#[test]
fn overlapping_sessions_on_a_file_engine_take_turns() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());
    let first_released = AtomicBool::new(false);
    let (opened_tx, opened_rx) = mpsc::channel();

    std::thread::scope(|scope| {
        let factory = &factory;
        let first_released = &first_released;

        scope.spawn(move || {
            let mut first = factory.new_session().unwrap();
            first
                .execute(
                    "INSERT INTO notes (author, body) VALUES ($1, $2)",
                    &["kim".into(), "first".into()],
                )
                .unwrap();
            opened_tx.send(()).unwrap();

            // Give the second session time to start waiting.
            std::thread::sleep(Duration::from_millis(200));
            first.commit().unwrap();
            first_released.store(true, Ordering::SeqCst);
            first.close().unwrap();
        });

        scope.spawn(move || {
            opened_rx.recv().unwrap();
            let mut second = factory.new_session().unwrap();
            assert!(
                first_released.load(Ordering::SeqCst),
                "second session must wait for the first to be released"
            );

            let seen = second
                .query_one("SELECT COUNT(*) FROM notes", &[])
                .unwrap()
                .and_then(|row| row.get(0).and_then(Value::as_i64));
            assert_eq!(seen, Some(1), "first session's commit is visible");

            second
                .execute(
                    "INSERT INTO notes (author, body) VALUES ($1, $2)",
                    &["lou".into(), "second".into()],
                )
                .unwrap();
            second.commit().unwrap();
        });
    });

    assert_eq!(count_notes(&factory), 2);
}

#[test]
fn second_session_on_the_same_thread_times_out() {
    let tmp = tempfile::tempdir().unwrap();
    let options = EngineOptions {
        connection_timeout: Duration::from_millis(500),
        ..EngineOptions::default()
    };
    let factory = file_factory(tmp.path(), options);

    let first = factory.new_session().unwrap();
    let started = Instant::now();
    match factory.new_session() {
        Err(DbError::Acquire(_)) => {}
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("a second session must not be granted while the first is open"),
    }
    assert!(started.elapsed() >= Duration::from_millis(400));

    // Releasing the first session frees the connection again.
    first.close().unwrap();
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn drop_then_create_leaves_an_empty_schema() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    factory
        .with_session(|s| {
            s.execute(
                "INSERT INTO notes (author, body) VALUES ($1, $2)",
                &["lee".into(), "old data".into()],
            )?;
            s.commit()
        })
        .unwrap();
    assert_eq!(count_notes(&factory), 1);

    factory.drop_schema().unwrap();
    let gone: Result<i64, DbError> = factory.with_session(|s| {
        s.query("SELECT COUNT(*) FROM notes", &[]).map(|rows| rows.len() as i64)
    });
    assert!(gone.is_err(), "table should no longer exist");

    factory.create_schema().unwrap();
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn create_schema_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let factory = file_factory(tmp.path(), EngineOptions::default());

    factory.create_schema().unwrap();
    factory.create_schema().unwrap();
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn in_memory_database_is_shared_between_sessions() {
    let engine = Engine::connect("sqlite:///:memory:", EngineOptions::default()).unwrap();
    let factory = SessionFactory::new(engine, notes_metadata());
    factory.create_schema().unwrap();

    factory
        .with_session(|s| {
            s.execute(
                "INSERT INTO notes (author, body) VALUES ($1, $2)",
                &["mem".into(), "kept".into()],
            )?;
            s.commit()
        })
        .unwrap();

    assert_eq!(count_notes(&factory), 1);
}

#[test]
fn echo_does_not_change_results() {
    let tmp = tempfile::tempdir().unwrap();
    let options = EngineOptions {
        echo: true,
        ..EngineOptions::default()
    };
    let factory = file_factory(tmp.path(), options);
    assert!(factory.engine().echo());
    assert_eq!(count_notes(&factory), 0);
}

#[test]
fn engine_from_settings_uses_the_absolute_path() {
    let tmp = tempfile::tempdir().unwrap();
    let sources = Sources::from_pairs(
        Vec::<(&str, &str)>::new(),
        vec![
            ("OPENAI_API_KEY", "sk-test"),
            ("DATABASE_URL", "sqlite:///./state.db"),
            ("DEBUG", "false"),
        ],
    );
    let settings = Settings::resolve(&sources, tmp.path()).unwrap();

    let factory = SessionFactory::from_settings(&settings, Metadata::new()).unwrap();
    assert!(!factory.engine().echo());
    factory.create_schema().unwrap();

    assert!(tmp.path().join("state.db").exists());
}

#[test]
fn unreachable_networked_target_is_fatal() {
    let options = EngineOptions {
        connection_timeout: Duration::from_secs(1),
        ..EngineOptions::default()
    };
    let err = Engine::connect("postgresql://aide:pw@127.0.0.1:1/aide", options).unwrap_err();
    match err {
        DbError::Connection { target, .. } => {
            assert!(!target.contains("pw"), "credentials must not leak: {target}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
