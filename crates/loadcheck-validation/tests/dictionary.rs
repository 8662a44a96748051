use loadcheck_validation::{
    fingerprint, DictionaryConfig, DictionaryValidator, Message, MessageValidator, ResponseId,
    Validation, ValidationError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tracing_subscriber::layer::{Context, SubscriberExt as _};
use tracing_subscriber::Layer;

fn recorder(dir: &TempDir) -> DictionaryValidator {
    DictionaryValidator::new(DictionaryConfig::new(dir.path()).recording(true))
}

fn checker(dir: &TempDir) -> DictionaryValidator {
    DictionaryValidator::new(DictionaryConfig::new(dir.path()))
}

/// Counts `ERROR` events emitted while installed.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_errors(f: impl FnOnce()) -> usize {
    let counter = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    tracing::subscriber::with_default(subscriber, f);
    counter.0.load(Ordering::SeqCst)
}

#[test]
fn record_then_validate_in_fresh_instance() {
    let dir = TempDir::new().unwrap();
    let ping = Message::new("ping");

    assert!(recorder(&dir).is_valid(&ping, &Message::new("pong")));

    let id = ResponseId::for_payload("pong");
    let index = std::fs::read_to_string(dir.path().join("index")).unwrap();
    assert!(index.lines().any(|line| line == format!("ping={id}")));
    assert_eq!(
        std::fs::read_to_string(dir.path().join(id.as_str())).unwrap(),
        "pong"
    );

    let validator = checker(&dir);
    assert!(validator.is_valid(&ping, &Message::new("pong")));
    assert!(!validator.is_valid(&ping, &Message::new("PONG")));
}

#[test]
fn recording_over_existing_index_fails_and_logs_once() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index"), "ping=3446776\n").unwrap();
    let validator = recorder(&dir);

    let mut results = Vec::new();
    let errors = count_errors(|| {
        for _ in 0..5 {
            results.push(validator.is_valid(&Message::new("ping"), &Message::new("pong")));
        }
    });

    assert_eq!(results, vec![false; 5]);
    assert_eq!(errors, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("index")).unwrap(),
        "ping=3446776\n"
    );
}

#[test]
fn payloads_with_reserved_characters_round_trip() {
    let dir = TempDir::new().unwrap();
    let originals = [
        "key=value:other",
        "a:b=c=d",
        "GET /api?x=1&y=2 HTTP/1.1",
        "#comment-like",
        "line one\nline two",
        "C:\\path\\to\\file",
        "  padded  ",
        "",
        "ünïcødé: ✓",
    ];

    let rec = recorder(&dir);
    for (i, original) in originals.iter().enumerate() {
        let response = format!("response #{i}");
        assert!(rec.is_valid(&Message::new(*original), &Message::new(response)));
    }

    let validator = checker(&dir);
    for (i, original) in originals.iter().enumerate() {
        let response = format!("response #{i}");
        assert_eq!(
            validator
                .check(&Message::new(*original), &Message::new(response))
                .unwrap(),
            Validation::Valid,
            "original {original:?}"
        );
    }
    assert_eq!(validator.cached_index_len(), Some(originals.len()));
}

#[test]
fn index_line_uses_escaped_fingerprint() {
    let dir = TempDir::new().unwrap();
    recorder(&dir)
        .check(&Message::new("a=b:c"), &Message::new("x"))
        .unwrap();
    let index = std::fs::read_to_string(dir.path().join("index")).unwrap();
    assert_eq!(
        index,
        format!("{}={}\n", fingerprint("a=b:c"), ResponseId::for_payload("x"))
    );
    assert!(index.starts_with("a\\=b\\:c="));
}

#[test]
fn unknown_original_is_invalid_without_panicking() {
    let dir = TempDir::new().unwrap();
    recorder(&dir).is_valid(&Message::new("ping"), &Message::new("pong"));

    let validator = checker(&dir);
    let err = validator
        .check(&Message::new("never recorded"), &Message::new("pong"))
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownMessage { .. }));
    assert!(!err.is_io());
    assert!(!validator.is_valid(&Message::new("never recorded"), &Message::new("pong")));
}

#[test]
fn validating_without_index_is_an_io_failure() {
    let dir = TempDir::new().unwrap();
    let validator = checker(&dir);
    let err = validator
        .check(&Message::new("ping"), &Message::new("pong"))
        .unwrap_err();
    assert!(err.is_io());
    assert!(!validator.is_valid(&Message::new("ping"), &Message::new("pong")));

    // A failed load is retried once the index shows up.
    recorder(&dir).is_valid(&Message::new("ping"), &Message::new("pong"));
    assert!(validator.is_valid(&Message::new("ping"), &Message::new("pong")));
}

#[test]
fn missing_response_payload_compares_as_empty_text() {
    let dir = TempDir::new().unwrap();
    assert!(recorder(&dir).is_valid(&Message::new("ping"), &Message::empty()));
    assert!(dir.path().join("0").is_file());

    let validator = checker(&dir);
    assert!(validator.is_valid(&Message::new("ping"), &Message::empty()));
    assert!(validator.is_valid(&Message::new("ping"), &Message::new("")));
    assert!(!validator.is_valid(&Message::new("ping"), &Message::new("pong")));
}

#[test]
fn identical_responses_share_one_file() {
    let dir = TempDir::new().unwrap();
    let rec = recorder(&dir);
    rec.check(&Message::new("a"), &Message::new("same")).unwrap();
    rec.check(&Message::new("b"), &Message::new("same")).unwrap();

    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 2, "index plus one shared response file");

    let validator = checker(&dir);
    assert!(validator.is_valid(&Message::new("a"), &Message::new("same")));
    assert!(validator.is_valid(&Message::new("b"), &Message::new("same")));
}

#[test]
fn cached_index_ignores_later_recordings_until_reloaded() {
    let dir = TempDir::new().unwrap();
    let rec = recorder(&dir);
    rec.check(&Message::new("first"), &Message::new("1")).unwrap();

    let validator = checker(&dir);
    assert!(validator.is_valid(&Message::new("first"), &Message::new("1")));
    assert_eq!(validator.cached_index_len(), Some(1));

    rec.check(&Message::new("second"), &Message::new("2")).unwrap();
    assert!(!validator.is_valid(&Message::new("second"), &Message::new("2")));

    assert_eq!(validator.reload_index().unwrap(), 2);
    assert!(validator.is_valid(&Message::new("second"), &Message::new("2")));
}

#[test]
fn concurrent_recording_keeps_index_well_formed() {
    let dir = TempDir::new().unwrap();
    let validator = Arc::new(recorder(&dir));

    let threads = 16;
    let per_thread = 25;
    let mut handles = Vec::with_capacity(threads);
    for t in 0..threads {
        let validator = Arc::clone(&validator);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                let original = Message::new(format!("request {t}:{i}"));
                let response = Message::new(format!("response {t}-{i} {}", "x".repeat(i * 40)));
                assert!(validator.is_valid(&original, &response));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let index = std::fs::read_to_string(dir.path().join("index")).unwrap();
    assert_eq!(index.lines().count(), threads * per_thread);

    let validator = checker(&dir);
    for t in 0..threads {
        for i in 0..per_thread {
            let original = Message::new(format!("request {t}:{i}"));
            let response = Message::new(format!("response {t}-{i} {}", "x".repeat(i * 40)));
            assert!(validator.is_valid(&original, &response), "{t}/{i}");
        }
    }
}

#[test]
fn concurrent_first_calls_share_one_guard_decision() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index"), "").unwrap();
    let validator = Arc::new(recorder(&dir));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                validator.check(&Message::new(format!("m{i}")), &Message::new("r"))
            })
        })
        .collect();
    for handle in handles {
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(ValidationError::IndexExists { .. })));
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("index")).unwrap(), "");
}
