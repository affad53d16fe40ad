use access_monitor_lib::access::{AccessEvent, CurrentStatus, EventLog, StatusKind};
use chrono::{Local, TimeZone};

fn at(kind: StatusKind, secs: i64) -> AccessEvent {
    let timestamp = Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
    AccessEvent::new(kind, timestamp)
}

#[test]
fn test_no_data_before_first_event() {
    let log = EventLog::new();
    assert!(log.current_status().is_no_data());
    assert_eq!(log.history().len(), 0);
}

#[test]
fn test_current_status_tracks_head() {
    let mut log = EventLog::new();
    let first = at(StatusKind::Wrong, 0);
    let second = at(StatusKind::Open, 5);
    log.append(first);
    log.append(second.clone());
    assert_eq!(
        log.current_status(),
        CurrentStatus::Latest { kind: StatusKind::Open, timestamp: second.timestamp() }
    );
}

#[test]
fn test_repeated_status_is_not_deduplicated() {
    let mut log = EventLog::new();
    for i in 0..4 {
        log.append(at(StatusKind::Wrong, i));
    }
    log.append(at(StatusKind::Lock, 10));

    let history = log.history();
    assert_eq!(history.len(), 5);
    let entries: Vec<_> = history.iter().map(|e| (e.kind(), e.timestamp())).collect();
    assert_eq!(entries[0].0, StatusKind::Lock);
    assert!(entries[1..].iter().all(|(kind, _)| *kind == StatusKind::Wrong));
    // Newest first
    assert!(entries.windows(2).all(|w| w[0].1 > w[1].1));
}

#[test]
fn test_history_serializes_newest_first() {
    let mut log = EventLog::new();
    log.append(at(StatusKind::Open, 0));
    log.append(at(StatusKind::Lock, 1));
    let json = serde_json::to_value(log.history()).unwrap();
    let kinds: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["LOCK", "OPEN"]);
    assert_eq!(json[0]["description"], "Failed Attempts Limit");
}

#[tokio::test]
async fn test_reader_snapshot_survives_writer() {
    let mut log = EventLog::new();
    let mut reader = log.reader();
    log.append(at(StatusKind::Open, 0));
    assert!(reader.changed().await);
    let snapshot = reader.history();
    log.append(at(StatusKind::Wrong, 1));
    drop(log);

    assert_eq!(snapshot.len(), 1);
    assert_eq!(reader.history().len(), 2);
    assert_eq!(reader.current_status().kind(), Some(StatusKind::Wrong));
}
