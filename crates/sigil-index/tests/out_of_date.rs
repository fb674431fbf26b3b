//! Out-of-date detection for units and their dependency closures.

mod common;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use common::{unit, RecordingDelegate, StoreFixture};
use sigil_index::IndexSystem;

/// lib.o compiles shared.x; main.o depends on lib.o.
fn dependent_units_fixture() -> (StoreFixture, std::path::PathBuf, std::path::PathBuf) {
    let fixture = StoreFixture::new();
    let shared_x = fixture.source_file("shared.x");
    let main_x = fixture.source_file("main.x");

    fixture.write_unit(&unit(
        "lib.o",
        "/build/lib.o",
        vec![shared_x.clone()],
        vec![],
    ));
    let mut main = unit("main.o", "/build/main.o", vec![main_x.clone()], vec![]);
    main.unit_deps = vec!["lib.o".to_owned()];
    fixture.write_unit(&main);
    (fixture, shared_x, main_x)
}

#[test]
fn dirty_files_propagate_through_unit_dependencies() {
    let (fixture, shared_x, main_x) = dependent_units_fixture();
    let index = fixture.index();

    // shared.x is compiled by lib.o and reaches main.o through its unit dep.
    assert!(index.is_unit_out_of_date("/build/lib.o", &[shared_x.as_path()]));
    assert!(index.is_unit_out_of_date("/build/main.o", &[shared_x.as_path()]));

    // main.x only affects main.o.
    assert!(index.is_unit_out_of_date("/build/main.o", &[main_x.as_path()]));
    assert!(!index.is_unit_out_of_date("/build/lib.o", &[main_x.as_path()]));

    let unrelated = fixture.source_file("unrelated.x");
    assert!(!index.is_unit_out_of_date("/build/main.o", &[unrelated.as_path()]));
}

#[test]
fn unknown_units_are_always_out_of_date() {
    let (fixture, shared_x, _) = dependent_units_fixture();
    let index = fixture.index();
    assert!(index.is_unit_out_of_date("/build/ghost.o", &[shared_x.as_path()]));
    assert!(index.is_unit_out_of_date_mod_time("/build/ghost.o", SystemTime::UNIX_EPOCH));
}

#[test]
fn mod_time_comparison_uses_the_ingested_record_time() {
    let (fixture, _, _) = dependent_units_fixture();
    let index = fixture.index();

    assert!(!index.is_unit_out_of_date_mod_time("/build/lib.o", SystemTime::UNIX_EPOCH));
    let future = SystemTime::now() + Duration::from_secs(3600);
    assert!(index.is_unit_out_of_date_mod_time("/build/lib.o", future));
}

#[test]
fn stale_file_check_notifies_with_dependency_hints() {
    let (fixture, shared_x, _) = dependent_units_fixture();
    let recording = Arc::new(RecordingDelegate::default());
    let index = {
        let mut config = fixture.config();
        config.delegate = Some(recording.clone());
        config.listen_to_unit_events = false;
        let index = IndexSystem::create(config).expect("create index system");
        index.poll_for_unit_changes_and_wait();
        index
    };
    let ingest_events = recording.events().len();

    // Touch the source file after ingestion so it is newer than the unit
    // record, then ask for a check.
    std::fs::write(&shared_x, "// shared.x (edited)\n").expect("rewrite shared.x");
    index.check_unit_containing_file_is_out_of_date(&shared_x);
    index.poll_for_unit_changes_and_wait();

    let events = recording.events();
    let out_of_date: Vec<&String> = events[ingest_events..]
        .iter()
        .filter(|event| event.starts_with("out-of-date("))
        .collect();
    assert_eq!(out_of_date.len(), 2, "events: {events:?}");

    // lib.o is stale because of the file itself.
    assert!(
        out_of_date[0].starts_with("out-of-date(lib.o, ") && out_of_date[0].ends_with("sync=false)"),
        "unexpected event: {}",
        out_of_date[0]
    );
    assert!(
        out_of_date[0].contains("shared.x"),
        "unexpected event: {}",
        out_of_date[0]
    );

    // main.o is stale because its dependency lib.o is.
    assert!(
        out_of_date[1].starts_with("out-of-date(main.o, unit(lib.o) -> "),
        "unexpected event: {}",
        out_of_date[1]
    );
}

#[test]
fn up_to_date_files_produce_no_notifications() {
    let (fixture, shared_x, _) = dependent_units_fixture();
    let recording = Arc::new(RecordingDelegate::default());
    let index = {
        let mut config = fixture.config();
        config.delegate = Some(recording.clone());
        config.listen_to_unit_events = false;
        let index = IndexSystem::create(config).expect("create index system");
        index.poll_for_unit_changes_and_wait();
        index
    };
    let ingest_events = recording.events().len();

    // The unit record was written after the source file, so nothing is stale.
    index.check_unit_containing_file_is_out_of_date(&shared_x);
    index.poll_for_unit_changes_and_wait();
    assert_eq!(recording.events().len(), ingest_events);
}
