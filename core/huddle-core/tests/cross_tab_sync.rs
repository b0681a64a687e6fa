//! Integration tests for state shared between tabs of one origin.

use std::sync::Arc;

use huddle_core::{
    ChatSession, ChatSummary, ClassList, FileStore, KeyValueStore, ManualClock, MemoryOrigin,
    SessionSettings, TabStorage, PINNED_CHATS_KEY,
};
use tempfile::tempdir;

fn open_tab(origin: &MemoryOrigin) -> (ChatSession, TabStorage) {
    let tab = origin.open_tab();
    let session = ChatSession::open(
        "viewer",
        SessionSettings::default(),
        Arc::new(tab.clone()),
        Box::new(ManualClock::new(0)),
        ClassList::default(),
    );
    (session, tab)
}

fn pump(session: &mut ChatSession, tab: &TabStorage) {
    for change in tab.drain_changes() {
        session.on_storage_change(&change);
    }
}

#[test]
fn test_theme_toggle_propagates_to_other_tab() {
    let origin = MemoryOrigin::new();
    let (mut first, first_tab) = open_tab(&origin);
    let (mut second, second_tab) = open_tab(&origin);
    pump(&mut first, &first_tab);

    second.preference_mut().toggle();
    pump(&mut second, &second_tab);
    assert!(!second.preference().is_dark_mode());

    pump(&mut first, &first_tab);
    assert!(!first.preference().is_dark_mode());
    assert!(first.preference().applier().contains("light"));
    assert!(!first.preference().applier().contains("dark"));
}

#[test]
fn test_last_writer_wins_without_merge() {
    let origin = MemoryOrigin::new();
    let (mut first, first_tab) = open_tab(&origin);
    let (mut second, second_tab) = open_tab(&origin);

    first.pins_mut().pin_chat("c-an").unwrap();
    second.pins_mut().pin_chat("c-bao").unwrap();
    assert_eq!(first_tab.get(PINNED_CHATS_KEY).as_deref(), Some(r#"["c-bao"]"#));

    pump(&mut first, &first_tab);
    pump(&mut second, &second_tab);
    assert_eq!(first.pins().pinned_ids(), vec!["c-bao".to_string()]);
    assert_eq!(second.pins().pinned_ids(), vec!["c-bao".to_string()]);
}

#[test]
fn test_pins_from_other_tab_reorder_list() {
    let origin = MemoryOrigin::new();
    let (mut first, first_tab) = open_tab(&origin);
    let (mut second, _second_tab) = open_tab(&origin);

    second.pins_mut().pin_chat("c-zoe").unwrap();
    pump(&mut first, &first_tab);

    let chats = vec![
        ChatSummary::new("c-an", "An"),
        ChatSummary::new("c-zoe", "Zoe"),
        ChatSummary::new("c-bao", "Bảo"),
    ];
    let names: Vec<String> = first
        .pins()
        .sort_with_pinned(chats)
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Zoe", "An", "Bảo"]);
    assert_eq!(first_tab.get(PINNED_CHATS_KEY).as_deref(), Some(r#"["c-zoe"]"#));
}

#[test]
fn test_file_store_sessions_converge_by_polling() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("local-storage.json");
    let open = || {
        ChatSession::open(
            "viewer",
            SessionSettings::default(),
            Arc::new(FileStore::new(&path)) as Arc<dyn KeyValueStore>,
            Box::new(ManualClock::new(0)),
            ClassList::default(),
        )
    };

    let mut first = open();
    let mut second = open();
    assert!(first.preference().is_dark_mode());

    second.preference_mut().toggle();
    assert!(first.preference().is_dark_mode());
    assert!(first.poll_preferences());
    assert!(!first.preference().is_dark_mode());
    assert!(!first.poll_preferences());
}
