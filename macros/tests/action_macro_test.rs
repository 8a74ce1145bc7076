//! Tests for #[derive(Action)] macro

use reducible_core::composition::ActionCase;
use reducible_macros::Action;

#[derive(Action, Clone, Debug, PartialEq)]
enum CounterAction {
    DecrementButtonTapped,
    IncrementButtonTapped,
}

#[derive(Action, Clone, Debug, PartialEq)]
enum AppAction {
    Counter(CounterAction),
    SetSheet(bool),
    SetSheetDelayCompleted,
    URLLoaded(String),
    Resized { width: u32, height: u32 },
    Pair(u8, u8),
}

#[test]
fn test_variant_name() {
    assert_eq!(AppAction::SetSheet(true).variant_name(), "SetSheet");
    assert_eq!(AppAction::SetSheetDelayCompleted.variant_name(), "SetSheetDelayCompleted");
    assert_eq!(
        AppAction::Resized { width: 1, height: 2 }.variant_name(),
        "Resized"
    );
    assert_eq!(CounterAction::IncrementButtonTapped.variant_name(), "IncrementButtonTapped");
}

#[test]
fn test_predicates() {
    let action = AppAction::SetSheet(false);
    assert!(action.is_set_sheet());
    assert!(!action.is_set_sheet_delay_completed());

    assert!(AppAction::URLLoaded("memo.m4a".to_string()).is_url_loaded());
    assert!(AppAction::Resized { width: 1, height: 2 }.is_resized());
    assert!(AppAction::Pair(1, 2).is_pair());
    assert!(CounterAction::DecrementButtonTapped.is_decrement_button_tapped());
}

#[test]
fn test_single_payload_accessors() {
    let action = AppAction::Counter(CounterAction::IncrementButtonTapped);
    assert_eq!(
        action.as_counter(),
        Some(&CounterAction::IncrementButtonTapped)
    );
    assert_eq!(action.as_set_sheet(), None);
    assert_eq!(
        action.clone().into_counter(),
        Some(CounterAction::IncrementButtonTapped)
    );
    assert_eq!(action.into_url_loaded(), None);

    assert_eq!(
        AppAction::URLLoaded("a".to_string()).into_url_loaded(),
        Some("a".to_string())
    );
}

#[test]
fn test_extractor_builds_action_case() {
    let case = ActionCase::new(AppAction::Counter, AppAction::into_counter);

    let embedded = case.embed(CounterAction::DecrementButtonTapped);
    assert_eq!(embedded, AppAction::Counter(CounterAction::DecrementButtonTapped));
    assert_eq!(
        case.extract(embedded),
        Some(CounterAction::DecrementButtonTapped)
    );
    assert_eq!(case.extract(AppAction::SetSheet(true)), None);
}

#[test]
fn test_generic_enums_compile() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/generic_action.rs");
}
