use super::*;
use chrono::{Duration, TimeZone, Utc};
use shared::domain::{
    CallStatus, ContactId, Settings, SettingsPatch, Theme, TrustedContact, UserId, UserProfile,
};

fn initial() -> Arc<SessionState> {
    Arc::new(SessionState::default())
}

fn call_at(minutes_ago: i64) -> CallRecord {
    CallRecord::outbound_initiating("+15559876543", Utc::now() - Duration::minutes(minutes_ago))
}

fn contact(id: i64, name: &str) -> TrustedContact {
    TrustedContact {
        id: ContactId(id),
        name: name.into(),
        phone_number: format!("+1555000{id:04}"),
        custom_pin: None,
        auto_whitelisted: false,
    }
}

fn server_row(call_log_id: i64, status: CallStatus, hour: u32) -> CallRecord {
    CallRecord {
        id: CallId::from_call_log(call_log_id),
        call_log_id: Some(call_log_id),
        target_number: "+15551234567".into(),
        caller_id_shown: None,
        direction: Default::default(),
        status,
        start_time: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        duration_seconds: 30,
    }
}

#[test]
fn unknown_action_returns_same_state() {
    let state = initial();
    let action: Action = serde_json::from_str(r#"{"type":"refresh_widgets"}"#).unwrap();
    assert_eq!(action, Action::Unknown);

    let next = reduce(&state, &action);
    assert!(Arc::ptr_eq(&state, &next));
}

#[test]
fn setting_a_flag_to_its_current_value_is_not_a_change() {
    let state = initial();
    let next = reduce(&state, &Action::SetLoading(false));
    assert!(Arc::ptr_eq(&state, &next));

    let next = reduce(&state, &Action::SetLoading(true));
    assert!(!Arc::ptr_eq(&state, &next));
    assert!(next.loading);
}

#[test]
fn added_call_is_active_until_completed() {
    let call = call_at(0);
    let state = reduce(&initial(), &Action::AddCall(call.clone()));
    assert_eq!(state.active_call(call.id), Some(&call));
    assert!(state.history_call(call.id).is_none());

    let done = reduce(
        &state,
        &Action::CompleteCall(call.finished(CallStatus::Completed, 42)),
    );
    assert!(done.active_call(call.id).is_none());
    let recorded = done.history_call(call.id).unwrap();
    assert_eq!(recorded.status, CallStatus::Completed);
    assert_eq!(recorded.duration_seconds, 42);
}

#[test]
fn duplicate_or_terminal_add_is_ignored() {
    let call = call_at(0);
    let state = reduce(&initial(), &Action::AddCall(call.clone()));
    let again = reduce(&state, &Action::AddCall(call.clone()));
    assert!(Arc::ptr_eq(&state, &again));

    let terminal = call_at(1).finished(CallStatus::Completed, 5);
    let next = reduce(&state, &Action::AddCall(terminal));
    assert!(Arc::ptr_eq(&state, &next));
}

#[test]
fn completing_twice_keeps_first_outcome() {
    let call = call_at(0);
    let state = reduce(&initial(), &Action::AddCall(call.clone()));
    let done = reduce(
        &state,
        &Action::CompleteCall(call.finished(CallStatus::Completed, 42)),
    );
    let again = reduce(
        &done,
        &Action::CompleteCall(call.finished(CallStatus::AutoCompleted, 660)),
    );

    assert!(Arc::ptr_eq(&done, &again));
    assert_eq!(again.call_history.len(), 1);
    assert_eq!(again.call_history[0].status, CallStatus::Completed);
}

#[test]
fn complete_with_non_terminal_status_is_refused() {
    let call = call_at(0);
    let state = reduce(&initial(), &Action::AddCall(call.clone()));
    let next = reduce(
        &state,
        &Action::CompleteCall(call.finished(CallStatus::Connected, 0)),
    );
    assert!(Arc::ptr_eq(&state, &next));
}

#[test]
fn update_call_patches_active_record_only() {
    let call = call_at(0);
    let state = reduce(&initial(), &Action::AddCall(call.clone()));
    let next = reduce(
        &state,
        &Action::UpdateCall(CallUpdate {
            id: call.id,
            status: Some(CallStatus::Connected),
            call_log_id: Some(314),
            caller_id_shown: Some("+15550000001".into()),
            ..CallUpdate::default()
        }),
    );
    let updated = next.active_call(call.id).unwrap();
    assert_eq!(updated.status, CallStatus::Connected);
    assert_eq!(updated.call_log_id, Some(314));
    assert_eq!(updated.target_number, call.target_number);

    let missing = reduce(
        &next,
        &Action::UpdateCall(CallUpdate {
            id: CallId::new(),
            status: Some(CallStatus::Connected),
            ..CallUpdate::default()
        }),
    );
    assert!(Arc::ptr_eq(&next, &missing));

    let terminal = reduce(
        &next,
        &Action::UpdateCall(CallUpdate {
            id: call.id,
            status: Some(CallStatus::Completed),
            ..CallUpdate::default()
        }),
    );
    assert!(Arc::ptr_eq(&next, &terminal));
}

#[test]
fn history_merge_keeps_local_ids_and_skips_active_calls() {
    let mut active = call_at(0);
    active.call_log_id = Some(3);
    let mut local_done = call_at(30).finished(CallStatus::Completed, 12);
    local_done.call_log_id = Some(2);
    let local_only = call_at(60).finished(CallStatus::Cancelled, 0);

    let mut state = SessionState::default();
    state.active_calls.insert(active.id, active.clone());
    state.call_history = vec![local_done.clone(), local_only.clone()];
    let state = Arc::new(state);

    let incoming = vec![
        server_row(1, CallStatus::Completed, 8),
        server_row(2, CallStatus::Completed, 9),
        server_row(3, CallStatus::Completed, 10),
        server_row(4, CallStatus::Connected, 11),
    ];
    let next = reduce(&state, &Action::SetCallHistory(incoming));

    assert!(next.active_call(active.id).is_some());
    assert!(next
        .call_history
        .iter()
        .all(|call| call.call_log_id != Some(3) && call.call_log_id != Some(4)));

    let merged_local = next.history_call(local_done.id).unwrap();
    assert_eq!(merged_local.call_log_id, Some(2));
    assert_eq!(merged_local.duration_seconds, 30);
    assert!(next.history_call(local_only.id).is_some());
    assert!(next.history_call(CallId::from_call_log(1)).is_some());
    assert_eq!(next.call_history.len(), 3);

    let times: Vec<_> = next.call_history.iter().map(|c| c.start_time).collect();
    let mut sorted = times.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(times, sorted);
}

#[test]
fn contacts_are_replaced_added_and_removed() {
    let state = reduce(
        &initial(),
        &Action::SetContacts(vec![contact(1, "Mom"), contact(2, "Bank")]),
    );
    let renamed = reduce(&state, &Action::AddContact(contact(2, "Credit Union")));
    assert_eq!(renamed.contacts.len(), 2);
    assert_eq!(renamed.contacts[1].name, "Credit Union");

    let removed = reduce(&renamed, &Action::RemoveContact(ContactId(1)));
    assert_eq!(removed.contacts, vec![contact(2, "Credit Union")]);

    let missing = reduce(&removed, &Action::RemoveContact(ContactId(99)));
    assert!(Arc::ptr_eq(&removed, &missing));
}

#[test]
fn settings_patch_merges_shallowly() {
    let state = reduce(
        &initial(),
        &Action::UpdateSettings(SettingsPatch {
            theme: Some(Theme::Dark),
            ..SettingsPatch::default()
        }),
    );
    assert_eq!(
        state.settings,
        Settings {
            theme: Theme::Dark,
            ..Settings::default()
        }
    );
}

#[test]
fn logout_resets_everything() {
    let profile = UserProfile {
        user_id: UserId(7),
        display_name: "Jane".into(),
        email: "jane@example.com".into(),
        assigned_number: Some("+15550001111".into()),
    };
    let mut state = reduce(&initial(), &Action::SetUser(Some(profile)));
    state = reduce(&state, &Action::SetAuthenticated(true));
    state = reduce(&state, &Action::AddCall(call_at(0)));
    state = reduce(&state, &Action::SetContacts(vec![contact(1, "Mom")]));
    state = reduce(&state, &Action::SetError(Some("boom".into())));
    assert_eq!(state.user_id(), Some(UserId(7)));

    let out = reduce(&state, &Action::Logout);
    assert_eq!(*out, SessionState::default());

    let again = reduce(&out, &Action::Logout);
    assert!(Arc::ptr_eq(&out, &again));
}

#[test]
fn user_id_requires_authentication() {
    let profile = UserProfile {
        user_id: UserId(7),
        display_name: "Jane".into(),
        email: "jane@example.com".into(),
        assigned_number: None,
    };
    let state = reduce(&initial(), &Action::SetUser(Some(profile)));
    assert_eq!(state.user_id(), None);
    let state = reduce(&state, &Action::SetAuthenticated(true));
    assert_eq!(state.user_id(), Some(UserId(7)));
}

#[test]
fn actions_round_trip_through_tagged_json() {
    let action = Action::SetVoiceReady(true);
    let json = serde_json::to_value(&action).unwrap();
    assert_eq!(json["type"], "set_voice_ready");
    assert_eq!(json["payload"], true);
}
