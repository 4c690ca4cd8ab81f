use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::domain::{CallId, CallRecord};

use crate::state::{Action, CallUpdate, SessionState};

/// Pure state transition. Performs no I/O and never panics.
///
/// Whenever an action leaves the state value unchanged (unknown kinds, updates addressed to
/// calls or contacts that are not there, re-setting a flag to its current value) the same
/// `Arc` is returned, so observers can detect change with `Arc::ptr_eq`.
pub fn reduce(state: &Arc<SessionState>, action: &Action) -> Arc<SessionState> {
    match action {
        Action::SetAuthenticated(authenticated) => edit(state, |next| {
            next.session.authenticated = *authenticated;
        }),
        Action::SetUser(profile) => edit(state, |next| match profile {
            Some(profile) => {
                next.session.user_id = Some(profile.user_id);
                next.session.display_name = profile.display_name.clone();
                next.session.email = profile.email.clone();
                next.session.assigned_number = profile.assigned_number.clone();
            }
            None => {
                let authenticated = next.session.authenticated;
                next.session = Default::default();
                next.session.authenticated = authenticated;
            }
        }),
        Action::SetLoading(loading) => edit(state, |next| next.loading = *loading),
        Action::SetError(error) => edit(state, |next| next.error = error.clone()),
        Action::AddCall(record) => {
            if record.status.is_terminal() || state.find_call(record.id).is_some() {
                return Arc::clone(state);
            }
            edit(state, |next| {
                next.active_calls.insert(record.id, record.clone());
            })
        }
        Action::UpdateCall(update) => update_call(state, update),
        Action::CompleteCall(record) => {
            if !record.status.is_terminal() || !state.active_calls.contains_key(&record.id) {
                return Arc::clone(state);
            }
            edit(state, |next| {
                next.active_calls.remove(&record.id);
                next.call_history.retain(|call| call.id != record.id);
                next.call_history.insert(0, record.clone());
            })
        }
        Action::SetCallHistory(incoming) => {
            let merged = reconcile_history(state, incoming);
            edit(state, |next| next.call_history = merged)
        }
        Action::AddContact(contact) => edit(state, |next| {
            match next.contacts.iter_mut().find(|c| c.id == contact.id) {
                Some(existing) => *existing = contact.clone(),
                None => next.contacts.push(contact.clone()),
            }
        }),
        Action::RemoveContact(contact_id) => edit(state, |next| {
            next.contacts.retain(|contact| contact.id != *contact_id);
        }),
        Action::SetContacts(contacts) => edit(state, |next| next.contacts = contacts.clone()),
        Action::UpdateSettings(patch) => edit(state, |next| {
            next.settings = next.settings.merged(patch);
        }),
        Action::SetVoiceReady(ready) => edit(state, |next| next.voice_ready = *ready),
        Action::Logout => {
            if **state == SessionState::default() {
                Arc::clone(state)
            } else {
                Arc::new(SessionState::default())
            }
        }
        Action::Unknown => Arc::clone(state),
    }
}

fn edit(state: &Arc<SessionState>, apply: impl FnOnce(&mut SessionState)) -> Arc<SessionState> {
    let mut next = SessionState::clone(state);
    apply(&mut next);
    if next == **state {
        Arc::clone(state)
    } else {
        Arc::new(next)
    }
}

fn update_call(state: &Arc<SessionState>, update: &CallUpdate) -> Arc<SessionState> {
    if update.status.is_some_and(|status| status.is_terminal()) {
        return Arc::clone(state);
    }
    if !state.active_calls.contains_key(&update.id) {
        return Arc::clone(state);
    }
    edit(state, |next| {
        let Some(call) = next.active_calls.get_mut(&update.id) else {
            return;
        };
        if let Some(status) = update.status {
            call.status = status;
        }
        if let Some(call_log_id) = update.call_log_id {
            call.call_log_id = Some(call_log_id);
        }
        if let Some(target_number) = &update.target_number {
            call.target_number = target_number.clone();
        }
        if let Some(caller_id_shown) = &update.caller_id_shown {
            call.caller_id_shown = Some(caller_id_shown.clone());
        }
    })
}

/// Merges a server history page into local history.
///
/// Server rows for calls that are still active locally are dropped; a server row that
/// matches a local record by call log id replaces it but keeps the local id; local-only
/// records survive. Result is ordered newest first.
fn reconcile_history(state: &SessionState, incoming: &[CallRecord]) -> Vec<CallRecord> {
    let active_log_ids: HashSet<i64> = state
        .active_calls
        .values()
        .filter_map(|call| call.call_log_id)
        .collect();
    let local_ids_by_log: HashMap<i64, CallId> = state
        .call_history
        .iter()
        .filter_map(|call| call.call_log_id.map(|log_id| (log_id, call.id)))
        .collect();

    let mut merged: Vec<CallRecord> = Vec::with_capacity(incoming.len() + state.call_history.len());
    let mut seen_ids = HashSet::new();
    let mut seen_log_ids = HashSet::new();

    for entry in incoming {
        if !entry.status.is_terminal() {
            continue;
        }
        if let Some(log_id) = entry.call_log_id {
            if active_log_ids.contains(&log_id) || !seen_log_ids.insert(log_id) {
                continue;
            }
        }
        let mut entry = entry.clone();
        if let Some(local_id) = entry
            .call_log_id
            .and_then(|log_id| local_ids_by_log.get(&log_id))
        {
            entry.id = *local_id;
        }
        if state.active_calls.contains_key(&entry.id) || !seen_ids.insert(entry.id) {
            continue;
        }
        merged.push(entry);
    }

    for local in &state.call_history {
        if seen_ids.contains(&local.id) {
            continue;
        }
        if local
            .call_log_id
            .is_some_and(|log_id| seen_log_ids.contains(&log_id))
        {
            continue;
        }
        seen_ids.insert(local.id);
        merged.push(local.clone());
    }

    merged.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    merged
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
