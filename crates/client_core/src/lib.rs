//! Client-side call lifecycle and session state for the CallGuard dialer.
//!
//! [`SessionStore`] owns the state and routes every change through [`reduce`]; the backend is
//! reached through the [`CallService`] seam, implemented over HTTP by [`HttpCallService`].

pub mod config;
pub mod error;
pub mod http;
pub mod reaper;
pub mod reducer;
pub mod service;
pub mod signup;
pub mod state;
pub mod store;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

pub use config::{load_settings, ClientSettings};
pub use error::{ServiceError, ServiceResult};
pub use http::{HistoryFallback, HttpCallService};
pub use reaper::{StaleCallReaper, VoiceReadyPoller};
pub use reducer::reduce;
pub use service::{AccountLookup, CallService, InitiatedCall, RemoteCallStatus, SignupOutcome};
pub use signup::SignupForm;
pub use state::{Action, CallUpdate, SessionState};
pub use store::{SessionStore, StoreOptions};
