//! Messaging dispatch handlers.

use super::dispatcher::{run_on, settle, DPromise};
use super::Bridge;
use crate::params::Parameters;
use crate::value::Value;

/// Presents UI, so it runs on the main executor
pub fn show_pending_message(bridge: &Bridge) -> DPromise {
    let messaging = bridge.sdk().messaging.clone();
    run_on(bridge.contexts().main.as_ref(), move || {
        let shown = messaging.show_pending_message();
        tracing::debug!(shown, "Pending in-app message");
        Ok(Value::Null)
    })
}

pub fn set_do_not_disturb_enabled(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(params.require_bool("enabled").map(|enabled| {
        bridge.sdk().messaging.set_do_not_disturb(enabled);
        Value::Null
    }))
}
