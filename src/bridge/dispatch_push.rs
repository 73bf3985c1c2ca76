//! Push dispatch handlers.

use super::dispatcher::{ok, ok_null, settle, DPromise};
use super::Bridge;
use crate::params::Parameters;
use crate::value::Value;

pub fn get_last_known_push_token(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().push.last_known_push_token())
}

pub fn request_permission(bridge: &Bridge) -> DPromise {
    bridge.sdk().push.request_permission();
    ok_null()
}

pub fn request_provisional_permission(bridge: &Bridge) -> DPromise {
    bridge.sdk().push.request_provisional_permission();
    ok_null()
}

pub fn refresh_token(bridge: &Bridge) -> DPromise {
    bridge.sdk().push.refresh_token();
    ok_null()
}

pub fn clear_badge(bridge: &Bridge) -> DPromise {
    bridge.sdk().push.clear_badge();
    ok_null()
}

pub fn dismiss_notifications(bridge: &Bridge) -> DPromise {
    bridge.sdk().push.dismiss_notifications();
    ok_null()
}

pub fn set_show_foreground_notifications(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(params.require_bool("enabled").map(|enabled| {
        bridge.sdk().push.set_show_foreground_notifications(enabled);
        Value::Null
    }))
}

pub fn set_show_notifications(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(params.require_bool("enabled").map(|enabled| {
        bridge.sdk().push.set_show_notifications(enabled);
        Value::Null
    }))
}

pub fn should_show_notifications(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().push.should_show_notifications())
}
