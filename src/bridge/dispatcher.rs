//! # Action Dispatcher
//!
//! Routes a decoded [`Action`] to its handler. The match is exhaustive, so an
//! action without a handler does not compile.
//!
//! Handler implementations live in domain sub-modules:
//!   - `dispatch_optin`     : opt-in / opt-out / data collection
//!   - `dispatch_push`      : push.* actions
//!   - `dispatch_user`      : installation data reads
//!   - `dispatch_profile`   : identify, edit, event/transaction/location
//!   - `dispatch_messaging` : messaging.* actions
//!   - `dispatch_inbox`     : inbox.* actions (fetcher registry)
//!   - `dispatch_debug`     : debug view
//!
//! Every handler returns a `Promise<Value>`. Synchronous handlers return an
//! already settled one; argument errors become rejections, never panics.

use chrono::{DateTime, TimeZone, Utc};

use super::{dispatch_debug, dispatch_inbox, dispatch_messaging, dispatch_optin};
use super::{dispatch_profile, dispatch_push, dispatch_user, Bridge};
use crate::action::Action;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::promise::{Executor, Promise};
use crate::sdk::SdkError;
use crate::value::Value;
use crate::BRIDGE_VERSION;

/// Promise every handler returns
pub type DPromise = Promise<Value>;

// ============================================================================
// HELPERS  (pub(super) so domain modules can use them)
// ============================================================================

/// Resolved with null
pub(super) fn ok_null() -> DPromise {
    Promise::resolved(Value::Null)
}

/// Resolved with `value`
pub(super) fn ok(value: impl Into<Value>) -> DPromise {
    Promise::resolved(value.into())
}

/// Settled from a synchronous handler result
pub(super) fn settle(result: Result<Value>) -> DPromise {
    Promise::from_result(result)
}

/// Run `work` on `executor` and settle with its result
pub(super) fn run_on<X, F>(executor: &X, work: F) -> DPromise
where
    X: Executor + ?Sized,
    F: FnOnce() -> Result<Value> + Send + 'static,
{
    Promise::scheduled(executor, move |resolver| {
        resolver.complete(work());
        Ok(())
    })
}

/// Optional argument: absent or null is `None`, anything else must read as `T`
pub(super) fn optional<'a, T>(
    params: &'a Parameters,
    key: &str,
    read: impl FnOnce(&'a Value) -> Option<T>,
) -> Result<Option<T>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => read(v).map(Some).ok_or_else(|| Error::bad_argument(key)),
    }
}

/// Wrap an SDK failure with what the bridge was doing
pub(super) fn sdk_err(context: &str, err: SdkError) -> Error {
    Error::Sdk(format!("{context}: {err}"))
}

/// Milliseconds since the epoch to a UTC date
pub(super) fn date_from_millis(millis: i64, argument: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::bad_argument(argument))
}

// ============================================================================
// ROUTING
// ============================================================================

/// Run the handler owning `action`
pub(super) fn route(bridge: &Bridge, action: Action, params: &Parameters) -> DPromise {
    match action {
        // Lifecycle
        Action::OptIn => dispatch_optin::opt_in(bridge),
        Action::OptOut => dispatch_optin::opt_out(bridge, false),
        Action::OptOutAndWipeData => dispatch_optin::opt_out(bridge, true),
        Action::IsOptedOut => dispatch_optin::is_opted_out(bridge),
        Action::SetAutomaticDataCollection => {
            dispatch_optin::set_automatic_data_collection(bridge, params)
        }

        // Push
        Action::PushGetLastKnownPushToken => dispatch_push::get_last_known_push_token(bridge),
        Action::PushRequestPermission => dispatch_push::request_permission(bridge),
        Action::PushRequestProvisionalPermission => {
            dispatch_push::request_provisional_permission(bridge)
        }
        Action::PushRefreshToken => dispatch_push::refresh_token(bridge),
        Action::PushClearBadge => dispatch_push::clear_badge(bridge),
        Action::PushDismissNotifications => dispatch_push::dismiss_notifications(bridge),
        Action::PushSetShowForegroundNotifications => {
            dispatch_push::set_show_foreground_notifications(bridge, params)
        }
        Action::PushSetShowNotifications => dispatch_push::set_show_notifications(bridge, params),
        Action::PushShouldShowNotifications => dispatch_push::should_show_notifications(bridge),

        // User
        Action::UserGetInstallationId => dispatch_user::get_installation_id(bridge),
        Action::UserGetIdentifier => dispatch_user::get_identifier(bridge),
        Action::UserGetLanguage => dispatch_user::get_language(bridge),
        Action::UserGetRegion => dispatch_user::get_region(bridge),
        Action::UserFetchAttributes => dispatch_user::fetch_attributes(bridge),
        Action::UserFetchTags => dispatch_user::fetch_tags(bridge),
        Action::UserClearInstallationData => dispatch_user::clear_installation_data(bridge),

        // Profile
        Action::UserIdentify => dispatch_profile::identify(bridge, params),
        Action::UserEdit => dispatch_profile::edit(bridge, params),
        Action::UserTrackEvent => dispatch_profile::track_event(bridge, params),
        Action::UserTrackTransaction => dispatch_profile::track_transaction(bridge, params),
        Action::UserTrackLocation => dispatch_profile::track_location(bridge, params),

        // Messaging
        Action::MessagingShowPendingMessage => dispatch_messaging::show_pending_message(bridge),
        Action::MessagingSetDoNotDisturbEnabled => {
            dispatch_messaging::set_do_not_disturb_enabled(bridge, params)
        }

        // Inbox
        Action::InboxCreateInstallationFetcher => {
            dispatch_inbox::create_installation_fetcher(bridge, params)
        }
        Action::InboxCreateUserFetcher => dispatch_inbox::create_user_fetcher(bridge, params),
        Action::InboxReleaseFetcher => dispatch_inbox::release_fetcher(bridge, params),
        Action::InboxFetchNewNotifications => {
            dispatch_inbox::fetch_new_notifications(bridge, params)
        }
        Action::InboxFetchNextPage => dispatch_inbox::fetch_next_page(bridge, params),
        Action::InboxGetFetchedNotifications => {
            dispatch_inbox::get_fetched_notifications(bridge, params)
        }
        Action::InboxMarkAsRead => dispatch_inbox::mark_as_read(bridge, params),
        Action::InboxMarkAllAsRead => dispatch_inbox::mark_all_as_read(bridge, params),
        Action::InboxMarkAsDeleted => dispatch_inbox::mark_as_deleted(bridge, params),
        Action::InboxDisplayLandingMessage => {
            dispatch_inbox::display_landing_message(bridge, params)
        }

        // Debug
        Action::DebugShowDebugView => dispatch_debug::show_debug_view(bridge),

        // Meta
        Action::Echo => echo(params),
        Action::BridgeVersion => ok(BRIDGE_VERSION),
    }
}

/// Resolve with `value` as given; absent or null echoes null
fn echo(params: &Parameters) -> DPromise {
    ok(params.get("value").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let p = Parameters::new().with("value", "Hello, world!");
        assert_eq!(echo(&p).wait_blocking(), Ok(Value::from("Hello, world!")));

        let p = Parameters::new().with("value", Value::Null);
        assert_eq!(echo(&p).wait_blocking(), Ok(Value::Null));
        assert_eq!(echo(&Parameters::new()).wait_blocking(), Ok(Value::Null));
    }

    #[test]
    fn test_optional_argument() {
        let p = Parameters::new().with("a", 1).with("b", Value::Null).with("c", "x");
        assert_eq!(optional(&p, "a", Value::as_i64), Ok(Some(1)));
        assert_eq!(optional(&p, "b", Value::as_i64), Ok(None));
        assert_eq!(optional(&p, "missing", Value::as_i64), Ok(None));
        assert_eq!(optional(&p, "c", Value::as_i64), Err(Error::bad_argument("c")));
    }

    #[test]
    fn test_date_from_millis() {
        let date = date_from_millis(1_000, "date").unwrap();
        assert_eq!(date.timestamp_millis(), 1_000);
        assert_eq!(date_from_millis(i64::MAX, "date"), Err(Error::bad_argument("date")));
    }

    #[test]
    fn test_sdk_err_keeps_context() {
        let err = sdk_err("fetchAttributes", SdkError::new("offline"));
        assert_eq!(err, Error::Sdk("fetchAttributes: offline".into()));
    }
}
