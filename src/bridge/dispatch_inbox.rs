//! # Inbox Dispatch Handlers
//!
//! Fetchers are native objects the host refers to by an opaque id. The id is
//! reserved before the SDK is asked for a fetcher and published once the
//! fetcher is ready, so a failed creation never leaves a dangling entry.
//!
//! ```text
//! inbox.create*Fetcher ──► reserve id ──► SDK builds fetcher ──► fulfill ──► "id"
//!                                              │
//!                                              └─ error: reservation dropped
//!
//! inbox.<op> {fetcherID} ──► registry.get(id) ──► fetcher.<op>
//! inbox.releaseFetcher {fetcherID} ──► registry.release(id)
//! ```

use std::sync::Arc;

use super::dispatcher::{run_on, sdk_err, settle, DPromise};
use super::Bridge;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::promise::Promise;
use crate::sdk::{Completion, FetchedPage, InboxFetcher, InboxNotification, SdkResult};
use crate::value::Value;

const FETCHER_ID: &str = "fetcherID";
const NOTIFICATION_ID: &str = "notifID";

// ============================================================================
// FETCHER LIFECYCLE
// ============================================================================

/// Page size and limit overrides; non-positive values are ignored
#[derive(Debug, Clone, Copy, Default)]
struct Paging {
    max_page_size: Option<u32>,
    limit: Option<u32>,
}

impl Paging {
    fn from_params(params: &Parameters) -> Self {
        let positive = |key: &str| {
            params
                .get_i64(key)
                .filter(|v| *v > 0)
                .and_then(|v| u32::try_from(v).ok())
        };
        Self {
            max_page_size: positive("maxPageSize"),
            limit: positive("limit"),
        }
    }

    fn apply(&self, fetcher: &dyn InboxFetcher) {
        if let Some(size) = self.max_page_size {
            fetcher.set_max_page_size(size);
        }
        if let Some(limit) = self.limit {
            fetcher.set_limit(limit);
        }
    }
}

pub fn create_installation_fetcher(bridge: &Bridge, params: &Parameters) -> DPromise {
    let inbox = bridge.sdk().inbox.clone();
    register_fetcher(bridge, Paging::from_params(params), move |completion| {
        inbox.installation_fetcher(completion)
    })
}

pub fn create_user_fetcher(bridge: &Bridge, params: &Parameters) -> DPromise {
    let credentials = params.require_str("user").and_then(|user| {
        let auth_key = params.require_str("authKey")?;
        Ok((user.to_string(), auth_key.to_string()))
    });
    let (user, auth_key) = match credentials {
        Ok(credentials) => credentials,
        Err(e) => return Promise::rejected(e),
    };

    let inbox = bridge.sdk().inbox.clone();
    register_fetcher(bridge, Paging::from_params(params), move |completion| {
        inbox.user_fetcher(&user, &auth_key, completion)
    })
}

/// Reserve an id, let `build` create the fetcher, then publish it
fn register_fetcher<F>(bridge: &Bridge, paging: Paging, build: F) -> DPromise
where
    F: FnOnce(Completion<Arc<dyn InboxFetcher>>),
{
    let reservation = bridge.fetchers().reserve();
    tracing::debug!(fetcher_id = reservation.id(), "Creating inbox fetcher");

    Promise::new(move |resolver| {
        build(Box::new(move |result: SdkResult<Arc<dyn InboxFetcher>>| {
            let outcome = result
                .map_err(|e| sdk_err("Failed to initialize the fetcher", e))
                .and_then(|fetcher| {
                    paging.apply(fetcher.as_ref());
                    reservation.fulfill(fetcher)
                })
                .map(Value::from);
            resolver.complete(outcome);
        }));
        Ok(())
    })
}

/// Idempotent: releasing an unknown id is not an error
pub fn release_fetcher(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(params.require_str(FETCHER_ID).map(|id| {
        if bridge.fetchers().release(id) {
            tracing::debug!(fetcher_id = id, "Released inbox fetcher");
        }
        Value::Null
    }))
}

fn lookup(bridge: &Bridge, params: &Parameters) -> Result<Arc<dyn InboxFetcher>> {
    bridge.fetchers().get(params.require_str(FETCHER_ID)?)
}

// ============================================================================
// FETCHING
// ============================================================================

pub fn fetch_new_notifications(bridge: &Bridge, params: &Parameters) -> DPromise {
    let fetcher = lookup(bridge, params);
    Promise::new(move |resolver| {
        fetcher?.fetch_new_notifications(Box::new(move |result: SdkResult<FetchedPage>| {
            resolver.complete(
                result
                    .map(|page| page_to_value(&page, true))
                    .map_err(|e| Error::Inbox(format!("fetchNewNotifications failed: {e}"))),
            );
        }));
        Ok(())
    })
}

pub fn fetch_next_page(bridge: &Bridge, params: &Parameters) -> DPromise {
    let fetcher = lookup(bridge, params);
    Promise::new(move |resolver| {
        fetcher?.fetch_next_page(Box::new(move |result: SdkResult<FetchedPage>| {
            resolver.complete(
                result
                    .map(|page| page_to_value(&page, false))
                    .map_err(|e| Error::Inbox(format!("fetchNextPage failed: {e}"))),
            );
        }));
        Ok(())
    })
}

pub fn get_fetched_notifications(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(lookup(bridge, params).map(|fetcher| {
        Parameters::new()
            .with("notifications", notifications_to_value(&fetcher.fetched_notifications()))
            .into()
    }))
}

// ============================================================================
// NOTIFICATION OPERATIONS
// ============================================================================

pub fn mark_as_read(bridge: &Bridge, params: &Parameters) -> DPromise {
    on_notification(bridge, params, false, |fetcher, notification| {
        fetcher.mark_as_read(notification)
    })
}

pub fn mark_as_deleted(bridge: &Bridge, params: &Parameters) -> DPromise {
    on_notification(bridge, params, false, |fetcher, notification| {
        fetcher.mark_as_deleted(notification)
    })
}

pub fn display_landing_message(bridge: &Bridge, params: &Parameters) -> DPromise {
    on_notification(bridge, params, true, |fetcher, notification| {
        fetcher.display_landing_message(notification)
    })
}

pub fn mark_all_as_read(bridge: &Bridge, params: &Parameters) -> DPromise {
    let fetcher = match lookup(bridge, params) {
        Ok(fetcher) => fetcher,
        Err(e) => return Promise::rejected(e),
    };
    run_on(bridge.contexts().background.as_ref(), move || {
        fetcher.mark_all_as_read();
        Ok(Value::Null)
    })
}

/// Find `notifID` among the fetched notifications and run `op` on it.
///
/// UI operations run on the main executor, the rest in the background. An id
/// that is not (or no longer) fetched is logged and resolves null.
fn on_notification<F>(bridge: &Bridge, params: &Parameters, ui: bool, op: F) -> DPromise
where
    F: FnOnce(&dyn InboxFetcher, &InboxNotification) + Send + 'static,
{
    let target = params
        .require_str(NOTIFICATION_ID)
        .map(str::to_string)
        .and_then(|id| Ok((id, lookup(bridge, params)?)));
    let (id, fetcher) = match target {
        Ok(target) => target,
        Err(e) => return Promise::rejected(e),
    };

    let contexts = bridge.contexts();
    let executor = if ui { &contexts.main } else { &contexts.background };
    run_on(executor.as_ref(), move || {
        let fetched = fetcher.fetched_notifications();
        match fetched.iter().find(|n| n.id == id) {
            Some(notification) => op(fetcher.as_ref(), notification),
            None => tracing::warn!(notification_id = %id, "Notification not found in fetcher, ignoring"),
        }
        Ok(Value::Null)
    })
}

// ============================================================================
// SERIALIZATION
// ============================================================================

fn page_to_value(page: &FetchedPage, include_found_new: bool) -> Value {
    let mut result = Parameters::new()
        .with("notifications", notifications_to_value(&page.notifications))
        .with("endReached", page.end_reached);
    if include_found_new {
        result.insert("foundNew", page.found_new);
    }
    result.into()
}

/// Silent notifications are never handed to the host
fn notifications_to_value(notifications: &[InboxNotification]) -> Value {
    notifications
        .iter()
        .filter(|n| !n.is_silent)
        .map(notification_to_value)
        .collect::<Vec<_>>()
        .into()
}

fn notification_to_value(notification: &InboxNotification) -> Value {
    let mut serialized = Parameters::new()
        .with("id", notification.id.as_str())
        .with("body", notification.body.as_str())
        .with("isUnread", notification.is_unread)
        .with("date", notification.date.timestamp_millis())
        .with("source", notification.source.code())
        .with("payload", notification.payload.clone())
        .with("hasLandingMessage", notification.has_landing_message);
    if let Some(title) = &notification.title {
        serialized.insert("title", title.as_str());
    }
    serialized.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::{configured, configured_threaded};
    use crate::error::ErrorCode;
    use crate::sdk::memory::sample_notification;

    fn create_fetcher(bridge: &Bridge, params: Parameters) -> String {
        bridge
            .dispatch("inbox.createInstallationFetcher", params)
            .wait_blocking()
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }

    fn with_fetcher(id: &str) -> Parameters {
        Parameters::new().with(FETCHER_ID, id)
    }

    fn ids(result: &Value) -> Vec<String> {
        result
            .as_map()
            .unwrap()
            .get_list("notifications")
            .unwrap()
            .iter()
            .map(|n| n.as_map().unwrap().get_str("id").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_installation_fetcher_flow() {
        let (bridge, memory) = configured();
        let mut silent = sample_notification("silent");
        silent.is_silent = true;
        memory.seed_inbox(vec![sample_notification("a"), silent, sample_notification("b")]);

        let id = create_fetcher(&bridge, Parameters::new());
        assert!(bridge.fetchers().contains(&id));

        let page = bridge
            .dispatch("inbox.fetchNewNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert_eq!(ids(&page), vec!["a", "b"]);
        let page_map = page.as_map().unwrap();
        assert_eq!(page_map.get_bool("endReached"), Some(true));
        assert_eq!(page_map.get_bool("foundNew"), Some(true));

        let first = page_map.get_list("notifications").unwrap()[0].as_map().unwrap().clone();
        assert_eq!(first.get_str("title"), Some("Title a"));
        assert_eq!(first.get_i64("source"), Some(1));
        assert_eq!(first.get_bool("isUnread"), Some(true));
        assert_eq!(first.get_i64("date"), Some(1_700_000_000_000));
        assert_eq!(first.get_map("payload").unwrap().get_str("com.batch"), Some("{}"));

        let fetched = bridge
            .dispatch("inbox.getFetchedNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert_eq!(ids(&fetched), vec!["a", "b"]);
    }

    #[test]
    fn test_paging_options() {
        let (bridge, memory) = configured();
        memory.seed_inbox((0..5).map(|i| sample_notification(&i.to_string())).collect());

        let params = Parameters::new().with("maxPageSize", 2).with("limit", 3);
        let id = create_fetcher(&bridge, params);

        let page = bridge
            .dispatch("inbox.fetchNewNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert_eq!(ids(&page), vec!["0", "1"]);
        assert_eq!(page.as_map().unwrap().get_bool("endReached"), Some(false));

        let page = bridge
            .dispatch("inbox.fetchNextPage", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert_eq!(ids(&page), vec!["2"]);
        assert_eq!(page.as_map().unwrap().get_bool("endReached"), Some(true));
        assert!(!page.as_map().unwrap().contains_key("foundNew"));
    }

    #[test]
    fn test_non_positive_paging_ignored() {
        let paging = Paging::from_params(&Parameters::new().with("maxPageSize", 0).with("limit", -3));
        assert_eq!(paging.max_page_size, None);
        assert_eq!(paging.limit, None);
    }

    #[test]
    fn test_released_fetcher_not_found() {
        let (bridge, _memory) = configured();
        let id = create_fetcher(&bridge, Parameters::new());

        let released = bridge.dispatch("inbox.releaseFetcher", with_fetcher(&id)).wait_blocking();
        assert_eq!(released, Ok(Value::Null));
        // Releasing twice is fine
        let released = bridge.dispatch("inbox.releaseFetcher", with_fetcher(&id)).wait_blocking();
        assert_eq!(released, Ok(Value::Null));

        let err = bridge
            .dispatch("inbox.fetchNextPage", with_fetcher(&id))
            .wait_blocking()
            .unwrap_err();
        assert_eq!(err, Error::FetcherNotFound(id));
        assert_eq!(err.code(), Some(ErrorCode::InternalBridgeError));
    }

    #[test]
    fn test_missing_fetcher_id() {
        let (bridge, _memory) = configured();
        let result = bridge
            .dispatch("inbox.getFetchedNotifications", Parameters::new())
            .wait_blocking();
        assert_eq!(result, Err(Error::bad_argument(FETCHER_ID)));
    }

    #[test]
    fn test_user_fetcher() {
        let (bridge, memory) = configured();

        let params = Parameters::new().with("user", "u1");
        let result = bridge.dispatch("inbox.createUserFetcher", params).wait_blocking();
        assert_eq!(result, Err(Error::bad_argument("authKey")));
        assert!(!memory.was_called("inbox.user_fetcher"));

        let params = Parameters::new().with("user", "u1").with("authKey", "");
        let err = bridge
            .dispatch("inbox.createUserFetcher", params)
            .wait_blocking()
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InternalSdkError));
        assert!(bridge.fetchers().is_empty());

        let params = Parameters::new().with("user", "u1").with("authKey", "secret");
        let id = bridge
            .dispatch("inbox.createUserFetcher", params)
            .wait_blocking()
            .unwrap();
        assert!(bridge.fetchers().contains(id.as_str().unwrap()));
    }

    #[test]
    fn test_fetch_failure_is_inbox_error() {
        let (bridge, memory) = configured();
        let id = create_fetcher(&bridge, Parameters::new());
        memory.fail_inbox(true);

        let err = bridge
            .dispatch("inbox.fetchNewNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InboxError));
    }

    #[test]
    fn test_mark_operations() {
        let (bridge, memory) = configured_threaded();
        memory.seed_inbox(vec![sample_notification("a"), sample_notification("b")]);
        let id = create_fetcher(&bridge, Parameters::new());
        bridge
            .dispatch("inbox.fetchNewNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap();

        let params = with_fetcher(&id).with(NOTIFICATION_ID, "a");
        let result = bridge.dispatch("inbox.markAsRead", params).wait_blocking();
        assert_eq!(result, Ok(Value::Null));

        let params = with_fetcher(&id).with(NOTIFICATION_ID, "b");
        bridge.dispatch("inbox.markAsDeleted", params).wait_blocking().unwrap();

        let fetched = bridge
            .dispatch("inbox.getFetchedNotifications", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert_eq!(ids(&fetched), vec!["a"]);
        let first = fetched.as_map().unwrap().get_list("notifications").unwrap()[0].clone();
        assert_eq!(first.as_map().unwrap().get_bool("isUnread"), Some(false));

        let params = with_fetcher(&id).with(NOTIFICATION_ID, "a");
        bridge
            .dispatch("inbox.displayLandingMessage", params)
            .wait_blocking()
            .unwrap();
        assert!(memory.was_called("inbox.display_landing_message:a"));

        bridge
            .dispatch("inbox.markAllAsRead", with_fetcher(&id))
            .wait_blocking()
            .unwrap();
        assert!(memory.was_called("inbox.mark_all_as_read"));
    }

    #[test]
    fn test_unknown_notification_resolves_null() {
        let (bridge, memory) = configured();
        let id = create_fetcher(&bridge, Parameters::new());

        let params = with_fetcher(&id).with(NOTIFICATION_ID, "ghost");
        let result = bridge.dispatch("inbox.markAsRead", params).wait_blocking();
        assert_eq!(result, Ok(Value::Null));
        assert!(!memory.was_called("inbox.mark_as_read"));
    }

    #[test]
    fn test_notification_id_checked_before_fetcher() {
        let (bridge, _memory) = configured();
        let result = bridge
            .dispatch("inbox.markAsDeleted", with_fetcher("nope"))
            .wait_blocking();
        assert_eq!(result, Err(Error::bad_argument(NOTIFICATION_ID)));

        let params = with_fetcher("nope").with(NOTIFICATION_ID, "a");
        let result = bridge.dispatch("inbox.markAsDeleted", params).wait_blocking();
        assert_eq!(result, Err(Error::FetcherNotFound("nope".into())));
    }
}
