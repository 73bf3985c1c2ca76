//! In-memory SDK (for development/testing)
//!
//! Implements every capability on top of plain maps and records each call,
//! so tests can assert that the bridge delegated what it should. Failure
//! switches (`fail_fetches`, `fail_inbox`, ...) let tests exercise the error
//! paths of asynchronous operations.
//!
//! Completions are invoked synchronously on the calling thread.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::{Mutex, RwLock};

use super::{
    AttributeValue, DataCollectionConfig, DebugCapability, EventAttributes, FetchedPage,
    InboxCapability, InboxFetcher, InboxNotification, LifecycleCapability, Location,
    MessagingCapability, NotificationSource, ProfileCapability, ProfileEditor, PushCapability,
    Completion, Sdk, SdkError, SdkResult, StartOptions, SubscriptionState, UserAttribute,
    UserCapability,
};
use crate::params::Parameters;

/// Page size used by fetchers that were not given one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Profile data written through editors
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileData {
    /// Language override
    pub language: Option<String>,
    /// Region override
    pub region: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Marketing subscription
    pub subscription: Option<SubscriptionState>,
    /// Custom attributes
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<String>>,

    // Lifecycle
    started: RwLock<Option<(String, StartOptions)>>,
    opted_out: RwLock<bool>,
    fail_opt_out: RwLock<bool>,
    data_collection: RwLock<DataCollectionConfig>,

    // Push
    push_token: RwLock<Option<String>>,
    show_foreground_notifications: RwLock<bool>,
    show_notifications: RwLock<bool>,

    // User
    installation_id: RwLock<Option<String>>,
    identifier: RwLock<Option<String>>,
    attributes: RwLock<BTreeMap<String, UserAttribute>>,
    tags: RwLock<BTreeMap<String, BTreeSet<String>>>,
    fail_fetches: RwLock<bool>,

    // Profile
    profile: RwLock<ProfileData>,
    saves: RwLock<usize>,
    rejected_key: RwLock<Option<String>>,
    events: RwLock<Vec<(String, Option<EventAttributes>)>>,
    transactions: RwLock<Vec<(f64, Option<Parameters>)>>,
    locations: RwLock<Vec<Location>>,

    // Messaging
    do_not_disturb: RwLock<bool>,
    pending_message: RwLock<bool>,

    // Inbox
    inbox: RwLock<Vec<InboxNotification>>,
    fail_inbox: RwLock<bool>,
}

/// In-memory implementation of every SDK capability
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct MemorySdk {
    inner: Arc<Inner>,
}

impl MemorySdk {
    /// Fresh SDK: not started, opted in, notifications shown
    pub fn new() -> Self {
        let sdk = Self::default();
        *sdk.inner.show_notifications.write() = true;
        sdk
    }

    /// Bundle this SDK as every capability
    pub fn sdk(&self) -> Sdk {
        Sdk {
            lifecycle: Arc::new(self.clone()),
            push: Arc::new(self.clone()),
            user: Arc::new(self.clone()),
            profile: Arc::new(self.clone()),
            messaging: Arc::new(self.clone()),
            inbox: Arc::new(self.clone()),
            debug: Arc::new(self.clone()),
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.inner.calls.lock().push(call.into());
    }

    // ========================================================================
    // Seeding and failure switches
    // ========================================================================

    /// Set the installation id
    pub fn set_installation_id(&self, id: Option<&str>) {
        *self.inner.installation_id.write() = id.map(str::to_string);
    }

    /// Set the last known push token
    pub fn set_push_token(&self, token: Option<&str>) {
        *self.inner.push_token.write() = token.map(str::to_string);
    }

    /// Seed an installation attribute
    pub fn seed_attribute(&self, key: &str, value: UserAttribute) {
        self.inner.attributes.write().insert(key.to_string(), value);
    }

    /// Seed a tag
    pub fn seed_tag(&self, collection: &str, tag: &str) {
        self.inner
            .tags
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(tag.to_string());
    }

    /// Seed the inbox
    pub fn seed_inbox(&self, notifications: Vec<InboxNotification>) {
        *self.inner.inbox.write() = notifications;
    }

    /// Hold a message back as if do-not-disturb had been on
    pub fn set_pending_message(&self, pending: bool) {
        *self.inner.pending_message.write() = pending;
    }

    /// Make attribute and tag fetches fail
    pub fn fail_fetches(&self, fail: bool) {
        *self.inner.fail_fetches.write() = fail;
    }

    /// Make inbox fetches and user fetcher creation fail
    pub fn fail_inbox(&self, fail: bool) {
        *self.inner.fail_inbox.write() = fail;
    }

    /// Make opt-out report an error (the opt-out itself still happens)
    pub fn fail_opt_out(&self, fail: bool) {
        *self.inner.fail_opt_out.write() = fail;
    }

    /// Make editors refuse writes to `key`
    pub fn reject_attribute_key(&self, key: Option<&str>) {
        *self.inner.rejected_key.write() = key.map(str::to_string);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Every call made so far, as `capability.method` strings
    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().clone()
    }

    /// Whether a call with this name was made
    pub fn was_called(&self, call: &str) -> bool {
        self.inner.calls.lock().iter().any(|c| c == call)
    }

    /// API key and options the SDK was started with
    pub fn started(&self) -> Option<(String, StartOptions)> {
        self.inner.started.read().clone()
    }

    /// Current data collection settings
    pub fn data_collection(&self) -> DataCollectionConfig {
        *self.inner.data_collection.read()
    }

    /// Saved profile data
    pub fn profile(&self) -> ProfileData {
        self.inner.profile.read().clone()
    }

    /// Number of saved edit batches
    pub fn saves(&self) -> usize {
        *self.inner.saves.read()
    }

    /// Tracked events
    pub fn events(&self) -> Vec<(String, Option<EventAttributes>)> {
        self.inner.events.read().clone()
    }

    /// Tracked transactions
    pub fn transactions(&self) -> Vec<(f64, Option<Parameters>)> {
        self.inner.transactions.read().clone()
    }

    /// Tracked locations
    pub fn locations(&self) -> Vec<Location> {
        self.inner.locations.read().clone()
    }

    /// Current do-not-disturb state
    pub fn do_not_disturb(&self) -> bool {
        *self.inner.do_not_disturb.read()
    }

    /// Current foreground display flag
    pub fn shows_foreground_notifications(&self) -> bool {
        *self.inner.show_foreground_notifications.read()
    }
}

/// A visible notification with deterministic content
pub fn sample_notification(id: &str) -> InboxNotification {
    InboxNotification {
        id: id.to_string(),
        title: Some(format!("Title {id}")),
        body: format!("Body {id}"),
        is_unread: true,
        date: Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap_or_default(),
        source: NotificationSource::Campaign,
        payload: Parameters::new().with("com.batch", "{}"),
        is_silent: false,
        has_landing_message: false,
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

impl LifecycleCapability for MemorySdk {
    fn start(&self, api_key: &str, options: &StartOptions) {
        self.record("lifecycle.start");
        *self.inner.started.write() = Some((api_key.to_string(), options.clone()));
    }

    fn opt_in(&self) {
        self.record("lifecycle.opt_in");
        *self.inner.opted_out.write() = false;
    }

    fn opt_out(&self, wipe_data: bool, completion: Completion<()>) {
        self.record(if wipe_data {
            "lifecycle.opt_out_and_wipe_data"
        } else {
            "lifecycle.opt_out"
        });
        *self.inner.opted_out.write() = true;
        if wipe_data {
            self.inner.attributes.write().clear();
            self.inner.tags.write().clear();
        }
        if *self.inner.fail_opt_out.read() {
            completion(Err(SdkError::new("opt-out could not reach the server")));
        } else {
            completion(Ok(()));
        }
    }

    fn is_opted_out(&self) -> bool {
        *self.inner.opted_out.read()
    }

    fn update_automatic_data_collection(&self, config: DataCollectionConfig) {
        self.record("lifecycle.update_automatic_data_collection");
        let mut current = self.inner.data_collection.write();
        if config.device_model.is_some() {
            current.device_model = config.device_model;
        }
        if config.geo_ip.is_some() {
            current.geo_ip = config.geo_ip;
        }
    }
}

// ============================================================================
// PUSH
// ============================================================================

impl PushCapability for MemorySdk {
    fn refresh_token(&self) {
        self.record("push.refresh_token");
    }

    fn request_permission(&self) {
        self.record("push.request_permission");
    }

    fn request_provisional_permission(&self) {
        self.record("push.request_provisional_permission");
    }

    fn dismiss_notifications(&self) {
        self.record("push.dismiss_notifications");
    }

    fn clear_badge(&self) {
        self.record("push.clear_badge");
    }

    fn last_known_push_token(&self) -> Option<String> {
        self.inner.push_token.read().clone()
    }

    fn set_show_foreground_notifications(&self, enabled: bool) {
        self.record("push.set_show_foreground_notifications");
        *self.inner.show_foreground_notifications.write() = enabled;
    }

    fn set_show_notifications(&self, enabled: bool) {
        self.record("push.set_show_notifications");
        *self.inner.show_notifications.write() = enabled;
    }

    fn should_show_notifications(&self) -> bool {
        *self.inner.show_notifications.read()
    }
}

// ============================================================================
// USER
// ============================================================================

impl UserCapability for MemorySdk {
    fn installation_id(&self) -> Option<String> {
        self.inner.installation_id.read().clone()
    }

    fn identifier(&self) -> Option<String> {
        self.inner.identifier.read().clone()
    }

    fn language(&self) -> Option<String> {
        self.inner.profile.read().language.clone()
    }

    fn region(&self) -> Option<String> {
        self.inner.profile.read().region.clone()
    }

    fn fetch_attributes(&self, completion: Completion<BTreeMap<String, UserAttribute>>) {
        self.record("user.fetch_attributes");
        if *self.inner.fail_fetches.read() {
            completion(Err(SdkError::new("attribute fetch failed")));
        } else {
            completion(Ok(self.inner.attributes.read().clone()));
        }
    }

    fn fetch_tags(&self, completion: Completion<BTreeMap<String, BTreeSet<String>>>) {
        self.record("user.fetch_tags");
        if *self.inner.fail_fetches.read() {
            completion(Err(SdkError::new("tag fetch failed")));
        } else {
            completion(Ok(self.inner.tags.read().clone()));
        }
    }

    fn clear_installation_data(&self) {
        self.record("user.clear_installation_data");
        self.inner.attributes.write().clear();
        self.inner.tags.write().clear();
        *self.inner.identifier.write() = None;
    }
}

// ============================================================================
// PROFILE
// ============================================================================

struct MemoryEditor {
    sdk: MemorySdk,
    draft: ProfileData,
}

impl MemoryEditor {
    fn check_key(&self, key: &str) -> SdkResult<()> {
        match self.sdk.inner.rejected_key.read().as_deref() {
            Some(rejected) if rejected == key => {
                Err(SdkError::new(format!("attribute key '{key}' is not allowed")))
            }
            _ => Ok(()),
        }
    }

    fn string_array(&mut self, key: &str) -> SdkResult<&mut Vec<String>> {
        let entry = self
            .draft
            .attributes
            .entry(key.to_string())
            .or_insert_with(|| AttributeValue::StringArray(Vec::new()));
        match entry {
            AttributeValue::StringArray(items) => Ok(items),
            _ => Err(SdkError::new(format!("attribute '{key}' is not a string array"))),
        }
    }
}

impl ProfileEditor for MemoryEditor {
    fn set_language(&mut self, language: Option<&str>) -> SdkResult<()> {
        self.draft.language = language.map(str::to_string);
        Ok(())
    }

    fn set_region(&mut self, region: Option<&str>) -> SdkResult<()> {
        self.draft.region = region.map(str::to_string);
        Ok(())
    }

    fn set_email_address(&mut self, email: Option<&str>) -> SdkResult<()> {
        match email {
            Some(address) if !address.contains('@') => {
                Err(SdkError::new(format!("invalid email address '{address}'")))
            }
            _ => {
                self.draft.email = email.map(str::to_string);
                Ok(())
            }
        }
    }

    fn set_email_marketing_subscription(&mut self, state: SubscriptionState) -> SdkResult<()> {
        self.draft.subscription = Some(state);
        Ok(())
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) -> SdkResult<()> {
        self.check_key(key)?;
        self.draft.attributes.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_attribute(&mut self, key: &str) -> SdkResult<()> {
        self.draft.attributes.remove(key);
        Ok(())
    }

    fn add_to_string_array(&mut self, key: &str, item: &str) -> SdkResult<()> {
        self.check_key(key)?;
        let items = self.string_array(key)?;
        if !items.iter().any(|i| i == item) {
            items.push(item.to_string());
        }
        Ok(())
    }

    fn remove_from_string_array(&mut self, key: &str, item: &str) -> SdkResult<()> {
        self.check_key(key)?;
        self.string_array(key)?.retain(|i| i != item);
        Ok(())
    }

    fn save(self: Box<Self>) {
        let MemoryEditor { sdk, draft } = *self;
        sdk.record("profile.save");
        *sdk.inner.profile.write() = draft;
        *sdk.inner.saves.write() += 1;
    }
}

impl ProfileCapability for MemorySdk {
    fn identify(&self, identifier: Option<&str>) {
        self.record("profile.identify");
        *self.inner.identifier.write() = identifier.map(str::to_string);
    }

    fn editor(&self) -> Box<dyn ProfileEditor> {
        Box::new(MemoryEditor {
            sdk: self.clone(),
            draft: self.inner.profile.read().clone(),
        })
    }

    fn track_event(&self, name: &str, attributes: Option<EventAttributes>) {
        self.record("profile.track_event");
        self.inner.events.write().push((name.to_string(), attributes));
    }

    fn track_transaction(&self, amount: f64, data: Option<Parameters>) {
        self.record("profile.track_transaction");
        self.inner.transactions.write().push((amount, data));
    }

    fn track_location(&self, location: Location) {
        self.record("profile.track_location");
        self.inner.locations.write().push(location);
    }
}

// ============================================================================
// MESSAGING
// ============================================================================

impl MessagingCapability for MemorySdk {
    fn show_pending_message(&self) -> bool {
        self.record("messaging.show_pending_message");
        std::mem::take(&mut *self.inner.pending_message.write())
    }

    fn set_do_not_disturb(&self, enabled: bool) {
        self.record("messaging.set_do_not_disturb");
        *self.inner.do_not_disturb.write() = enabled;
    }
}

// ============================================================================
// INBOX
// ============================================================================

#[derive(Default)]
struct FetcherState {
    max_page_size: Option<usize>,
    limit: Option<usize>,
    cursor: usize,
    fetched: Vec<InboxNotification>,
}

/// Fetcher paging over the SDK's seeded inbox
pub struct MemoryFetcher {
    sdk: MemorySdk,
    user: Option<String>,
    state: Mutex<FetcherState>,
}

impl MemoryFetcher {
    /// User this fetcher was created for, if any
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    fn next_page(&self, reset: bool) -> SdkResult<FetchedPage> {
        if *self.sdk.inner.fail_inbox.read() {
            return Err(SdkError::new("inbox server unreachable"));
        }

        let inbox = self.sdk.inner.inbox.read();
        let mut state = self.state.lock();
        if reset {
            state.cursor = 0;
            state.fetched.clear();
        }

        let available = state.limit.map_or(inbox.len(), |l| l.min(inbox.len()));
        let page_size = state.max_page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let start = state.cursor.min(available);
        let end = (start + page_size).min(available);

        let page: Vec<InboxNotification> = inbox[start..end].to_vec();
        state.cursor = end;
        state.fetched.extend(page.iter().cloned());

        Ok(FetchedPage {
            found_new: reset && !page.is_empty(),
            notifications: page,
            end_reached: end >= available,
        })
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut Vec<InboxNotification>, usize)) {
        let mut state = self.state.lock();
        if let Some(index) = state.fetched.iter().position(|n| n.id == id) {
            apply(&mut state.fetched, index);
        }
    }
}

impl InboxFetcher for MemoryFetcher {
    fn set_max_page_size(&self, size: u32) {
        self.state.lock().max_page_size = Some(size as usize);
    }

    fn set_limit(&self, limit: u32) {
        self.state.lock().limit = Some(limit as usize);
    }

    fn fetch_new_notifications(&self, completion: Completion<FetchedPage>) {
        self.sdk.record("inbox.fetch_new_notifications");
        completion(self.next_page(true));
    }

    fn fetch_next_page(&self, completion: Completion<FetchedPage>) {
        self.sdk.record("inbox.fetch_next_page");
        completion(self.next_page(false));
    }

    fn fetched_notifications(&self) -> Vec<InboxNotification> {
        self.state.lock().fetched.clone()
    }

    fn mark_as_read(&self, notification: &InboxNotification) {
        self.sdk.record("inbox.mark_as_read");
        self.update(&notification.id, |fetched, i| fetched[i].is_unread = false);
    }

    fn mark_all_as_read(&self) {
        self.sdk.record("inbox.mark_all_as_read");
        for notification in self.state.lock().fetched.iter_mut() {
            notification.is_unread = false;
        }
    }

    fn mark_as_deleted(&self, notification: &InboxNotification) {
        self.sdk.record("inbox.mark_as_deleted");
        self.update(&notification.id, |fetched, i| {
            fetched.remove(i);
        });
    }

    fn display_landing_message(&self, notification: &InboxNotification) {
        self.sdk
            .record(format!("inbox.display_landing_message:{}", notification.id));
    }
}

impl MemorySdk {
    fn fetcher(&self, user: Option<&str>) -> Arc<dyn InboxFetcher> {
        Arc::new(MemoryFetcher {
            sdk: self.clone(),
            user: user.map(str::to_string),
            state: Mutex::new(FetcherState::default()),
        })
    }
}

impl InboxCapability for MemorySdk {
    fn installation_fetcher(&self, completion: Completion<Arc<dyn InboxFetcher>>) {
        self.record("inbox.installation_fetcher");
        completion(Ok(self.fetcher(None)));
    }

    fn user_fetcher(&self, user: &str, auth_key: &str, completion: Completion<Arc<dyn InboxFetcher>>) {
        self.record("inbox.user_fetcher");
        if *self.inner.fail_inbox.read() || auth_key.is_empty() {
            completion(Err(SdkError::new("could not create a user inbox fetcher")));
        } else {
            completion(Ok(self.fetcher(Some(user))));
        }
    }
}

// ============================================================================
// DEBUG
// ============================================================================

impl DebugCapability for MemorySdk {
    fn show_debug_view(&self) -> bool {
        self.record("debug.show_debug_view");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn fetch(fetcher: &dyn InboxFetcher, reset: bool) -> SdkResult<FetchedPage> {
        let (tx, rx) = mpsc::channel();
        let completion: Completion<FetchedPage> = Box::new(move |r| tx.send(r).unwrap());
        if reset {
            fetcher.fetch_new_notifications(completion);
        } else {
            fetcher.fetch_next_page(completion);
        }
        rx.recv().unwrap()
    }

    fn installation_fetcher(sdk: &MemorySdk) -> Arc<dyn InboxFetcher> {
        let (tx, rx) = mpsc::channel();
        sdk.installation_fetcher(Box::new(move |r| {
            let _ = tx.send(r);
        }));
        rx.recv().unwrap().unwrap()
    }

    #[test]
    fn test_fetcher_pages_through_inbox() {
        let sdk = MemorySdk::new();
        sdk.seed_inbox((0..5).map(|i| sample_notification(&format!("n{i}"))).collect());
        let fetcher = installation_fetcher(&sdk);
        fetcher.set_max_page_size(2);

        let first = fetch(fetcher.as_ref(), true).unwrap();
        assert_eq!(first.notifications.len(), 2);
        assert!(first.found_new);
        assert!(!first.end_reached);

        let second = fetch(fetcher.as_ref(), false).unwrap();
        let third = fetch(fetcher.as_ref(), false).unwrap();
        assert_eq!(second.notifications.len(), 2);
        assert_eq!(third.notifications.len(), 1);
        assert!(third.end_reached);
        assert_eq!(fetcher.fetched_notifications().len(), 5);
    }

    #[test]
    fn test_fetcher_respects_limit() {
        let sdk = MemorySdk::new();
        sdk.seed_inbox((0..5).map(|i| sample_notification(&format!("n{i}"))).collect());
        let fetcher = installation_fetcher(&sdk);
        fetcher.set_limit(3);

        let page = fetch(fetcher.as_ref(), true).unwrap();
        assert_eq!(page.notifications.len(), 3);
        assert!(page.end_reached);
    }

    #[test]
    fn test_editor_applies_on_save_only() {
        let sdk = MemorySdk::new();
        let mut editor = sdk.editor();
        editor.set_attribute("k", AttributeValue::Integer(5)).unwrap();
        assert!(sdk.profile().attributes.is_empty());

        editor.save();
        assert_eq!(sdk.profile().attributes.get("k"), Some(&AttributeValue::Integer(5)));
        assert_eq!(sdk.saves(), 1);
    }

    #[test]
    fn test_opt_out_failure_still_opts_out() {
        let sdk = MemorySdk::new();
        sdk.fail_opt_out(true);
        let (tx, rx) = mpsc::channel();
        sdk.opt_out(false, Box::new(move |r| tx.send(r.is_err()).unwrap()));
        assert!(rx.recv().unwrap());
        assert!(sdk.is_opted_out());
    }
}
