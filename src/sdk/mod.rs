//! # SDK Capabilities
//!
//! The bridge never talks to the vendor SDK directly. Each handler group
//! calls one capability trait, implemented by the platform wrapper layer
//! (or by [`memory::MemorySdk`] in tests and demos).
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────┐
//! │ LifecycleCapability  │ start, opt in/out, data collection           │
//! │ PushCapability       │ tokens, permissions, badge, display flags    │
//! │ UserCapability       │ installation data reads, attribute/tag fetch │
//! │ ProfileCapability    │ identify, editor, event/transaction/location │
//! │ MessagingCapability  │ pending in-app message, do-not-disturb       │
//! │ InboxCapability      │ installation / user fetchers                 │
//! │ DebugCapability      │ debug view                                   │
//! └──────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Asynchronous SDK calls report through a [`Completion`] callback, which the
//! handlers wire straight into a promise resolver.

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::params::Parameters;
use crate::value::Value;

// ============================================================================
// COMPLETIONS
// ============================================================================

/// Failure reported by the SDK
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SdkError {
    /// What the SDK said went wrong
    pub message: String,
}

impl SdkError {
    /// Create an SDK error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of an SDK call
pub type SdkResult<T> = std::result::Result<T, SdkError>;

/// Callback the SDK invokes exactly once when an asynchronous call finishes
pub type Completion<T> = Box<dyn FnOnce(SdkResult<T>) + Send + 'static>;

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Automatic profile migrations the SDK can run at start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Migration {
    /// Copy the installation's custom user id onto the profile
    CustomId,
    /// Copy installation custom data onto the profile
    CustomData,
}

/// Options passed to [`LifecycleCapability::start`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StartOptions {
    /// Migrations to skip
    pub disabled_migrations: Vec<Migration>,
    /// Whether the SDK may collect advanced device information
    pub use_advanced_device_information: bool,
}

/// Changes to automatic data collection. `None` leaves a setting untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataCollectionConfig {
    /// Collect the device model
    pub device_model: Option<bool>,
    /// Resolve location from the IP address
    pub geo_ip: Option<bool>,
}

/// SDK start and privacy controls
pub trait LifecycleCapability: Send + Sync {
    /// Start the SDK with an API key
    fn start(&self, api_key: &str, options: &StartOptions);
    /// Opt back in to data collection
    fn opt_in(&self);
    /// Opt out, optionally wiping local data
    fn opt_out(&self, wipe_data: bool, completion: Completion<()>);
    /// Whether the installation is opted out
    fn is_opted_out(&self) -> bool;
    /// Update automatic data collection settings
    fn update_automatic_data_collection(&self, config: DataCollectionConfig);
}

// ============================================================================
// PUSH
// ============================================================================

/// Push notification controls
pub trait PushCapability: Send + Sync {
    /// Ask the platform for a fresh push token
    fn refresh_token(&self);
    /// Request notification permission
    fn request_permission(&self);
    /// Request provisional (quiet) notification permission
    fn request_provisional_permission(&self);
    /// Remove delivered notifications
    fn dismiss_notifications(&self);
    /// Reset the app badge
    fn clear_badge(&self);
    /// Last token the SDK saw, if any
    fn last_known_push_token(&self) -> Option<String>;
    /// Show notifications while the app is in the foreground
    fn set_show_foreground_notifications(&self, enabled: bool);
    /// Display incoming notifications at all
    fn set_show_notifications(&self, enabled: bool);
    /// Whether incoming notifications are displayed
    fn should_show_notifications(&self) -> bool;
}

// ============================================================================
// USER (installation data)
// ============================================================================

/// A typed installation attribute returned by [`UserCapability::fetch_attributes`]
#[derive(Debug, Clone, PartialEq)]
pub enum UserAttribute {
    /// Boolean
    Bool(bool),
    /// Point in time
    Date(DateTime<Utc>),
    /// String
    String(String),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Double(f64),
    /// URL
    Url(Url),
}

impl UserAttribute {
    /// One-letter type code used on the wire
    pub fn type_code(&self) -> &'static str {
        match self {
            UserAttribute::Bool(_) => "b",
            UserAttribute::Date(_) => "d",
            UserAttribute::String(_) => "s",
            UserAttribute::Integer(_) => "i",
            UserAttribute::Double(_) => "f",
            UserAttribute::Url(_) => "u",
        }
    }

    /// Wire value; dates become milliseconds since the epoch
    pub fn to_value(&self) -> Value {
        match self {
            UserAttribute::Bool(b) => Value::Bool(*b),
            UserAttribute::Date(d) => Value::Int(d.timestamp_millis()),
            UserAttribute::String(s) => Value::String(s.clone()),
            UserAttribute::Integer(i) => Value::Int(*i),
            UserAttribute::Double(f) => Value::Double(*f),
            UserAttribute::Url(u) => Value::String(u.to_string()),
        }
    }
}

/// Installation data reads
pub trait UserCapability: Send + Sync {
    /// Installation id, if the SDK has one
    fn installation_id(&self) -> Option<String>;
    /// Custom user identifier
    fn identifier(&self) -> Option<String>;
    /// Language override
    fn language(&self) -> Option<String>;
    /// Region override
    fn region(&self) -> Option<String>;
    /// Fetch installation attributes
    fn fetch_attributes(&self, completion: Completion<BTreeMap<String, UserAttribute>>);
    /// Fetch tag collections
    fn fetch_tags(&self, completion: Completion<BTreeMap<String, BTreeSet<String>>>);
    /// Wipe installation data
    fn clear_installation_data(&self);
}

// ============================================================================
// PROFILE
// ============================================================================

/// Email marketing subscription state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Opted in to marketing emails
    Subscribed,
    /// Opted out of marketing emails
    Unsubscribed,
}

/// Value written by [`ProfileEditor::set_attribute`]
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// String
    String(String),
    /// Point in time
    Date(DateTime<Utc>),
    /// Boolean
    Boolean(bool),
    /// URL
    Url(Url),
    /// List of strings
    StringArray(Vec<String>),
}

/// One typed event attribute
#[derive(Debug, Clone, PartialEq)]
pub enum EventAttribute {
    /// String
    String(String),
    /// URL
    Url(Url),
    /// Boolean
    Bool(bool),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Point in time
    Date(DateTime<Utc>),
    /// Nested attributes
    Object(EventAttributes),
    /// List of strings
    StringArray(Vec<String>),
    /// List of nested attributes
    ObjectArray(Vec<EventAttributes>),
}

/// Typed attributes attached to a tracked event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventAttributes(BTreeMap<String, EventAttribute>);

impl EventAttributes {
    /// Empty attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute
    pub fn insert(&mut self, key: impl Into<String>, value: EventAttribute) {
        self.0.insert(key.into(), value);
    }

    /// Look up an attribute
    pub fn get(&self, key: &str) -> Option<&EventAttribute> {
        self.0.get(key)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &EventAttribute)> {
        self.0.iter()
    }
}

/// A location update
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy in meters
    pub precision: Option<i64>,
    /// When the fix was taken
    pub date: Option<DateTime<Utc>>,
}

/// Batched profile mutations, applied on [`save`](ProfileEditor::save)
pub trait ProfileEditor: Send {
    /// Set or clear the language override
    fn set_language(&mut self, language: Option<&str>) -> SdkResult<()>;
    /// Set or clear the region override
    fn set_region(&mut self, region: Option<&str>) -> SdkResult<()>;
    /// Set or clear the email address
    fn set_email_address(&mut self, email: Option<&str>) -> SdkResult<()>;
    /// Set the marketing subscription state
    fn set_email_marketing_subscription(&mut self, state: SubscriptionState) -> SdkResult<()>;
    /// Set a custom attribute
    fn set_attribute(&mut self, key: &str, value: AttributeValue) -> SdkResult<()>;
    /// Remove a custom attribute; removing a missing key is fine
    fn remove_attribute(&mut self, key: &str) -> SdkResult<()>;
    /// Append to a string array attribute
    fn add_to_string_array(&mut self, key: &str, item: &str) -> SdkResult<()>;
    /// Remove from a string array attribute
    fn remove_from_string_array(&mut self, key: &str, item: &str) -> SdkResult<()>;
    /// Commit every queued change
    fn save(self: Box<Self>);
}

/// Profile writes and tracking
pub trait ProfileCapability: Send + Sync {
    /// Attach (or detach with `None`) a custom user id
    fn identify(&self, identifier: Option<&str>);
    /// Start a batch of profile edits
    fn editor(&self) -> Box<dyn ProfileEditor>;
    /// Track a custom event
    fn track_event(&self, name: &str, attributes: Option<EventAttributes>);
    /// Track a transaction
    fn track_transaction(&self, amount: f64, data: Option<Parameters>);
    /// Track a location update
    fn track_location(&self, location: Location);
}

// ============================================================================
// MESSAGING
// ============================================================================

/// In-app messaging
pub trait MessagingCapability: Send + Sync {
    /// Show the message held back by do-not-disturb. Returns whether one was shown.
    fn show_pending_message(&self) -> bool;
    /// Hold back in-app messages
    fn set_do_not_disturb(&self, enabled: bool);
}

// ============================================================================
// INBOX
// ============================================================================

/// Where an inbox notification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotificationSource {
    /// Unknown origin
    #[default]
    Unknown,
    /// Push campaign
    Campaign,
    /// Transactional API
    Transactional,
    /// Trigger automation
    Trigger,
}

impl NotificationSource {
    /// Wire code
    pub fn code(&self) -> i64 {
        match self {
            NotificationSource::Unknown => 0,
            NotificationSource::Campaign => 1,
            NotificationSource::Transactional => 2,
            NotificationSource::Trigger => 3,
        }
    }
}

/// One inbox notification
#[derive(Debug, Clone, PartialEq)]
pub struct InboxNotification {
    /// Notification identifier
    pub id: String,
    /// Optional title
    pub title: Option<String>,
    /// Body text
    pub body: String,
    /// Whether it has not been read yet
    pub is_unread: bool,
    /// When it was sent
    pub date: DateTime<Utc>,
    /// Origin
    pub source: NotificationSource,
    /// Raw push payload
    pub payload: Parameters,
    /// Silent notifications are never shown to the caller
    pub is_silent: bool,
    /// Whether it carries a landing message
    pub has_landing_message: bool,
}

/// Result of a page fetch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedPage {
    /// Notifications in this page
    pub notifications: Vec<InboxNotification>,
    /// No more pages are available
    pub end_reached: bool,
    /// New notifications were found (fetch-new only)
    pub found_new: bool,
}

/// A paged view over one inbox
pub trait InboxFetcher: Send + Sync {
    /// Page size cap
    fn set_max_page_size(&self, size: u32);
    /// Total notification cap
    fn set_limit(&self, limit: u32);
    /// Fetch from the top, replacing what was fetched before
    fn fetch_new_notifications(&self, completion: Completion<FetchedPage>);
    /// Fetch the page after the last one
    fn fetch_next_page(&self, completion: Completion<FetchedPage>);
    /// Everything fetched so far
    fn fetched_notifications(&self) -> Vec<InboxNotification>;
    /// Mark one notification as read
    fn mark_as_read(&self, notification: &InboxNotification);
    /// Mark every notification as read
    fn mark_all_as_read(&self);
    /// Delete one notification
    fn mark_as_deleted(&self, notification: &InboxNotification);
    /// Present the notification's landing message
    fn display_landing_message(&self, notification: &InboxNotification);
}

/// Inbox fetcher factory
pub trait InboxCapability: Send + Sync {
    /// Fetcher for this installation's notifications
    fn installation_fetcher(&self, completion: Completion<Arc<dyn InboxFetcher>>);
    /// Fetcher for a user's notifications, authenticated by `auth_key`
    fn user_fetcher(&self, user: &str, auth_key: &str, completion: Completion<Arc<dyn InboxFetcher>>);
}

// ============================================================================
// DEBUG
// ============================================================================

/// Debug tooling
pub trait DebugCapability: Send + Sync {
    /// Present the debug view. Returns whether it was shown.
    fn show_debug_view(&self) -> bool;
}

// ============================================================================
// BUNDLE
// ============================================================================

/// Every capability the bridge calls into
#[derive(Clone)]
pub struct Sdk {
    /// Start and privacy controls
    pub lifecycle: Arc<dyn LifecycleCapability>,
    /// Push notifications
    pub push: Arc<dyn PushCapability>,
    /// Installation data
    pub user: Arc<dyn UserCapability>,
    /// Profile writes
    pub profile: Arc<dyn ProfileCapability>,
    /// In-app messaging
    pub messaging: Arc<dyn MessagingCapability>,
    /// Inbox
    pub inbox: Arc<dyn InboxCapability>,
    /// Debug tooling
    pub debug: Arc<dyn DebugCapability>,
}

impl std::fmt::Debug for Sdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sdk").finish_non_exhaustive()
    }
}
