//! # Action Vocabulary
//!
//! The closed set of operations the bridge knows, keyed by their exact wire
//! string. Decoding is exact-match and case-sensitive; anything else is
//! "unrecognized" (`None`), which the dispatcher turns into the
//! not-implemented outcome.
//!
//! Removing an entry is a breaking wire change: old callers must then get
//! not-implemented, so a wire string is never reused for another action.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

/// Handler group owning a slice of the vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionGroup {
    /// Opt-in / opt-out and data collection
    Lifecycle,
    /// Push notifications
    Push,
    /// Installation data reads
    User,
    /// Profile writes and tracking
    Profile,
    /// In-app messaging
    Messaging,
    /// Inbox fetchers
    Inbox,
    /// Debug tooling
    Debug,
    /// Always-available bridge actions
    Meta,
}

/// A decoded bridge action
///
/// Variants are named after their wire strings, see [`Action::wire_name`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // Lifecycle
    OptIn,
    OptOut,
    OptOutAndWipeData,
    IsOptedOut,
    SetAutomaticDataCollection,

    // Push
    PushGetLastKnownPushToken,
    PushRequestPermission,
    PushRequestProvisionalPermission,
    PushRefreshToken,
    PushClearBadge,
    PushDismissNotifications,
    PushSetShowForegroundNotifications,
    PushSetShowNotifications,
    PushShouldShowNotifications,

    // User
    UserGetInstallationId,
    UserGetIdentifier,
    UserGetLanguage,
    UserGetRegion,
    UserFetchAttributes,
    UserFetchTags,
    UserClearInstallationData,

    // Profile
    UserIdentify,
    UserEdit,
    UserTrackEvent,
    UserTrackTransaction,
    UserTrackLocation,

    // Messaging
    MessagingShowPendingMessage,
    MessagingSetDoNotDisturbEnabled,

    // Inbox
    InboxCreateInstallationFetcher,
    InboxCreateUserFetcher,
    InboxReleaseFetcher,
    InboxFetchNewNotifications,
    InboxFetchNextPage,
    InboxGetFetchedNotifications,
    InboxMarkAsRead,
    InboxMarkAllAsRead,
    InboxMarkAsDeleted,
    InboxDisplayLandingMessage,

    // Debug
    DebugShowDebugView,

    // Meta
    Echo,
    BridgeVersion,
}

static DECODE_TABLE: Lazy<HashMap<&'static str, Action>> =
    Lazy::new(|| Action::ALL.iter().map(|a| (a.wire_name(), *a)).collect());

impl Action {
    /// Every action, in vocabulary order
    pub const ALL: &'static [Action] = &[
        Action::OptIn,
        Action::OptOut,
        Action::OptOutAndWipeData,
        Action::IsOptedOut,
        Action::SetAutomaticDataCollection,
        Action::PushGetLastKnownPushToken,
        Action::PushRequestPermission,
        Action::PushRequestProvisionalPermission,
        Action::PushRefreshToken,
        Action::PushClearBadge,
        Action::PushDismissNotifications,
        Action::PushSetShowForegroundNotifications,
        Action::PushSetShowNotifications,
        Action::PushShouldShowNotifications,
        Action::UserGetInstallationId,
        Action::UserGetIdentifier,
        Action::UserGetLanguage,
        Action::UserGetRegion,
        Action::UserFetchAttributes,
        Action::UserFetchTags,
        Action::UserClearInstallationData,
        Action::UserIdentify,
        Action::UserEdit,
        Action::UserTrackEvent,
        Action::UserTrackTransaction,
        Action::UserTrackLocation,
        Action::MessagingShowPendingMessage,
        Action::MessagingSetDoNotDisturbEnabled,
        Action::InboxCreateInstallationFetcher,
        Action::InboxCreateUserFetcher,
        Action::InboxReleaseFetcher,
        Action::InboxFetchNewNotifications,
        Action::InboxFetchNextPage,
        Action::InboxGetFetchedNotifications,
        Action::InboxMarkAsRead,
        Action::InboxMarkAllAsRead,
        Action::InboxMarkAsDeleted,
        Action::InboxDisplayLandingMessage,
        Action::DebugShowDebugView,
        Action::Echo,
        Action::BridgeVersion,
    ];

    /// Decode a wire string. Unknown strings yield `None`, never an error.
    pub fn decode(wire: &str) -> Option<Action> {
        DECODE_TABLE.get(wire).copied()
    }

    /// Exact wire string of this action
    pub fn wire_name(&self) -> &'static str {
        match self {
            Action::OptIn => "optIn",
            Action::OptOut => "optOut",
            Action::OptOutAndWipeData => "optOutAndWipeData",
            Action::IsOptedOut => "isOptedOut",
            Action::SetAutomaticDataCollection => "setAutomaticDataCollection",
            Action::PushGetLastKnownPushToken => "push.getLastKnownPushToken",
            Action::PushRequestPermission => "push.requestPermission",
            Action::PushRequestProvisionalPermission => "push.iOS.requestProvisionalPermission",
            Action::PushRefreshToken => "push.iOS.refreshToken",
            Action::PushClearBadge => "push.clearBadge",
            Action::PushDismissNotifications => "push.dismissNotifications",
            Action::PushSetShowForegroundNotifications => "push.iOS.setShowForegroundNotifications",
            Action::PushSetShowNotifications => "push.setShowNotifications",
            Action::PushShouldShowNotifications => "push.shouldShowNotifications",
            Action::UserGetInstallationId => "user.getInstallationID",
            Action::UserGetIdentifier => "user.getIdentifier",
            Action::UserGetLanguage => "user.getLanguage",
            Action::UserGetRegion => "user.getRegion",
            Action::UserFetchAttributes => "user.fetch.attributes",
            Action::UserFetchTags => "user.fetch.tags",
            Action::UserClearInstallationData => "user.clearInstallationData",
            Action::UserIdentify => "user.identify",
            Action::UserEdit => "user.edit",
            Action::UserTrackEvent => "user.trackEvent",
            Action::UserTrackTransaction => "user.trackTransaction",
            Action::UserTrackLocation => "user.trackLocation",
            Action::MessagingShowPendingMessage => "messaging.showPendingMessage",
            Action::MessagingSetDoNotDisturbEnabled => "messaging.setDoNotDisturbEnabled",
            Action::InboxCreateInstallationFetcher => "inbox.createInstallationFetcher",
            Action::InboxCreateUserFetcher => "inbox.createUserFetcher",
            Action::InboxReleaseFetcher => "inbox.releaseFetcher",
            Action::InboxFetchNewNotifications => "inbox.fetchNewNotifications",
            Action::InboxFetchNextPage => "inbox.fetchNextPage",
            Action::InboxGetFetchedNotifications => "inbox.getFetchedNotifications",
            Action::InboxMarkAsRead => "inbox.markAsRead",
            Action::InboxMarkAllAsRead => "inbox.markAllAsRead",
            Action::InboxMarkAsDeleted => "inbox.markAsDeleted",
            Action::InboxDisplayLandingMessage => "inbox.displayLandingMessage",
            Action::DebugShowDebugView => "debug.showDebugView",
            Action::Echo => "echo",
            Action::BridgeVersion => "bridge.version",
        }
    }

    /// Handler group that owns this action
    pub fn group(&self) -> ActionGroup {
        use Action::*;
        match self {
            OptIn | OptOut | OptOutAndWipeData | IsOptedOut | SetAutomaticDataCollection => {
                ActionGroup::Lifecycle
            }
            PushGetLastKnownPushToken
            | PushRequestPermission
            | PushRequestProvisionalPermission
            | PushRefreshToken
            | PushClearBadge
            | PushDismissNotifications
            | PushSetShowForegroundNotifications
            | PushSetShowNotifications
            | PushShouldShowNotifications => ActionGroup::Push,
            UserGetInstallationId | UserGetIdentifier | UserGetLanguage | UserGetRegion
            | UserFetchAttributes | UserFetchTags | UserClearInstallationData => ActionGroup::User,
            UserIdentify | UserEdit | UserTrackEvent | UserTrackTransaction | UserTrackLocation => {
                ActionGroup::Profile
            }
            MessagingShowPendingMessage | MessagingSetDoNotDisturbEnabled => ActionGroup::Messaging,
            InboxCreateInstallationFetcher
            | InboxCreateUserFetcher
            | InboxReleaseFetcher
            | InboxFetchNewNotifications
            | InboxFetchNextPage
            | InboxGetFetchedNotifications
            | InboxMarkAsRead
            | InboxMarkAllAsRead
            | InboxMarkAsDeleted
            | InboxDisplayLandingMessage => ActionGroup::Inbox,
            DebugShowDebugView => ActionGroup::Debug,
            Echo | BridgeVersion => ActionGroup::Meta,
        }
    }

    /// Whether this action may run before setup
    pub fn requires_setup(&self) -> bool {
        self.group() != ActionGroup::Meta
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_decode_every_wire_name() {
        for action in Action::ALL {
            assert_eq!(Action::decode(action.wire_name()), Some(*action));
        }
    }

    #[test]
    fn test_wire_names_are_unique() {
        let names: HashSet<_> = Action::ALL.iter().map(Action::wire_name).collect();
        assert_eq!(names.len(), Action::ALL.len());
    }

    #[test]
    fn test_decode_is_exact_match() {
        assert_eq!(Action::decode("user.edit"), Some(Action::UserEdit));
        assert_eq!(Action::decode("User.edit"), None);
        assert_eq!(Action::decode("user.edi"), None);
        assert_eq!(Action::decode(" user.edit"), None);
        assert_eq!(Action::decode(""), None);
        assert_eq!(Action::decode("user.getInstallationId"), None);
    }

    #[test]
    fn test_groups() {
        assert_eq!(Action::Echo.group(), ActionGroup::Meta);
        assert_eq!(Action::InboxMarkAsRead.group(), ActionGroup::Inbox);
        assert_eq!(Action::UserTrackLocation.group(), ActionGroup::Profile);
        assert_eq!(Action::UserFetchTags.group(), ActionGroup::User);
        assert!(!Action::BridgeVersion.requires_setup());
        assert!(Action::OptIn.requires_setup());
    }

    #[test]
    fn test_display_is_wire_name() {
        assert_eq!(Action::PushClearBadge.to_string(), "push.clearBadge");
    }
}
