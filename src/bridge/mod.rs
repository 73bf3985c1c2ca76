//! # Bridge
//!
//! Entry point the host runtime calls into.
//!
//! ```text
//! ┌──────────────┐  method, args   ┌─────────────────────────────────────────┐
//! │ Host runtime │ ──────────────► │ Bridge::dispatch                        │
//! │              │                 │   1. Action::decode   unknown: NotImpl  │
//! │              │                 │   2. SetupGate        → MissingSetup    │
//! │              │ ◄────────────── │   3. dispatcher::route → handler        │
//! └──────────────┘  Promise<Value> └─────────────────────────────────────────┘
//!                                                     │
//!                      ┌──────────────────────────────┼───────────────────┐
//!                      ▼                              ▼                   ▼
//!              Sdk capabilities      Registry<dyn InboxFetcher>   ExecutionContexts
//! ```
//!
//! A `Bridge` owns its setup gate and fetcher registry, so independent
//! bridges never share state. Hosts typically keep one in an `Arc`.

mod channel;
mod dispatch_debug;
mod dispatch_inbox;
mod dispatch_messaging;
mod dispatch_optin;
mod dispatch_profile;
mod dispatch_push;
mod dispatch_user;
mod dispatcher;

pub use channel::{MethodCall, Reply};
pub use dispatcher::DPromise;

use tokio::runtime::Handle;

use crate::action::Action;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::promise::{immediate, Priority, Promise, RuntimeExecutor, SerialQueue, SharedExecutor};
use crate::registry::Registry;
use crate::sdk::{InboxFetcher, Sdk};
use crate::setup::{SetupGate, SetupOutcome};
use crate::value::Value;

/// Where handlers run work and where replies are delivered
#[derive(Clone)]
pub struct ExecutionContexts {
    /// UI work (presenting messages, the debug view, landing messages)
    pub main: SharedExecutor,
    /// Work that must not block the caller (inbox mark operations)
    pub background: SharedExecutor,
    /// Reply delivery for [`Bridge::handle`]
    pub reply: SharedExecutor,
}

impl ExecutionContexts {
    /// Everything inline on the calling thread
    pub fn immediate() -> Self {
        Self {
            main: immediate(),
            background: immediate(),
            reply: immediate(),
        }
    }

    /// A dedicated main queue, background work on `runtime`, replies on main
    pub fn threaded(runtime: Handle) -> std::io::Result<Self> {
        let main: SharedExecutor = std::sync::Arc::new(SerialQueue::new("batch-bridge-main")?);
        Ok(Self {
            reply: main.clone(),
            main,
            background: std::sync::Arc::new(RuntimeExecutor::new(
                runtime,
                Priority::UserInitiated,
            )),
        })
    }
}

impl Default for ExecutionContexts {
    fn default() -> Self {
        Self::immediate()
    }
}

impl std::fmt::Debug for ExecutionContexts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContexts").finish_non_exhaustive()
    }
}

/// Decodes, gates and routes calls from the host runtime
pub struct Bridge {
    sdk: Sdk,
    gate: SetupGate,
    fetchers: Registry<dyn InboxFetcher>,
    contexts: ExecutionContexts,
}

impl Bridge {
    /// Bridge over `sdk` running everything inline
    pub fn new(sdk: Sdk) -> Self {
        Self::with_contexts(sdk, ExecutionContexts::immediate())
    }

    /// Bridge over `sdk` with explicit execution contexts
    pub fn with_contexts(sdk: Sdk, contexts: ExecutionContexts) -> Self {
        Self {
            sdk,
            gate: SetupGate::new(),
            fetchers: Registry::new(),
            contexts,
        }
    }

    /// Start the SDK. Only the first successful call has an effect.
    pub fn setup(&self, config: BridgeConfig) -> Result<SetupOutcome> {
        self.gate.setup(config, &self.sdk)
    }

    /// Whether setup succeeded
    pub fn is_configured(&self) -> bool {
        self.gate.is_configured()
    }

    /// Config applied by setup, if any
    pub fn config(&self) -> Option<BridgeConfig> {
        self.gate.config()
    }

    /// SDK capabilities handlers call into
    pub fn sdk(&self) -> &Sdk {
        &self.sdk
    }

    /// Live inbox fetchers
    pub fn fetchers(&self) -> &Registry<dyn InboxFetcher> {
        &self.fetchers
    }

    /// Execution contexts
    pub fn contexts(&self) -> &ExecutionContexts {
        &self.contexts
    }

    /// Run `method` with `params`
    ///
    /// Never fails synchronously: unknown methods, calls made before setup
    /// and argument errors all come back as a rejected promise.
    pub fn dispatch(&self, method: &str, params: Parameters) -> Promise<Value> {
        let Some(action) = Action::decode(method) else {
            tracing::debug!(method, "Unknown bridge method");
            return Promise::rejected(Error::NotImplemented(method.to_string()));
        };

        if action.requires_setup() {
            if let Err(e) = self.gate.ensure_configured() {
                tracing::debug!(%action, "Bridge called before setup");
                return Promise::rejected(e);
            }
        }

        tracing::debug!(%action, arguments = params.len(), "Dispatching");
        dispatcher::route(self, action, &params)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("configured", &self.is_configured())
            .field("fetchers", &self.fetchers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::sdk::memory::MemorySdk;
    use std::sync::Arc;

    /// A set-up bridge over a fresh in-memory SDK
    pub(crate) fn configured() -> (Bridge, MemorySdk) {
        let memory = MemorySdk::new();
        let bridge = Bridge::new(memory.sdk());
        bridge
            .setup(BridgeConfig::with_api_key("TEST_KEY"))
            .unwrap();
        (bridge, memory)
    }

    /// Like [`configured`], with main and background work on their own threads
    pub(crate) fn configured_threaded() -> (Bridge, MemorySdk) {
        let memory = MemorySdk::new();
        let contexts = ExecutionContexts {
            main: Arc::new(SerialQueue::new("test-main").unwrap()),
            background: Arc::new(SerialQueue::new("test-background").unwrap()),
            reply: immediate(),
        };
        let bridge = Bridge::with_contexts(memory.sdk(), contexts);
        bridge
            .setup(BridgeConfig::with_api_key("TEST_KEY"))
            .unwrap();
        (bridge, memory)
    }

    #[test]
    fn test_unknown_action_not_implemented() {
        let (bridge, _memory) = configured();
        let result = bridge.dispatch("not.an.action", Parameters::new()).wait_blocking();
        assert_eq!(result, Err(Error::NotImplemented("not.an.action".into())));

        // Case-sensitive
        let result = bridge.dispatch("OPTIN", Parameters::new()).wait_blocking();
        assert!(result.unwrap_err().is_not_implemented());
    }

    #[test]
    fn test_unknown_action_before_setup_not_implemented() {
        let bridge = Bridge::new(MemorySdk::new().sdk());
        let result = bridge.dispatch("nope", Parameters::new()).wait_blocking();
        assert_eq!(result, Err(Error::NotImplemented("nope".into())));
    }

    #[test]
    fn test_missing_setup() {
        let memory = MemorySdk::new();
        let bridge = Bridge::new(memory.sdk());

        let err = bridge.dispatch("optIn", Parameters::new()).wait_blocking().unwrap_err();
        assert_eq!(err, Error::MissingSetup);
        assert_eq!(err.code(), Some(ErrorCode::MissingSetup));
        assert!(!memory.was_called("lifecycle.opt_in"));

        // Meta actions work without setup
        let echoed = bridge
            .dispatch("echo", Parameters::new().with("value", 7))
            .wait_blocking();
        assert_eq!(echoed, Ok(Value::Int(7)));
    }

    #[test]
    fn test_setup_enables_dispatch() {
        let memory = MemorySdk::new();
        let bridge = Bridge::new(memory.sdk());
        assert_eq!(bridge.setup(BridgeConfig::default()), Err(Error::MissingApiKey));
        assert!(!bridge.is_configured());

        bridge.setup(BridgeConfig::with_api_key("KEY")).unwrap();
        let result = bridge.dispatch("optIn", Parameters::new()).wait_blocking();
        assert_eq!(result, Ok(Value::Null));
        assert!(memory.was_called("lifecycle.opt_in"));
        assert_eq!(bridge.config().unwrap().api_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn test_echo_round_trips_values() {
        let (bridge, _memory) = configured();
        let value = Value::from(vec![Value::from(1), Value::from("two"), Value::Null]);
        let result = bridge
            .dispatch("echo", Parameters::new().with("value", value.clone()))
            .wait_blocking();
        assert_eq!(result, Ok(value));

        let result = bridge.dispatch("echo", Parameters::new()).wait_blocking();
        assert_eq!(result, Ok(Value::Null));
    }

    #[test]
    fn test_bridge_version() {
        let bridge = Bridge::new(MemorySdk::new().sdk());
        let version = bridge
            .dispatch("bridge.version", Parameters::new())
            .wait_blocking()
            .unwrap();
        assert_eq!(version.as_str(), Some(crate::BRIDGE_VERSION));
        assert!(crate::BRIDGE_VERSION.starts_with("Bridge/"));
    }

    #[test]
    fn test_every_action_is_routed() {
        let (bridge, _memory) = configured();
        for action in Action::ALL {
            let result = bridge
                .dispatch(action.wire_name(), Parameters::new())
                .wait_blocking();
            if let Err(e) = result {
                assert!(!e.is_not_implemented(), "{action} is not routed");
            }
        }
    }

    #[tokio::test]
    async fn test_threaded_contexts() {
        let memory = MemorySdk::new();
        let contexts = ExecutionContexts::threaded(Handle::current()).unwrap();
        let bridge = Bridge::with_contexts(memory.sdk(), contexts);
        bridge.setup(BridgeConfig::with_api_key("KEY")).unwrap();

        let result = bridge
            .dispatch("debug.showDebugView", Parameters::new())
            .wait()
            .await;
        assert_eq!(result, Ok(Value::Null));
        assert!(memory.was_called("debug.show_debug_view"));
    }
}
