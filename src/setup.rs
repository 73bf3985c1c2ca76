//! One-shot setup gate.
//!
//! ```text
//!                 setup(config with key)
//!  Unconfigured ─────────────────────────► Configured(config)
//!       │   ▲                                  │
//!       │   └── setup(blank key): MissingApiKey│ setup(any): AlreadyConfigured
//!       │                                      │
//!   actions → MissingSetup               actions run
//! ```
//!
//! The gate is owned by a [`Bridge`](crate::Bridge), so separate bridges
//! (and tests) never share setup state.

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::sdk::Sdk;

/// What a successful `setup` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// This call started the SDK
    Configured,
    /// An earlier call already did; the new config was ignored
    AlreadyConfigured,
}

enum GateState {
    Unconfigured,
    Configured(BridgeConfig),
}

/// Tracks whether the SDK was started
pub struct SetupGate {
    state: Mutex<GateState>,
}

impl Default for SetupGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupGate {
    /// A gate that has not been set up
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Unconfigured),
        }
    }

    /// Start the SDK once
    ///
    /// Concurrent calls are serialized: exactly one of them configures.
    pub fn setup(&self, config: BridgeConfig, sdk: &Sdk) -> Result<SetupOutcome> {
        let mut state = self.state.lock();

        if let GateState::Configured(_) = *state {
            tracing::info!("Bridge already set up, ignoring new configuration");
            return Ok(SetupOutcome::AlreadyConfigured);
        }

        let api_key = match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                tracing::error!("Bridge setup failed: no API key configured");
                return Err(Error::MissingApiKey);
            }
        };

        sdk.lifecycle.start(&api_key, &config.start_options());
        sdk.messaging.set_do_not_disturb(config.initial_do_not_disturb);

        tracing::info!(
            do_not_disturb = config.initial_do_not_disturb,
            "Bridge set up"
        );
        *state = GateState::Configured(config);
        Ok(SetupOutcome::Configured)
    }

    /// Whether setup succeeded
    pub fn is_configured(&self) -> bool {
        matches!(*self.state.lock(), GateState::Configured(_))
    }

    /// Config applied by setup, if any
    pub fn config(&self) -> Option<BridgeConfig> {
        match &*self.state.lock() {
            GateState::Configured(config) => Some(config.clone()),
            GateState::Unconfigured => None,
        }
    }

    /// `MissingSetup` unless setup succeeded
    pub fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(Error::MissingSetup)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::memory::MemorySdk;
    use crate::sdk::Migration;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_setup_starts_sdk_once() {
        let memory = MemorySdk::new();
        let gate = SetupGate::new();
        assert_eq!(gate.ensure_configured(), Err(Error::MissingSetup));

        let mut config = BridgeConfig::with_api_key("KEY");
        config.initial_do_not_disturb = true;
        config.profile_custom_data_migration_enabled = false;

        assert_eq!(gate.setup(config, &memory.sdk()), Ok(SetupOutcome::Configured));
        assert!(gate.ensure_configured().is_ok());
        assert!(memory.do_not_disturb());

        let (key, options) = memory.started().unwrap();
        assert_eq!(key, "KEY");
        assert_eq!(options.disabled_migrations, vec![Migration::CustomData]);

        let again = gate.setup(BridgeConfig::with_api_key("OTHER"), &memory.sdk());
        assert_eq!(again, Ok(SetupOutcome::AlreadyConfigured));
        assert_eq!(memory.started().unwrap().0, "KEY");
        assert_eq!(gate.config().unwrap().api_key.as_deref(), Some("KEY"));
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let memory = MemorySdk::new();
        let gate = SetupGate::new();

        assert_eq!(gate.setup(BridgeConfig::default(), &memory.sdk()), Err(Error::MissingApiKey));
        assert_eq!(gate.setup(BridgeConfig::with_api_key(" "), &memory.sdk()), Err(Error::MissingApiKey));
        assert!(!gate.is_configured());
        assert!(memory.started().is_none());

        // A later valid setup still works
        assert_eq!(
            gate.setup(BridgeConfig::with_api_key("KEY"), &memory.sdk()),
            Ok(SetupOutcome::Configured)
        );
    }

    #[test]
    fn test_concurrent_setup_configures_once() {
        const THREADS: usize = 8;
        let memory = MemorySdk::new();
        let gate = Arc::new(SetupGate::new());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                let sdk = memory.sdk();
                thread::spawn(move || {
                    barrier.wait();
                    gate.setup(BridgeConfig::with_api_key("KEY"), &sdk).unwrap()
                })
            })
            .collect();

        let configured = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == SetupOutcome::Configured)
            .count();
        assert_eq!(configured, 1);
        assert_eq!(
            memory.calls().iter().filter(|c| *c == "lifecycle.start").count(),
            1
        );
    }
}
