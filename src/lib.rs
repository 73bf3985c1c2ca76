//! # Batch Bridge
//!
//! Command bridge between a host runtime (a Flutter plugin's method channel)
//! and the native Batch SDK. The host sends `(action, arguments)` pairs; the
//! bridge decodes them, checks setup, runs the matching handler and answers
//! through a promise.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BATCH BRIDGE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐    │
//! │  │   Action    │  │   Params    │  │   Promise   │  │   Registry   │    │
//! │  │             │  │             │  │             │  │              │    │
//! │  │ - Decode    │  │ - Values    │  │ - Settle    │  │ - Reserve    │    │
//! │  │ - Groups    │  │ - Getters   │  │ - Callbacks │  │ - Fulfill    │    │
//! │  │             │  │ - Required  │  │ - Executors │  │ - Release    │    │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘    │
//! │         │                │                │                │            │
//! │         └────────────────┴────────┬───────┴────────────────┘            │
//! │                                   │                                     │
//! │  ┌─────────────┐  ┌─────────────┐ │ ┌─────────────────────────────────┐ │
//! │  │   Config    │  │    Setup    │ │ │             Bridge              │ │
//! │  │             │  │             │ │ │                                 │ │
//! │  │ - JSON      │─►│ - One-shot  │─┴►│ - dispatcher + handler groups   │ │
//! │  │ - Env vars  │  │   gate      │   │ - MethodCall / Reply envelope   │ │
//! │  └─────────────┘  └─────────────┘   └────────────────┬────────────────┘ │
//! │                                                      │                  │
//! │                                     ┌────────────────▼────────────────┐ │
//! │                                     │   Sdk (capability traits)       │ │
//! │                                     │   memory::MemorySdk for tests   │ │
//! │                                     └─────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error taxonomy and wire error shape
//! - [`value`] - Values that can cross the bridge
//! - [`params`] - Call arguments with typed getters
//! - [`action`] - Action vocabulary
//! - [`promise`] - Single-settlement promises and executors
//! - [`registry`] - Id-keyed store for stateful native objects
//! - [`sdk`] - SDK capability interfaces
//! - [`config`] - Bridge configuration
//! - [`setup`] - One-shot setup gate
//! - [`bridge`] - Dispatcher, handlers and the call envelope
//!
//! ## Example
//!
//! ```rust,ignore
//! use batch_bridge::{Bridge, BridgeConfig, Parameters};
//!
//! let bridge = Bridge::new(platform_sdk());
//! bridge.setup(BridgeConfig::from_env())?;
//!
//! bridge
//!     .dispatch("user.getInstallationID", Parameters::new())
//!     .on_success(|id| println!("installation: {id:?}"))
//!     .on_failure(|e| eprintln!("failed: {e}"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod action;
pub mod bridge;
pub mod config;
pub mod error;
pub mod params;
pub mod promise;
pub mod registry;
pub mod sdk;
pub mod setup;
pub mod value;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use action::{Action, ActionGroup};
pub use bridge::{Bridge, ExecutionContexts, MethodCall, Reply};
pub use config::BridgeConfig;
pub use error::{BridgeError, Error, ErrorCode, Result};
pub use params::Parameters;
pub use promise::{Promise, Resolver};
pub use registry::Registry;
pub use sdk::Sdk;
pub use setup::SetupOutcome;
pub use value::Value;

// ============================================================================
// SHARED INSTANCE
// ============================================================================

use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Version string reported by the `bridge.version` action
pub const BRIDGE_VERSION: &str = concat!("Bridge/", env!("CARGO_PKG_VERSION"));

/// Bridge installed for hosts that reach it through a global entry point
static SHARED_BRIDGE: OnceCell<Arc<Bridge>> = OnceCell::new();

/// Install the process-wide bridge
///
/// Plugin entry points that cannot carry state (C callbacks, JNI statics)
/// look the bridge up with [`shared`]. Installing twice fails.
pub fn install(bridge: Bridge) -> Result<Arc<Bridge>> {
    let bridge = Arc::new(bridge);
    SHARED_BRIDGE
        .set(Arc::clone(&bridge))
        .map_err(|_| Error::Internal("a bridge is already installed".into()))?;
    tracing::info!("Shared bridge installed");
    Ok(bridge)
}

/// The process-wide bridge, if one was installed
pub fn shared() -> Option<Arc<Bridge>> {
    SHARED_BRIDGE.get().cloned()
}

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::memory::MemorySdk;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert_eq!(BRIDGE_VERSION, format!("Bridge/{}", version()));
    }

    #[test]
    fn test_install_once() {
        let installed = install(Bridge::new(MemorySdk::new().sdk())).unwrap();
        let shared_bridge = shared().unwrap();
        assert!(Arc::ptr_eq(&installed, &shared_bridge));

        let again = install(Bridge::new(MemorySdk::new().sdk()));
        assert!(matches!(again, Err(Error::Internal(_))));
    }
}
