//! Call envelope exchanged with the host's method channel.
//!
//! ```text
//! MethodCall {method, arguments} ──► Bridge::handle ──► Reply (on the reply executor)
//!                                                       ├── success        {value}
//!                                                       ├── error          {error: BridgeError}
//!                                                       └── notImplemented
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::Bridge;
use crate::error::{BridgeError, Error, Result};
use crate::params::Parameters;
use crate::promise::Promise;
use crate::value::Value;

/// One call coming from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Action wire name
    pub method: String,
    /// Argument map; absent and null mean "no arguments"
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl MethodCall {
    /// A call with an argument map
    pub fn new(method: impl Into<String>, arguments: Parameters) -> Self {
        Self {
            method: method.into(),
            arguments: Some(Value::Map(arguments)),
        }
    }

    /// Parse a JSON envelope
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Arguments as a parameter bag
    ///
    /// Anything other than a map (or nothing) is a bad `arguments` value.
    pub fn parameters(&self) -> Result<Parameters> {
        match &self.arguments {
            None | Some(Value::Null) => Ok(Parameters::new()),
            Some(Value::Map(params)) => Ok(params.clone()),
            Some(_) => Err(Error::bad_argument("arguments")),
        }
    }
}

/// Outcome handed back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Reply {
    /// The action resolved
    Success {
        /// Resolved value
        value: Value,
    },
    /// The action was rejected
    Error {
        /// Wire error
        error: BridgeError,
    },
    /// The action is unknown or not available here
    NotImplemented,
}

impl Reply {
    /// Serialize for JSON hosts
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<Result<Value>> for Reply {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Reply::Success { value },
            Err(Error::NotImplemented(_)) => Reply::NotImplemented,
            Err(e) => Reply::Error { error: e.into() },
        }
    }
}

impl Bridge {
    /// Run a host call and deliver exactly one reply on the reply executor
    pub fn handle<F>(&self, call: MethodCall, reply: F)
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        let promise = match call.parameters() {
            Ok(params) => self.dispatch(&call.method, params),
            Err(e) => Promise::rejected(e),
        };

        let on_success = Arc::new(Mutex::new(Some(reply)));
        let on_failure = Arc::clone(&on_success);
        let method = call.method;

        drop(
            promise
                .continue_on(self.contexts().reply.clone())
                .on_success(move |value| {
                    if let Some(reply) = on_success.lock().take() {
                        reply(Reply::from(Ok(value)));
                    }
                })
                .on_failure(move |e| {
                    tracing::debug!(method = %method, error = %e, "Bridge call rejected");
                    if let Some(reply) = on_failure.lock().take() {
                        reply(Reply::from(Err(e)));
                    }
                }),
        );
    }

    /// Dispatch with JSON-encoded arguments
    ///
    /// An empty string or `null` means no arguments.
    pub fn call_json(&self, method: &str, arguments: &str) -> Promise<Value> {
        let arguments = arguments.trim();
        let params = if arguments.is_empty() || arguments == "null" {
            Ok(Parameters::new())
        } else {
            Parameters::from_json(arguments)
        };
        match params {
            Ok(params) => self.dispatch(method, params),
            Err(e) => Promise::rejected(e),
        }
    }
}
