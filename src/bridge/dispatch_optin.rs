//! Opt-in, opt-out and data collection dispatch handlers.

use super::dispatcher::{ok, ok_null, optional, settle, DPromise};
use super::Bridge;
use crate::error::Result;
use crate::params::Parameters;
use crate::promise::Promise;
use crate::sdk::{DataCollectionConfig, SdkResult};
use crate::value::Value;

pub fn opt_in(bridge: &Bridge) -> DPromise {
    bridge.sdk().lifecycle.opt_in();
    ok_null()
}

/// Resolves once the SDK has processed the opt-out. SDK failures (usually
/// the server being unreachable) are logged and swallowed: the installation
/// is opted out locally either way.
pub fn opt_out(bridge: &Bridge, wipe_data: bool) -> DPromise {
    let lifecycle = bridge.sdk().lifecycle.clone();
    Promise::new(move |resolver| {
        lifecycle.opt_out(
            wipe_data,
            Box::new(move |result: SdkResult<()>| {
                if let Err(e) = result {
                    tracing::warn!(wipe_data, error = %e, "Opt-out reported an error, ignoring");
                }
                resolver.resolve(Value::Null);
            }),
        );
        Ok(())
    })
}

pub fn is_opted_out(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().lifecycle.is_opted_out())
}

pub fn set_automatic_data_collection(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(data_collection_config(params).map(|config| {
        bridge.sdk().lifecycle.update_automatic_data_collection(config);
        Value::Null
    }))
}

fn data_collection_config(params: &Parameters) -> Result<DataCollectionConfig> {
    let raw = params.require_map("dataCollectionConfig")?;
    Ok(DataCollectionConfig {
        device_model: optional(raw, "deviceModel", Value::as_bool)?,
        geo_ip: optional(raw, "geoIP", Value::as_bool)?,
    })
}
