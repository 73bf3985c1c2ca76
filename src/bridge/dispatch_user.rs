//! Installation data dispatch handlers.
//!
//! Attribute fetches serialize each attribute as `{type, value}`, where
//! `type` is the one-letter code of [`UserAttribute::type_code`] and dates
//! travel as milliseconds since the epoch. Tag fetches return each
//! collection as a sorted list.

use std::collections::{BTreeMap, BTreeSet};

use super::dispatcher::{ok, ok_null, sdk_err, DPromise};
use super::Bridge;
use crate::params::Parameters;
use crate::promise::Promise;
use crate::sdk::{SdkResult, UserAttribute};
use crate::value::Value;

pub fn get_installation_id(bridge: &Bridge) -> DPromise {
    // The SDK reports "no id yet" as an empty string on some platforms
    ok(bridge
        .sdk()
        .user
        .installation_id()
        .filter(|id| !id.is_empty()))
}

pub fn get_identifier(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().user.identifier())
}

pub fn get_language(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().user.language())
}

pub fn get_region(bridge: &Bridge) -> DPromise {
    ok(bridge.sdk().user.region())
}

pub fn fetch_attributes(bridge: &Bridge) -> DPromise {
    let user = bridge.sdk().user.clone();
    Promise::new(move |resolver| {
        user.fetch_attributes(Box::new(move |result: SdkResult<BTreeMap<String, UserAttribute>>| {
            resolver.complete(
                result
                    .map(|attributes| attributes_to_value(&attributes))
                    .map_err(|e| sdk_err("Fetching attributes failed", e)),
            );
        }));
        Ok(())
    })
}

pub fn fetch_tags(bridge: &Bridge) -> DPromise {
    let user = bridge.sdk().user.clone();
    Promise::new(move |resolver| {
        user.fetch_tags(Box::new(move |result: SdkResult<BTreeMap<String, BTreeSet<String>>>| {
            resolver.complete(
                result
                    .map(|tags| tags_to_value(&tags))
                    .map_err(|e| sdk_err("Fetching tags failed", e)),
            );
        }));
        Ok(())
    })
}

pub fn clear_installation_data(bridge: &Bridge) -> DPromise {
    bridge.sdk().user.clear_installation_data();
    ok_null()
}

fn attributes_to_value(attributes: &BTreeMap<String, UserAttribute>) -> Value {
    attributes
        .iter()
        .map(|(key, attribute)| {
            let entry = Parameters::new()
                .with("type", attribute.type_code())
                .with("value", attribute.to_value());
            (key.clone(), Value::Map(entry))
        })
        .collect::<Parameters>()
        .into()
}

fn tags_to_value(tags: &BTreeMap<String, BTreeSet<String>>) -> Value {
    tags.iter()
        .map(|(collection, set)| {
            let list: Vec<Value> = set.iter().map(|tag| Value::from(tag.as_str())).collect();
            (collection.clone(), Value::List(list))
        })
        .collect::<Parameters>()
        .into()
}
