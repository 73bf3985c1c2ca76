//! # Profile Dispatch Handlers
//!
//! `user.identify`, `user.edit` and the tracking actions.
//!
//! ## Batch edits
//!
//! ```text
//! operations ──decode all──► Vec<EditOperation> ──apply each──► editor ──► save
//!                 │                                   │
//!                 └─ bad argument: reject,            └─ SDK rejection: reject,
//!                    editor never opened                 nothing saved
//! ```
//!
//! A batch is all-or-nothing: one bad operation means no change is saved.

use chrono::{DateTime, Utc};
use url::Url;

use super::dispatcher::{date_from_millis, optional, sdk_err, settle, DPromise};
use super::Bridge;
use crate::error::{Error, Result};
use crate::params::Parameters;
use crate::sdk::{
    AttributeValue, EventAttribute, EventAttributes, Location, ProfileEditor, SdkResult,
    SubscriptionState,
};
use crate::value::Value;

// ============================================================================
// IDENTIFY
// ============================================================================

pub fn identify(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(optional(params, "identifier", Value::as_str).map(|identifier| {
        bridge.sdk().profile.identify(identifier);
        Value::Null
    }))
}

// ============================================================================
// EDIT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum EditOperation {
    SetLanguage(Option<String>),
    SetRegion(Option<String>),
    SetEmailAddress(Option<String>),
    SetEmailMarketingSubscription(SubscriptionState),
    SetAttribute { key: String, value: AttributeValue },
    RemoveAttribute { key: String },
    AddToArray { key: String, item: String },
    RemoveFromArray { key: String, item: String },
}

impl EditOperation {
    fn apply(&self, editor: &mut dyn ProfileEditor) -> SdkResult<()> {
        match self {
            EditOperation::SetLanguage(v) => editor.set_language(v.as_deref()),
            EditOperation::SetRegion(v) => editor.set_region(v.as_deref()),
            EditOperation::SetEmailAddress(v) => editor.set_email_address(v.as_deref()),
            EditOperation::SetEmailMarketingSubscription(state) => {
                editor.set_email_marketing_subscription(*state)
            }
            EditOperation::SetAttribute { key, value } => editor.set_attribute(key, value.clone()),
            EditOperation::RemoveAttribute { key } => editor.remove_attribute(key),
            EditOperation::AddToArray { key, item } => editor.add_to_string_array(key, item),
            EditOperation::RemoveFromArray { key, item } => {
                editor.remove_from_string_array(key, item)
            }
        }
    }
}

pub fn edit(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(apply_edit(bridge, params))
}

fn apply_edit(bridge: &Bridge, params: &Parameters) -> Result<Value> {
    let operations = params
        .require_list("operations")?
        .iter()
        .map(decode_operation)
        .collect::<Result<Vec<_>>>()?;

    let mut editor = bridge.sdk().profile.editor();
    for operation in &operations {
        operation
            .apply(editor.as_mut())
            .map_err(|e| sdk_err("Profile edit rejected", e))?;
    }
    editor.save();

    tracing::debug!(operations = operations.len(), "Profile edit saved");
    Ok(Value::Null)
}

fn decode_operation(raw: &Value) -> Result<EditOperation> {
    let op = raw.as_map().ok_or_else(|| Error::bad_argument("operations"))?;
    let name = op.require_str("operation")?;
    let arg = |field: &str| Error::bad_argument(format!("{name}.{field}"));

    let nullable_string = || -> Result<Option<String>> {
        match op.get("value") {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| arg("value")),
        }
    };
    let string = |field: &str| -> Result<String> {
        op.get_str(field).map(str::to_string).ok_or_else(|| arg(field))
    };

    let operation = match name {
        "SET_LANGUAGE" => EditOperation::SetLanguage(nullable_string()?),
        "SET_REGION" => EditOperation::SetRegion(nullable_string()?),
        "SET_EMAIL_ADDRESS" => EditOperation::SetEmailAddress(nullable_string()?),
        "SET_EMAIL_MARKETING_SUBSCRIPTION" => {
            let state = match op.get_str("value") {
                Some("subscribed") => SubscriptionState::Subscribed,
                Some("unsubscribed") => SubscriptionState::Unsubscribed,
                _ => return Err(arg("value")),
            };
            EditOperation::SetEmailMarketingSubscription(state)
        }
        "SET_ATTRIBUTE" => {
            let key = string("key")?;
            let kind = op
                .get_str("type")
                .filter(|kind| ATTRIBUTE_TYPES.contains(kind))
                .ok_or_else(|| arg("type"))?;
            let value = attribute_value(kind, op.get("value"))
                .ok_or_else(|| arg(&format!("value ({kind})")))?;
            EditOperation::SetAttribute { key, value }
        }
        "REMOVE_ATTRIBUTE" => EditOperation::RemoveAttribute {
            key: string("key")?,
        },
        // Arrays validate the item before the key
        "ADD_TO_ARRAY" => {
            let item = string("value")?;
            EditOperation::AddToArray {
                key: string("key")?,
                item,
            }
        }
        "REMOVE_FROM_ARRAY" => {
            let item = string("value")?;
            EditOperation::RemoveFromArray {
                key: string("key")?,
                item,
            }
        }
        other => {
            return Err(Error::Internal(format!(
                "Unknown user data operation '{other}'"
            )))
        }
    };
    Ok(operation)
}

const ATTRIBUTE_TYPES: [&str; 7] = ["integer", "float", "string", "date", "boolean", "url", "array"];

/// `None` when `value` does not match `kind`
fn attribute_value(kind: &str, value: Option<&Value>) -> Option<AttributeValue> {
    let value = value?;
    Some(match kind {
        "integer" => AttributeValue::Integer(value.as_i64()?),
        "float" => AttributeValue::Float(value.as_f64()?),
        "string" => AttributeValue::String(value.as_str()?.to_string()),
        "boolean" => AttributeValue::Boolean(value.as_bool()?),
        "url" => AttributeValue::Url(Url::parse(value.as_str()?).ok()?),
        "date" => AttributeValue::Date(millis(value.as_i64()?)?),
        "array" => AttributeValue::StringArray(string_list(value)?),
        _ => return None,
    })
}

fn millis(ms: i64) -> Option<DateTime<Utc>> {
    date_from_millis(ms, "").ok()
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_list()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

// ============================================================================
// TRACKING
// ============================================================================

const EVENT_TYPE_ARG: &str = "event_data: type";
const EVENT_VALUE_ARG: &str = "event_data: attribute value";

pub fn track_event(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(build_event(params).map(|(name, attributes)| {
        bridge.sdk().profile.track_event(&name, attributes);
        Value::Null
    }))
}

fn build_event(params: &Parameters) -> Result<(String, Option<EventAttributes>)> {
    let name = params.require_str("name")?.to_string();
    // Event data of the wrong shape is dropped, not rejected
    let attributes = match params.get_map("event_data") {
        Some(raw) => Some(event_attributes(raw)?),
        None => None,
    };
    Ok((name, attributes))
}

fn event_attributes(raw: &Parameters) -> Result<EventAttributes> {
    let mut attributes = EventAttributes::new();
    for (key, typed) in raw.iter() {
        let typed = typed.as_map();
        let kind = typed
            .and_then(|t| t.get_str("type"))
            .ok_or_else(|| Error::bad_argument(EVENT_TYPE_ARG))?;
        let value = typed.and_then(|t| t.get("value")).unwrap_or(&Value::Null);
        attributes.insert(key.clone(), event_attribute(kind, value)?);
    }
    Ok(attributes)
}

fn event_attribute(kind: &str, value: &Value) -> Result<EventAttribute> {
    let bad_value = || Error::bad_argument(EVENT_VALUE_ARG);

    let attribute = match kind {
        "s" => EventAttribute::String(value.as_str().ok_or_else(bad_value)?.to_string()),
        "u" => value
            .as_str()
            .and_then(|s| Url::parse(s).ok())
            .map(EventAttribute::Url)
            .ok_or_else(bad_value)?,
        "b" => EventAttribute::Bool(value.as_bool().ok_or_else(bad_value)?),
        "i" => EventAttribute::Integer(value.as_i64().ok_or_else(bad_value)?),
        "f" => EventAttribute::Float(value.as_f64().ok_or_else(bad_value)?),
        "d" => EventAttribute::Date(
            value
                .as_i64()
                .and_then(millis)
                .ok_or_else(bad_value)?,
        ),
        "o" => EventAttribute::Object(event_attributes(value.as_map().ok_or_else(bad_value)?)?),
        "sa" => EventAttribute::StringArray(string_list(value).ok_or_else(bad_value)?),
        "oa" => {
            let objects = value
                .as_list()
                .ok_or_else(bad_value)?
                .iter()
                .map(|item| event_attributes(item.as_map().ok_or_else(bad_value)?))
                .collect::<Result<Vec<_>>>()?;
            EventAttribute::ObjectArray(objects)
        }
        other => {
            return Err(Error::Internal(format!(
                "event_data.attributes: unknown type '{other}'"
            )))
        }
    };
    Ok(attribute)
}

pub fn track_transaction(bridge: &Bridge, params: &Parameters) -> DPromise {
    let transaction = params
        .require_f64("amount")
        .and_then(|amount| Ok((amount, optional(params, "data", Value::as_map)?.cloned())));

    settle(transaction.map(|(amount, data)| {
        bridge.sdk().profile.track_transaction(amount, data);
        Value::Null
    }))
}

pub fn track_location(bridge: &Bridge, params: &Parameters) -> DPromise {
    settle(location(params).map(|location| {
        bridge.sdk().profile.track_location(location);
        Value::Null
    }))
}

fn location(params: &Parameters) -> Result<Location> {
    let latitude = params.require_f64("latitude")?;
    let longitude = params.require_f64("longitude")?;
    let precision = optional(params, "precision", Value::as_i64)?;
    let date = match optional(params, "date", Value::as_i64)? {
        Some(ms) => Some(date_from_millis(ms, "date")?),
        None => None,
    };
    Ok(Location {
        latitude,
        longitude,
        precision,
        date,
    })
}
