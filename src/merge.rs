use std::collections::BTreeMap;

use serde_json::Value;

use crate::body::EchoBody;
use crate::config::EchoConfig;

/// Structural merge of two JSON values. When both sides are records the
/// merge recurses per key; in every other pairing the overlay value wins
/// wholesale; lists are replaced, never concatenated or element-merged.
/// Neither input is mutated.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_fields), Value::Object(overlay_fields)) => {
            let mut merged = base_fields.clone();
            for (key, overlay_value) in overlay_fields {
                let next = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// Merges a long-lived base configuration with a per-call configuration.
///
/// Header and param maps are merged per key with overlay entries winning;
/// `Json`-record bodies merge recursively; every other field is replaced by
/// the overlay when present and kept from the base otherwise. Values taken
/// from the base are cloned, so the result never aliases either input.
pub fn merge_configs(base: &EchoConfig, overlay: EchoConfig) -> EchoConfig {
    let url = if overlay.url.is_empty() {
        base.url.clone()
    } else {
        overlay.url
    };
    let body = match (base.body.as_ref(), overlay.body) {
        (Some(EchoBody::Json(base_value)), Some(EchoBody::Json(overlay_value))) => {
            Some(EchoBody::Json(deep_merge(base_value, &overlay_value)))
        }
        (_, Some(overlay_body)) => Some(overlay_body),
        (base_body, None) => base_body.cloned(),
    };

    EchoConfig {
        method: overlay.method.or_else(|| base.method.clone()),
        url,
        base_url: overlay.base_url.or_else(|| base.base_url.clone()),
        params: merge_maps(base.params.as_ref(), overlay.params, |base_value, overlay_value| {
            deep_merge(base_value, &overlay_value)
        }),
        headers: merge_maps(base.headers.as_ref(), overlay.headers, |_, overlay_value| {
            overlay_value
        }),
        body,
        response_type: overlay.response_type.or_else(|| base.response_type.clone()),
        timeout: overlay.timeout.or(base.timeout),
    }
}

fn merge_maps<V: Clone>(
    base: Option<&BTreeMap<String, V>>,
    overlay: Option<BTreeMap<String, V>>,
    combine: impl Fn(&V, V) -> V,
) -> Option<BTreeMap<String, V>> {
    match (base, overlay) {
        (None, None) => None,
        (Some(base_map), None) => Some(base_map.clone()),
        (None, Some(overlay_map)) => Some(overlay_map),
        (Some(base_map), Some(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(&key) {
                    Some(existing) => combine(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Some(merged)
        }
    }
}
