//! Opérations sur l'arbre YAML de configuration.
//!
//! Les chemins sont des listes de clés (`&["renderer", "seek_step_secs"]`),
//! toujours comparées en minuscules.

use anyhow::{anyhow, Result};
use serde_yaml::{Mapping, Value};

/// Fusionne `overlay` dans `base`, les valeurs de `overlay` l'emportant.
///
/// Les mappings sont fusionnés récursivement, tout le reste est remplacé.
pub fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

pub fn get(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        let Value::Mapping(map) = current else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        };
        match map.get(Value::String(key.to_lowercase())) {
            Some(next) => current = next,
            None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
        }
    }
    Ok(current.clone())
}

pub fn set(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((head, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };
    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a mapping"));
    };
    let key = Value::String(head.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        return Ok(());
    }
    let entry = map
        .entry(key)
        .or_insert(Value::Mapping(Mapping::new()));
    // Un scalaire sur le chemin est remplacé par un mapping
    if !entry.is_mapping() {
        *entry = Value::Mapping(Mapping::new());
    }
    set(entry, rest, value)
}

pub fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut lowered = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                lowered.insert(k, lower_keys(v));
            }
            Value::Mapping(lowered)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        _ => value,
    }
}

/// Applies `PREFIX` + `A__B__C=value` pairs onto the tree.
///
/// Values are parsed as YAML scalars first so that `PREFIX__RENDERER__SEEK_STEP_SECS=10`
/// lands as a number; anything unparseable is kept as a string.
pub fn apply_overrides<I>(data: &mut Value, prefix: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(prefix) else {
            continue;
        };
        let path: Vec<&str> = stripped.split("__").filter(|k| !k.is_empty()).collect();
        if path.is_empty() {
            continue;
        }
        let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw.clone()));
        if let Err(err) = set(data, &path, value) {
            tracing::warn!(variable = %key, error = %err, "Ignoring configuration override");
        }
    }
}
