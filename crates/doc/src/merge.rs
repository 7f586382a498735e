use serde_json::Value;

/// Recursively merge `from` into `into`. Mappings merge key-wise, with keys
/// of `from` overriding those of `into`. Sequences are replaced wholesale
/// rather than merged element-wise, as are scalars and mismatched types.
pub fn deep_merge(into: &mut Value, from: &Value) {
    match (&mut *into, from) {
        (Value::Object(into_map), Value::Object(from_map)) => {
            for (key, value) in from_map {
                match into_map.get_mut(key) {
                    Some(nested) => deep_merge(nested, value),
                    None => {
                        into_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (other, from) => *other = from.clone(),
    }
}
