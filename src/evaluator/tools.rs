//! Tool collections (spec §4.5.1): `/var ... tools` bindings and the
//! `/exe` parameters that consume them via `expose`.

use crate::errors::{MlldError, MlldResult};
use crate::value::{Value, ValueData};

/// Checks that every name in `required` is present as a field on a
/// tools-collection value, raising `EXPOSE_MISSING_REQUIRED` (spec
/// §4.5.1) for the first one that isn't.
pub fn validate_expose(collection: &Value, required: &[String]) -> MlldResult<()> {
    let fields = match &collection.data {
        ValueData::Object(map) => map,
        _ => {
            return Err(MlldError::ToolCollectionInvalid {
                message: "expose target is not a tools collection".to_string(),
            })
        }
    };

    for name in required {
        if !fields.contains_key(name) {
            return Err(MlldError::ExposeMissingRequired { name: name.clone() });
        }
    }
    Ok(())
}

/// Narrows a tools collection down to only the `expose`d names, in the
/// order requested.
pub fn expose_subset(collection: &Value, names: &[String]) -> MlldResult<Value> {
    validate_expose(collection, names)?;
    let fields = match &collection.data {
        ValueData::Object(map) => map,
        _ => unreachable!("validate_expose already rejected non-object collections"),
    };

    let mut subset = indexmap::IndexMap::new();
    for name in names {
        subset.insert(name.clone(), fields[name].clone());
    }
    Ok(Value::with_security(ValueData::Object(subset), collection.security.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(names: &[&str]) -> Value {
        let mut fields = indexmap::IndexMap::new();
        for name in names {
            fields.insert(name.to_string(), Value::text(format!("fn:{name}")));
        }
        Value::new(ValueData::Object(fields))
    }

    #[test]
    fn missing_required_tool_is_rejected() {
        let coll = collection(&["search"]);
        let err = validate_expose(&coll, &["search".to_string(), "fetch".to_string()]).unwrap_err();
        assert_eq!(err.code(), "EXPOSE_MISSING_REQUIRED");
    }

    #[test]
    fn expose_subset_narrows_to_requested_names() {
        let coll = collection(&["search", "fetch", "write"]);
        let subset = expose_subset(&coll, &["fetch".to_string()]).unwrap();
        match subset.data {
            ValueData::Object(map) => assert_eq!(map.len(), 1),
            _ => panic!("expected object"),
        }
    }
}
