//! Bash variable helper injection (spec §4.6.1): every variable visible
//! to a `sh`/`bash` exec form gets paired `MLLD_IS_VARIABLE_<NAME>` and
//! `MLLD_TYPE_<NAME>` environment entries so shell script bodies can
//! branch on whether a token came from mlld or the ambient shell.

use indexmap::IndexMap;

use crate::value::Value;

fn shell_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Builds the `MLLD_IS_VARIABLE_*`/`MLLD_TYPE_*` env entries for one
/// bound variable, alongside the variable's own rendered value under
/// its own name.
pub fn bash_helper_vars(name: &str, value: &Value) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    let key = shell_safe_name(name);
    out.insert(name.to_string(), value.render());
    out.insert(format!("MLLD_IS_VARIABLE_{key}"), "1".to_string());
    out.insert(format!("MLLD_TYPE_{key}"), value.type_name().to_string());
    out
}

/// Builds helper vars for every binding an exec invocation can see.
pub fn bash_helper_env<'a>(bindings: impl IntoIterator<Item = (&'a str, &'a Value)>) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for (name, value) in bindings {
        out.extend(bash_helper_vars(name, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueData;

    #[test]
    fn generates_is_variable_and_type_entries() {
        let value = Value::new(ValueData::Number(3.0));
        let vars = bash_helper_vars("count", &value);
        assert_eq!(vars.get("count"), Some(&"3".to_string()));
        assert_eq!(vars.get("MLLD_IS_VARIABLE_COUNT"), Some(&"1".to_string()));
        assert_eq!(vars.get("MLLD_TYPE_COUNT"), Some(&"number".to_string()));
    }

    #[test]
    fn non_alphanumeric_names_are_sanitized() {
        let value = Value::text("x");
        let vars = bash_helper_vars("my-var", &value);
        assert!(vars.contains_key("MLLD_IS_VARIABLE_MY_VAR"));
    }
}
