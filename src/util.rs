//! Small helpers shared by command implementations

use crate::error::CommandError;
use crate::resource::Filter;
use serde_json::Value;
use std::path::Path;

/// First non-empty environment variable among `vars`, else `default`
pub fn env(vars: &[&str], default: &str) -> String {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// JSON truthiness: null, false, zero and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A filter holding `arg_name` only when `value` is set
pub fn build_kwargs_dict(arg_name: &str, value: Option<Value>) -> Filter {
    let mut kwargs = Filter::new();
    if let Some(value) = value.filter(is_truthy) {
        kwargs.insert(arg_name.to_string(), value);
    }
    kwargs
}

/// Read a small text file (a token, a key, user data), trimmed
pub fn read_blob_file_contents(path: &Path) -> Result<String, CommandError> {
    std::fs::read_to_string(path)
        .map(|blob| blob.trim().to_string())
        .map_err(|source| CommandError::ReadFile {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_falls_back_to_default() {
        assert_eq!(
            env(&["CLOUDRES_TEST_SURELY_UNSET_1", "CLOUDRES_TEST_SURELY_UNSET_2"], "dflt"),
            "dflt"
        );
    }

    #[test]
    fn test_env_first_defined_wins() {
        // PATH is set in any sane test environment
        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(env(&["CLOUDRES_TEST_SURELY_UNSET_3", "PATH"], "dflt"), path);
        }
    }

    #[test]
    fn test_build_kwargs_dict() {
        let kwargs = build_kwargs_dict("domain_id", Some(json!("default")));
        assert_eq!(kwargs.get("domain_id"), Some(&json!("default")));
        assert!(build_kwargs_dict("domain_id", Some(json!(""))).is_empty());
        assert!(build_kwargs_dict("domain_id", None).is_empty());
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!(0.5)));
        assert!(is_truthy(&json!("x")));
    }

    #[test]
    fn test_read_blob_file_contents() {
        let path = std::env::temp_dir().join(format!("cloudres-blob-{}", std::process::id()));
        std::fs::write(&path, "  secret-token\n").unwrap();
        assert_eq!(read_blob_file_contents(&path).unwrap(), "secret-token");
        std::fs::remove_file(&path).unwrap();

        let err = read_blob_file_contents(&path).unwrap_err();
        assert!(err.to_string().starts_with("Error occurred trying to read from file"));
    }
}
