//! Node identity resolution.

use crate::config::NODE_NAME_ENV;
use crate::error::IdentityError;
use std::env::VarError;
use tracing::{debug, warn};

/// Determines which node this daemon manages.
///
/// A non-empty `explicit` name wins and is not checked against the cluster.
/// Otherwise `lookup` is asked for [`NODE_NAME_ENV`]; an unset or empty value
/// is an error since guessing could manage the wrong node.
pub fn resolve_node_name<L>(explicit: &str, lookup: L) -> Result<String, IdentityError>
where
    L: FnOnce(&str) -> Option<String>,
{
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }

    match lookup(NODE_NAME_ENV) {
        Some(name) if !name.is_empty() => {
            debug!(env = NODE_NAME_ENV, node = %name, "Node name taken from environment");
            Ok(name)
        }
        _ => Err(IdentityError::MissingNodeName { env: NODE_NAME_ENV }),
    }
}

/// Reads from the process environment.
///
/// A value that is not valid UTF-8 cannot name a node and is treated as
/// unset, with a warning so the resulting error is not mistaken for a
/// missing variable.
pub fn process_env(key: &str) -> Option<String> {
    env_value(key, std::env::var(key))
}

fn env_value(key: &str, value: Result<String, VarError>) -> Option<String> {
    match value {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(raw)) => {
            warn!(env = key, value = ?raw, "Ignoring environment variable that is not valid UTF-8");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_name_skips_environment() {
        for name in ["worker-1", "node.example.com", " "] {
            let resolved = resolve_node_name(name, |_| -> Option<String> {
                panic!("environment must not be consulted")
            });
            assert_eq!(resolved.expect("explicit name should resolve"), name);
        }
    }

    #[test]
    fn test_environment_fallback() {
        let resolved = resolve_node_name("", |key| {
            assert_eq!(key, "NODE_NAME");
            Some("worker-2".to_string())
        });
        assert_eq!(resolved.expect("env name should resolve"), "worker-2");
    }

    #[test]
    fn test_unset_environment_is_fatal() {
        let result = resolve_node_name("", |_| None);
        assert!(matches!(
            result,
            Err(IdentityError::MissingNodeName { env: "NODE_NAME" })
        ));
    }

    #[test]
    fn test_env_value() {
        assert_eq!(env_value("NODE_NAME", Ok("worker-3".to_string())), Some("worker-3".to_string()));
        assert_eq!(env_value("NODE_NAME", Err(VarError::NotPresent)), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_is_unset() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(vec![b'w', 0xff, b'1']);
        let value = env_value("NODE_NAME", Err(VarError::NotUnicode(raw)));
        assert_eq!(value, None);
        assert!(matches!(
            resolve_node_name("", |_| value),
            Err(IdentityError::MissingNodeName { env: "NODE_NAME" })
        ));
    }

    #[test]
    fn test_empty_environment_is_fatal() {
        let result = resolve_node_name("", |_| Some(String::new()));
        assert!(result.is_err(), "empty NODE_NAME must not resolve");
    }
}
