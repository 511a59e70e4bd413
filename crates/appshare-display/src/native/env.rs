//! Environment sanitization for launched applications.

/// Variables inherited from the server's environment; everything else is
/// dropped so server secrets never reach a shared application.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME",
    "USER",
    "LOGNAME",
    "PATH",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "XAUTHORITY",
    "XDG_RUNTIME_DIR",
    "DBUS_SESSION_BUS_ADDRESS",
    "TMPDIR",
];

/// Collect the allowed variables that are set, via `lookup`.
pub fn sanitized_env<F>(lookup: F) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    ALLOWED_ENV_VARS
        .iter()
        .filter_map(|key| lookup(key).map(|v| (key.to_string(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_not_inherited() {
        let env = sanitized_env(|k| match k {
            "HOME" => Some("/home/u".into()),
            "AWS_SECRET_ACCESS_KEY" => Some("nope".into()),
            _ => None,
        });
        assert_eq!(env, vec![("HOME".to_string(), "/home/u".to_string())]);
    }

    #[test]
    fn display_is_not_inherited() {
        assert!(!ALLOWED_ENV_VARS.contains(&"DISPLAY"));
    }
}
