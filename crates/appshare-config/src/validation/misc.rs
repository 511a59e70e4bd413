//! Validation for smaller config sections: sessions and server.

use crate::schema::AppShareConfig;

use super::helpers::validate_range;

pub(crate) fn validate_sessions(errors: &mut Vec<String>, config: &AppShareConfig) {
    validate_range(
        errors,
        "sessions.max_participants",
        config.sessions.max_participants as u64,
        1,
        100,
    );
}

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &AppShareConfig) {
    let server = &config.server;
    validate_range(errors, "server.port", server.port as u64, 1024, 65_535);
    validate_range(
        errors,
        "server.hello_timeout_secs",
        server.hello_timeout_secs,
        1,
        120,
    );
    validate_range(
        errors,
        "server.max_connections",
        server.max_connections as u64,
        1,
        10_000,
    );
    if server.bind.trim().is_empty() {
        errors.push("server.bind must not be empty".into());
    }
}
