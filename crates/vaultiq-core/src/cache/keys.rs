//! Cache key builder.
//!
//! Keys are opaque strings; collisions are prevented by canonical prefixes.

pub fn session(session_id: &str) -> String {
    format!("session-pool-{session_id}")
}

pub fn user_sessions(user_id: &str) -> String {
    format!("user-sessions-{user_id}")
}

pub fn revocation(session_id: &str) -> String {
    format!("revocation-{session_id}")
}

pub fn revocation_by_user(user_id: &str) -> String {
    format!("revocation-by-user-{user_id}")
}

pub fn fingerprint(session_id: &str) -> String {
    format!("session-pool-fp-{session_id}")
}
