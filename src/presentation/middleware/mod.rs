mod session;

pub use session::{SESSION_COOKIE, require_session, session_token};
