use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

const MAX_SESSION_ID_LEN: usize = 128;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque, unauthenticated token that keys a shopping cart.
///
/// The token is passed explicitly to every cart operation; nothing in the
/// crate reads it from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::BadRequest("Session ID is required".to_string()));
        }
        if trimmed.len() > MAX_SESSION_ID_LEN {
            return Err(ServiceError::BadRequest(format!(
                "Session ID must be at most {MAX_SESSION_ID_LEN} characters"
            )));
        }
        Ok(SessionId(trimmed.to_string()))
    }

    /// Generates a fresh token of the form `session_<unix millis>_<9 base36 chars>`.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..9)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        SessionId(format!(
            "session_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
