use serde::{Deserialize, Serialize};

/// Identity of whoever is calling into the service.
///
/// Passed explicitly into every operation; the service keeps no notion of a
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: String,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}
