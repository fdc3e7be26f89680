use serde::{Deserialize, Serialize};

/// The error envelope every failed query renders to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub success: bool,
}

impl ErrorBody {
    pub fn new(error: impl ToString) -> ErrorBody {
        ErrorBody {
            error: error.to_string(),
            success: false,
        }
    }
}
