use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // Back off to a char boundary so multi-byte bodies cannot panic
            let mut cut = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        let status = reqwest::StatusCode::from_u16(401).unwrap();
        assert!(matches!(
            ApiError::from_status(status, ""),
            ApiError::Unauthorized
        ));

        let status = reqwest::StatusCode::from_u16(404).unwrap();
        assert!(matches!(
            ApiError::from_status(status, "no such leave"),
            ApiError::NotFound(_)
        ));

        let status = reqwest::StatusCode::from_u16(503).unwrap();
        assert!(matches!(
            ApiError::from_status(status, "down"),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let status = reqwest::StatusCode::from_u16(500).unwrap();
        let body = "x".repeat(2000);
        let err = ApiError::from_status(status, &body);
        let message = err.to_string();
        assert!(message.contains("truncated"));
        assert!(message.len() < body.len());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let status = reqwest::StatusCode::from_u16(500).unwrap();
        // Three-byte characters guarantee the cut point lands mid-char
        let body = "✓".repeat(MAX_ERROR_BODY_LENGTH);
        let err = ApiError::from_status(status, &body);
        let message = err.to_string();
        assert!(message.contains("truncated"));
    }
}
