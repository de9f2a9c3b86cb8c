use thiserror::Error;

/// A guest value could not be converted to the declared host type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarshalError {
    #[error("Unexpected result shape: expected a list or a mapping, got {found}")]
    UnexpectedResultShape { found: &'static str },

    #[error("Cannot parse '{text}' as {ty}")]
    ParseInt { ty: &'static str, text: String },

    #[error("Cannot parse '{text}' as {ty}")]
    ParseFloat { ty: &'static str, text: String },

    #[error("Cannot parse '{text}' as BOOLEAN")]
    ParseBool { text: String },

    #[error("Invalid JSON for record: {message}")]
    InvalidJson { text: String, message: String },

    #[error("Missing field '{field}'")]
    MissingField { field: String },

    #[error("Expected a mapping, got {found}")]
    NotAMapping { found: &'static str },
}

impl MarshalError {
    /// Stable name for logs and the marshal-event channel.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnexpectedResultShape { .. } => "unexpected_result_shape",
            Self::ParseInt { .. } => "parse_int",
            Self::ParseFloat { .. } => "parse_float",
            Self::ParseBool { .. } => "parse_bool",
            Self::InvalidJson { .. } => "invalid_json",
            Self::MissingField { .. } => "missing_field",
            Self::NotAMapping { .. } => "not_a_mapping",
        }
    }
}
