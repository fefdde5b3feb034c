/// Error raised by a tool handler.
///
/// The dispatcher only ever shows the `Display` text of these to callers.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
