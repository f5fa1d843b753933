//! Errors from loading and saving `config.ron`.

/// Why the client configuration could not be loaded or stored.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `config.ron` exists but could not be read.
    #[error("cannot read voxlink config.ron: {0}")]
    ReadError(#[source] std::io::Error),

    /// The config directory or `config.ron` could not be written.
    #[error("cannot write voxlink config.ron: {0}")]
    WriteError(#[source] std::io::Error),

    /// `config.ron` is not a valid world/network/account/generator config.
    #[error("invalid voxlink config.ron: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// The in-memory config could not be rendered as RON.
    #[error("cannot encode voxlink config as RON: {0}")]
    SerializeError(#[source] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_config_file() {
        let err = ron::from_str::<crate::Config>("(world: 3")
            .map_err(ConfigError::ParseError)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("invalid voxlink config.ron: "), "{text}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_errors_keep_their_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::WriteError(io);
        assert_eq!(err.to_string(), "cannot write voxlink config.ron: denied");
    }
}
