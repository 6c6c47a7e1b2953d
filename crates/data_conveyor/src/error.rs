use std::path::PathBuf;

/// Errors raised while turning an augmentation config into transforms.
///
/// These travel inside `anyhow::Error`; callers that need to branch on the
/// cause can `downcast_ref::<ConfigError>()`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown transform key `{key}`")]
    UnknownTransform { key: String },

    #[error("configuration for `{transform}` must be an object")]
    NotAnObject { transform: String },

    #[error("transform `{transform}` is missing parameter `{parameter}`")]
    MissingParameter { transform: String, parameter: String },

    #[error("transform `{transform}` has invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        transform: String,
        parameter: String,
        reason: String,
    },
}

/// Errors specific to checkpoint archives.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("archive {archive} has no member `{member}`")]
    MissingMember { archive: PathBuf, member: String },

    #[error("artifact path {0} has no file name")]
    NoFileName(PathBuf),
}
