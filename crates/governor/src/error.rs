use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GovernorError {
    #[error("unknown tier '{0}' (expected low, medium, high or ultra)")]
    UnknownTier(String),
    #[error("unknown network type '{0}'")]
    UnknownNetwork(String),
    #[error("invalid preset override for tier {tier}: {message}")]
    InvalidPreset { tier: String, message: String },
    #[error("failed to start capability probe: {0}")]
    ProbeSpawn(#[source] std::io::Error),
    #[error("capability probe did not finish within {0:?}")]
    ProbeTimeout(Duration),
    #[error("capability probe exited without a result")]
    ProbeDisconnected,
}
