/// Failures outside of configuration source itself: reading files and
/// loading renderer settings.
///
/// Problems in configuration source are reported as
/// [`crate::Diagnostics`] instead.
#[derive(Debug, thiserror::Error)]
pub enum HclError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}
