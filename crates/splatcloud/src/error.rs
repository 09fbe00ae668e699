use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SplatError> = std::result::Result<T, E>;

/// Failures raised while turning captures into a splat cloud and writing it out.
///
/// `DecodeFailure` and `DepthUnavailable` are per-image: the reconstruction and
/// the pipeline log them and move on to the next capture. Whatever a depth
/// source returns is folded into `DepthUnavailable` for that capture.
/// Otherwise `MalformedInput` and `Io` reach the caller.
#[derive(Debug, Error)]
pub enum SplatError {
    /// The capture could not be turned into an RGB8 pixel buffer.
    #[error("failed to decode image '{label}': {reason}")]
    DecodeFailure { label: String, reason: String },

    /// No usable depth buffer exists for the capture.
    #[error("depth unavailable for '{label}': {reason}")]
    DepthUnavailable { label: String, reason: String },

    /// Buffer sizes disagree with the declared dimensions.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A blocking stage was torn down before it finished, e.g. at runtime
    /// shutdown. No partial model is ever returned.
    #[error("pipeline stage aborted: {0}")]
    Aborted(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SplatError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SplatError::Io {
            path: path.into(),
            source,
        }
    }

    /// Recasts a depth source failure as a per-image skip for `label`.
    pub(crate) fn into_depth_unavailable(self, label: &str) -> Self {
        match self {
            SplatError::DepthUnavailable { .. } => self,
            other => SplatError::DepthUnavailable {
                label: label.to_owned(),
                reason: other.to_string(),
            },
        }
    }

    /// True for the per-image failures a run skips over.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SplatError::DecodeFailure { .. } | SplatError::DepthUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_source_failures_become_unavailable() {
        let err = SplatError::MalformedInput("wrong tensor shape".into()).into_depth_unavailable("a");
        assert!(err.is_recoverable());
        match err {
            SplatError::DepthUnavailable { label, reason } => {
                assert_eq!(label, "a");
                assert!(reason.contains("wrong tensor shape"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
