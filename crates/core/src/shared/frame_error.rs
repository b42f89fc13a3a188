use thiserror::Error;

/// Per-frame failure taxonomy. Every variant is scoped to a single frame:
/// the pipeline reports it to the originating connection and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("invalid image data: {0}")]
    InvalidImageData(String),
    #[error("inference failed: {0}")]
    InferenceError(String),
    #[error("encoding failed: {0}")]
    EncodingFailure(String),
}

impl FrameError {
    /// True for faults caused by what the client sent.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            FrameError::MalformedPayload(_) | FrameError::InvalidImageData(_)
        )
    }

    /// Stable short name, used as a counter key.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::MalformedPayload(_) => "malformed_payload",
            FrameError::InvalidImageData(_) => "invalid_image",
            FrameError::InferenceError(_) => "inference",
            FrameError::EncodingFailure(_) => "encoding",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::malformed(FrameError::MalformedPayload("x".into()), true)]
    #[case::invalid_image(FrameError::InvalidImageData("x".into()), true)]
    #[case::inference(FrameError::InferenceError("x".into()), false)]
    #[case::encoding(FrameError::EncodingFailure("x".into()), false)]
    fn test_client_fault_classification(#[case] err: FrameError, #[case] expected: bool) {
        assert_eq!(err.is_client_fault(), expected);
    }

    #[test]
    fn test_kind_names_are_distinct() {
        let kinds = [
            FrameError::MalformedPayload(String::new()).kind(),
            FrameError::InvalidImageData(String::new()).kind(),
            FrameError::InferenceError(String::new()).kind(),
            FrameError::EncodingFailure(String::new()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }

    #[test]
    fn test_display_names_the_kind() {
        let err = FrameError::MalformedPayload("missing separator".into());
        assert_eq!(err.to_string(), "malformed payload: missing separator");
    }
}
