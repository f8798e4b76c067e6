//! Ошибки конвейера: подготовка данных, обучение, хранение

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Набор признаков не совпадает с обученным (по именам или порядку)
    #[error("schema error: {0}")]
    Schema(String),

    /// Входная строка не прошла санитизацию
    #[error("validation error: {0}")]
    Validation(String),

    /// Обучение на пустом или вырожденном наборе
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("blob store I/O failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid model artifact: {0}")]
    Artifact(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Ошибка вызвана входными данными клиента (HTTP 400), а не сервером
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Schema(_) | Self::Validation(_) | Self::InsufficientData(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(PipelineError::schema("x").is_client_error());
        assert!(PipelineError::validation("x").is_client_error());
        assert!(PipelineError::insufficient("x").is_client_error());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!PipelineError::from(io).is_client_error());
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        match PipelineError::from(io) {
            PipelineError::Storage(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
