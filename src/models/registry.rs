//! Текущая обслуживаемая пара scaler + модель

use std::sync::{Arc, PoisonError, RwLock};

use crate::models::artifact::ModelArtifact;

/// Хранит неизменяемый снимок артефакта. Чтение клонирует `Arc`,
/// переобучение заменяет снимок целиком одной операцией.
pub struct ModelRegistry {
    current: RwLock<Arc<ModelArtifact>>,
}

impl ModelRegistry {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            current: RwLock::new(Arc::new(artifact)),
        }
    }

    pub fn snapshot(&self) -> Arc<ModelArtifact> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Публикует новую пару, возвращает предыдущую
    pub fn publish(&self, next: Arc<ModelArtifact>) -> Arc<ModelArtifact> {
        let trained_at = next.trained_at();
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };

        tracing::info!(
            previous = %previous.trained_at(),
            current = %trained_at,
            "Model artifact published"
        );
        previous
    }
}
