use crate::repository::RepositoryError;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Repository(anyhow::Error),
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        CoreError::Validation(errors)
    }
}

impl From<RepositoryError> for CoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::StaleRevision(id) => CoreError::Conflict(format!(
                "Hearing {id} was modified by another request, reload and retry"
            )),
            RepositoryError::SlugTaken(slug) => {
                CoreError::Conflict(format!("Slug '{slug}' is already in use"))
            }
            RepositoryError::IdTaken(id) => {
                CoreError::Conflict(format!("Hearing id '{id}' is already in use"))
            }
            RepositoryError::Backend(source) => CoreError::Repository(source),
        }
    }
}
