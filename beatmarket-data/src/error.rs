use beatmarket_store::StoreError;
use thiserror::Error;

pub type DataResult<T> = std::result::Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    /// An unknown or internal error happened with the document store
    #[error(transparent)]
    Internal(#[from] StoreError),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource a precondition depends on doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate around uniqueness checks
pub(crate) trait EnsureVacant {
    /// Turns the lookup into a conflict error if it found something
    fn ensure_vacant(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DataResult<()>;
}

impl<T> EnsureVacant for DataResult<Option<T>> {
    fn ensure_vacant(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DataResult<()> {
        match self? {
            Some(_) => Err(DataError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Unwraps a lookup whose subject is a precondition of the calling operation
pub(crate) fn required<T>(
    value: Option<T>,
    resource: &'static str,
    identifier: &'static str,
) -> DataResult<T> {
    value.ok_or(DataError::NotFound {
        resource,
        identifier,
    })
}
