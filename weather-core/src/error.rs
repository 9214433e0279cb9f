use thiserror::Error;

/// Why a fetch attempt produced no weather.
///
/// `Display` is the text shown to the user. For [`FetchError::Unknown`] the
/// diagnostic detail is kept out of the message; read it with [`FetchError::detail`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Please input the city name")]
    Empty,

    #[error("No internet connection")]
    NoConnection,

    #[error("City not found or the country does not exist")]
    NotFound,

    #[error("An error occurred while fetching data")]
    Unknown(String),
}

impl FetchError {
    pub fn unknown(detail: impl Into<String>) -> Self {
        FetchError::Unknown(detail.into())
    }

    /// Diagnostic detail for logs. Only `Unknown` carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            FetchError::Unknown(detail) => Some(detail.as_str()),
            _ => None,
        }
    }
}
