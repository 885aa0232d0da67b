use crate::decode::{DecodeError, FromBody};
use crate::models::ApiErrorBody;
use std::future::Future;
use thiserror::Error;

/// Outcome of a single API call.
#[derive(Debug)]
pub enum ApiResult<T> {
    Success(T),
    /// The service answered, but not with what we asked for.
    Error { code: u16, message: String },
    /// The call never produced a usable response.
    Exception(ApiException),
}

#[derive(Debug, Error)]
pub enum ApiException {
    #[error("request timed out")]
    Timeout,

    #[error("could not connect: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiException {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiException::Timeout
        } else if err.is_connect() {
            ApiException::Connect(err.to_string())
        } else {
            ApiException::Transport(err)
        }
    }
}

impl<T> ApiResult<T> {
    /// Splits off the failure description, if any, for display.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            ApiResult::Success(value) => Ok(value),
            ApiResult::Error { code, message } => Err(format!("{} ({})", message, code)),
            ApiResult::Exception(cause) => Err(format!("network error: {}", cause)),
        }
    }
}

/// What the transport handed back, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub success: bool,
    pub body: Option<Vec<u8>>,
    pub error_body: Option<String>,
}

impl RawResponse {
    pub fn from_parts(status: u16, bytes: Vec<u8>) -> Self {
        let success = (200..300).contains(&status);
        let present = !bytes.is_empty();
        if success {
            RawResponse {
                status,
                success,
                body: present.then_some(bytes),
                error_body: None,
            }
        } else {
            RawResponse {
                status,
                success,
                body: None,
                error_body: present.then(|| String::from_utf8_lossy(&bytes).into_owned()),
            }
        }
    }
}

pub fn handle_response<T: FromBody>(response: RawResponse) -> ApiResult<T> {
    let code = response.status;
    if response.success {
        match T::from_body(response.body.as_deref()) {
            Ok(Some(value)) => ApiResult::Success(value),
            Ok(None) => ApiResult::Error {
                code,
                message: "Empty response body".to_string(),
            },
            Err(err) => ApiResult::Exception(err.into()),
        }
    } else {
        let parsed = response
            .error_body
            .as_deref()
            .and_then(|body| serde_json::from_str::<ApiErrorBody>(body).ok());
        let message = match parsed {
            Some(ApiErrorBody { error, message }) => {
                tracing::debug!(code, kind = %error, %message, "service returned an error");
                message
            }
            None => format!("Unknown error ({})", code),
        };
        ApiResult::Error { code, message }
    }
}

/// Runs a transport call and folds every outcome into an [`ApiResult`].
pub async fn safe_api_call<T, F>(call: F) -> ApiResult<T>
where
    T: FromBody,
    F: Future<Output = Result<RawResponse, ApiException>>,
{
    match call.await {
        Ok(response) => handle_response(response),
        Err(cause) => {
            tracing::warn!(error = %cause, "request failed before a response arrived");
            ApiResult::Exception(cause)
        }
    }
}
