//! Error handling.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{event, Level};

/// Pastizales server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum PastizalesError {
    /// Error deserialising a request body
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error deserialising query parameters
    #[error("query parameters are not valid")]
    QueryRejection(#[from] QueryRejection),

    /// A year path parameter that is not a number
    #[error("invalid year {year}")]
    InvalidYear { year: String },

    /// Document lookup by id found nothing
    #[error("document {id} not found in {collection}")]
    DocumentNotFound { collection: String, id: String },

    /// No community has the requested order
    #[error("no community found with order {order}")]
    CommunityOrderNotFound { order: String },

    /// Map type is not in the layer catalog
    #[error("unknown map type {map_type}")]
    UnknownMapType { map_type: String },

    /// Indicator is not in the indicator catalog
    #[error("unknown indicator {indicator}")]
    UnknownIndicator { indicator: String },

    /// Community order has no raster in the catalog
    #[error("unknown community order {order}")]
    UnknownCommunityOrder { order: String },

    /// Basin grade is not one of I to V
    #[error("unknown basin grade {grade}")]
    UnknownBasinGrade { grade: String },

    /// Indicator does not publish the requested kind of series
    #[error("indicator {indicator} has no {series} series")]
    UnsupportedSeries {
        indicator: &'static str,
        series: &'static str,
    },

    /// Document fields do not match the expected model
    #[error("document {id} is malformed")]
    MalformedDocument {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Upstream service answered with an error status
    #[error("{service} responded with status {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// Upstream service answered with a body we could not decode
    #[error("failed to decode {service} response")]
    UpstreamDecode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Upstream response decoded but did not have the expected shape
    #[error("unexpected {service} result: {detail}")]
    UnexpectedResult {
        service: &'static str,
        detail: String,
    },

    /// Error sending a request to an upstream service
    #[error("error sending request to upstream service")]
    HttpRequest(#[from] reqwest::Error),

    /// Error listing objects in object storage
    #[error("error listing objects in object storage")]
    ObjectStoreList(#[from] SdkError<ListObjectsV2Error>),

    /// Error obtaining an OAuth access token
    #[error("failed to obtain an access token: {message}")]
    AccessToken { message: String },

    /// Unreadable or invalid service account credentials
    #[error("failed to load credentials from {path}: {message}")]
    Credentials { path: String, message: String },

    /// A concurrent upstream call panicked or was cancelled
    #[error("concurrent task failed")]
    TaskJoin(#[from] JoinError),
}

impl IntoResponse for PastizalesError {
    /// Convert from a `PastizalesError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 401 unauthorised ErrorResponse
    fn unauthorised<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// Return a 502 bad gateway ErrorResponse
    fn bad_gateway<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_GATEWAY, error)
    }
}

impl From<PastizalesError> for ErrorResponse {
    /// Convert from a `PastizalesError` into an `ErrorResponse`.
    fn from(error: PastizalesError) -> Self {
        let response = match &error {
            // Bad request
            PastizalesError::RequestDataJsonRejection(_)
            | PastizalesError::RequestDataValidationSingle(_)
            | PastizalesError::RequestDataValidation(_)
            | PastizalesError::QueryRejection(_)
            | PastizalesError::InvalidYear { year: _ }
            | PastizalesError::UnsupportedSeries {
                indicator: _,
                series: _,
            } => Self::bad_request(&error),

            // Not found
            PastizalesError::DocumentNotFound {
                collection: _,
                id: _,
            }
            | PastizalesError::CommunityOrderNotFound { order: _ }
            | PastizalesError::UnknownMapType { map_type: _ }
            | PastizalesError::UnknownIndicator { indicator: _ }
            | PastizalesError::UnknownCommunityOrder { order: _ }
            | PastizalesError::UnknownBasinGrade { grade: _ } => Self::not_found(&error),

            // Bad gateway
            PastizalesError::MalformedDocument { id: _, source: _ }
            | PastizalesError::Upstream {
                service: _,
                status: _,
                message: _,
            }
            | PastizalesError::UpstreamDecode {
                service: _,
                source: _,
            }
            | PastizalesError::UnexpectedResult {
                service: _,
                detail: _,
            } => Self::bad_gateway(&error),

            // Internal server error
            PastizalesError::HttpRequest(_)
            | PastizalesError::AccessToken { message: _ }
            | PastizalesError::Credentials {
                path: _,
                message: _,
            }
            | PastizalesError::TaskJoin(_) => Self::internal_server_error(&error),

            PastizalesError::ObjectStoreList(sdk_error) => {
                // Tailor the response based on the specific SdkError variant.
                match &sdk_error {
                    // These are generic SdkError variants.
                    // Internal server error
                    SdkError::ConstructionFailure(_)
                    | SdkError::DispatchFailure(_)
                    | SdkError::ResponseError(_)
                    | SdkError::TimeoutError(_) => Self::internal_server_error(&error),

                    // This is a more specific ServiceError variant, with ListObjectsV2Error as the
                    // inner error.
                    SdkError::ServiceError(list_error) => {
                        let list_error = list_error.err();
                        match list_error {
                            ListObjectsV2Error::NoSuchBucket(_) => Self::not_found(&error),

                            // Quite a lot of error cases end up as unhandled. Attempt to determine
                            // the error from the code.
                            _ => match list_error.code() {
                                Some("NoSuchBucket") => Self::not_found(&error),

                                // Unauthorised
                                Some("InvalidAccessKeyId")
                                | Some("SignatureDoesNotMatch")
                                | Some("AccessDenied") => Self::unauthorised(&error),

                                // Internal server error
                                _ => Self::internal_server_error(&error),
                            },
                        }
                    }

                    // The enum is marked as non-exhaustive
                    _ => Self::internal_server_error(&error),
                }
            }
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aws_sdk_s3::types::error::NoSuchBucket;
    use aws_smithy_runtime_api::http::Response as SmithyResponse;
    use aws_smithy_runtime_api::http::StatusCode as SmithyStatusCode;
    use aws_smithy_types::error::ErrorMetadata as SmithyError;
    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_pastizales_error(
        error: PastizalesError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn request_data_validation_single() {
        let validation_error = validator::ValidationError::new("foo");
        let error = PastizalesError::RequestDataValidationSingle(validation_error);
        let message = "request data is not valid";
        let caused_by = Some(vec!["Validation error: foo [{}]"]);
        test_pastizales_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_data_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = PastizalesError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_pastizales_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn invalid_year() {
        let error = PastizalesError::InvalidYear {
            year: "abc".to_string(),
        };
        test_pastizales_error(error, StatusCode::BAD_REQUEST, "invalid year abc", None).await;
    }

    #[tokio::test]
    async fn unsupported_series() {
        let error = PastizalesError::UnsupportedSeries {
            indicator: "iose",
            series: "annual",
        };
        let message = "indicator iose has no annual series";
        test_pastizales_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn document_not_found() {
        let error = PastizalesError::DocumentNotFound {
            collection: "species".to_string(),
            id: "foo".to_string(),
        };
        let message = "document foo not found in species";
        test_pastizales_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn community_order_not_found() {
        let error = PastizalesError::CommunityOrderNotFound {
            order: "IX".to_string(),
        };
        let message = "no community found with order IX";
        test_pastizales_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn unknown_map_type() {
        let error = PastizalesError::UnknownMapType {
            map_type: "foo".to_string(),
        };
        test_pastizales_error(error, StatusCode::NOT_FOUND, "unknown map type foo", None).await;
    }

    #[tokio::test]
    async fn unknown_indicator() {
        let error = PastizalesError::UnknownIndicator {
            indicator: "foo".to_string(),
        };
        test_pastizales_error(error, StatusCode::NOT_FOUND, "unknown indicator foo", None).await;
    }

    #[tokio::test]
    async fn malformed_document() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let error = PastizalesError::MalformedDocument {
            id: "foo".to_string(),
            source,
        };
        let response = error.into_response();
        assert_eq!(StatusCode::BAD_GATEWAY, response.status());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!("document foo is malformed", error_response.error.message);
        let caused_by = error_response.error.caused_by.unwrap();
        assert!(caused_by[0].starts_with("invalid type: string \"x\", expected u32"));
    }

    #[tokio::test]
    async fn upstream() {
        let error = PastizalesError::Upstream {
            service: "earth engine",
            status: 429,
            message: "quota exceeded".to_string(),
        };
        let message = "earth engine responded with status 429: quota exceeded";
        test_pastizales_error(error, StatusCode::BAD_GATEWAY, message, None).await;
    }

    #[tokio::test]
    async fn access_token() {
        let error = PastizalesError::AccessToken {
            message: "metadata server unreachable".to_string(),
        };
        let message = "failed to obtain an access token: metadata server unreachable";
        test_pastizales_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn credentials() {
        let error = PastizalesError::Credentials {
            path: "/etc/pastizales/key.json".to_string(),
            message: "missing field `private_key`".to_string(),
        };
        let message =
            "failed to load credentials from /etc/pastizales/key.json: missing field `private_key`";
        test_pastizales_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn task_join() {
        let handle = tokio::spawn(async { panic!("boom") });
        let error = PastizalesError::TaskJoin(handle.await.unwrap_err());
        let response = error.into_response();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());
    }

    // Helper function for S3 ListObjectsV2Error errors
    async fn test_object_store_list_error(
        sdk_error: SdkError<ListObjectsV2Error>,
        status: StatusCode,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let error = PastizalesError::ObjectStoreList(sdk_error);
        let message = "error listing objects in object storage";
        test_pastizales_error(error, status, message, caused_by).await;
    }

    fn get_smithy_response() -> SmithyResponse {
        let sdk_body = "body";
        let status: SmithyStatusCode = 400.try_into().unwrap();
        SmithyResponse::new(status, sdk_body.into())
    }

    #[tokio::test]
    async fn object_store_no_such_bucket() {
        // Jump through hoops to create an SdkError.
        let no_such_bucket = NoSuchBucket::builder().build();
        let list_error = ListObjectsV2Error::NoSuchBucket(no_such_bucket);
        let sdk_error = SdkError::service_error(list_error, get_smithy_response());
        let caused_by = Some(vec!["service error", "NoSuchBucket"]);
        test_object_store_list_error(sdk_error, StatusCode::NOT_FOUND, caused_by).await;
    }

    #[tokio::test]
    async fn object_store_access_denied() {
        // Jump through hoops to create an SdkError.
        let smithy_error = SmithyError::builder()
            .message("fake smithy error")
            .code("AccessDenied")
            .build();
        let list_error = ListObjectsV2Error::generic(smithy_error);
        let sdk_error = SdkError::service_error(list_error, get_smithy_response());
        let caused_by = Some(vec![
            "service error",
            "unhandled error (AccessDenied)",
            "Error { code: \"AccessDenied\", message: \"fake smithy error\" }",
        ]);
        test_object_store_list_error(sdk_error, StatusCode::UNAUTHORIZED, caused_by).await;
    }

    #[tokio::test]
    async fn object_store_internal_error() {
        // Jump through hoops to create an SdkError.
        let smithy_error = SmithyError::builder()
            .message("fake smithy error")
            .code("InternalError")
            .build();
        let list_error = ListObjectsV2Error::generic(smithy_error);
        let sdk_error = SdkError::service_error(list_error, get_smithy_response());
        let caused_by = Some(vec![
            "service error",
            "unhandled error (InternalError)",
            "Error { code: \"InternalError\", message: \"fake smithy error\" }",
        ]);
        test_object_store_list_error(sdk_error, StatusCode::INTERNAL_SERVER_ERROR, caused_by)
            .await;
    }
}
