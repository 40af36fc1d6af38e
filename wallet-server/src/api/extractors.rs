//! Custom Axum extractors for request authentication and bodies.
//!
//! Token validation happens in the gateway in front of this service. It
//! forwards the authenticated account id in the `X-Account-Id` header,
//! which [`AuthenticatedAccount`] reads back.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::request::Parts,
};
use uuid::Uuid;
use wallet_sdk::ACCOUNT_ID_HEADER;

use super::ApiError;

/// The account on whose behalf the request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .ok_or(ApiError::MissingAccount)?
            .to_str()
            .map_err(|_| ApiError::InvalidAccount)?;

        let account_id = Uuid::parse_str(value.trim()).map_err(|_| ApiError::InvalidAccount)?;
        Ok(AuthenticatedAccount(account_id))
    }
}

/// A JSON request body whose rejection uses the API error envelope.
///
/// Any body that does not bind (bad JSON, wrong field types, missing
/// content type) is answered like a non-positive amount.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Request body rejected");
            ApiError::InvalidAmount
        })?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use wallet_sdk::objects::TopUpRequest;

    async fn extract(header: Option<&str>) -> Result<AuthenticatedAccount, ApiError> {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACCOUNT_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedAccount::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        let id = Uuid::now_v7();
        let account = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(account, AuthenticatedAccount(id));
    }

    #[tokio::test]
    async fn test_missing_header() {
        assert!(matches!(extract(None).await, Err(ApiError::MissingAccount)));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(ApiError::InvalidAccount)
        ));
    }

    async fn body(content_type: Option<&str>, raw: &str) -> Result<JsonBody<TopUpRequest>, ApiError> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(value) = content_type {
            builder = builder.header(header::CONTENT_TYPE, value);
        }
        let request = builder.body(Body::from(raw.to_string())).unwrap();
        JsonBody::<TopUpRequest>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_json_body_binds() {
        let JsonBody(request) = body(Some("application/json"), r#"{"amount":5}"#)
            .await
            .unwrap();
        assert_eq!(request.amount, 5);
    }

    #[tokio::test]
    async fn test_unbindable_body_is_invalid_amount() {
        for (content_type, raw) in [
            (Some("application/json"), r#"{"amount":"abc"}"#),
            (Some("application/json"), "{"),
            (Some("application/json"), "{}"),
            (None, r#"{"amount":5}"#),
        ] {
            assert!(
                matches!(body(content_type, raw).await, Err(ApiError::InvalidAmount)),
                "{raw}"
            );
        }
    }
}
