//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .nest("/api/v1", api::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    serve(listener, router, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::WalletRuntime;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;
    use wallet_core::config::SettlementConfig;
    use wallet_core::entities::Account;
    use wallet_core::store::{LedgerStore, MemoryLedger, SharedLedger};
    use wallet_sdk::ACCOUNT_ID_HEADER;
    use wallet_sdk::client::{ClientError, WalletClient};
    use wallet_sdk::objects::TransactionStatus;

    struct TestApp {
        router: Router,
        runtime: WalletRuntime,
        memory: MemoryLedger,
        a: Uuid,
        t: Uuid,
    }

    async fn test_app() -> TestApp {
        let a = Uuid::now_v7();
        let t = Uuid::now_v7();
        let memory =
            MemoryLedger::with_accounts([Account::open(a, 1000), Account::open(t, 500)]).await;
        let ledger: SharedLedger = Arc::new(memory.clone());
        let runtime = WalletRuntime::start(ledger, &SettlementConfig::default())
            .await
            .unwrap();
        TestApp {
            router: build_router(runtime.state.clone()),
            runtime,
            memory,
            a,
            t,
        }
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        account: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(account) = account {
            builder = builder.header(ACCOUNT_ID_HEADER, account.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn balance(memory: &MemoryLedger, id: Uuid) -> i64 {
        memory.get_account(id).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = call(&app.router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_topup_returns_envelope() {
        let app = test_app().await;
        let (status, body) = call(
            &app.router,
            "POST",
            "/api/v1/topup",
            Some(app.a),
            Some(json!({ "amount": 200 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["result"]["amount"], 200);
        assert_eq!(body["result"]["balance_before"], 1000);
        assert_eq!(body["result"]["balance_after"], 1200);
        assert_eq!(body["result"]["status"], "success");
        assert_eq!(balance(&app.memory, app.a).await, 1200);
        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_bad_request() {
        let app = test_app().await;
        for (uri, body) in [
            ("/api/v1/topup", json!({ "amount": 0 })),
            ("/api/v1/pay", json!({ "amount": -5, "remarks": "x" })),
            (
                "/api/v1/transfer",
                json!({ "target_user": app.t, "amount": 0, "remarks": "" }),
            ),
        ] {
            let (status, body) = call(&app.router, "POST", uri, Some(app.a), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["message"], "invalid amount");
        }
        assert_eq!(balance(&app.memory, app.a).await, 1000);
        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unbindable_body_is_bad_request_envelope() {
        let app = test_app().await;
        for (uri, body) in [
            ("/api/v1/topup", json!({ "amount": "abc" })),
            ("/api/v1/topup", json!({})),
            ("/api/v1/pay", json!({ "amount": 1.5, "remarks": "x" })),
            (
                "/api/v1/transfer",
                json!({ "target_user": "nobody", "amount": 10, "remarks": "" }),
            ),
        ] {
            let (status, response) = call(&app.router, "POST", uri, Some(app.a), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(response["message"], "invalid amount");
        }
        assert_eq!(balance(&app.memory, app.a).await, 1000);
        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_account_header_is_unauthorized() {
        let app = test_app().await;
        let (status, _) = call(&app.router, "GET", "/api/v1/transactions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = test_app().await;

        let (status, _) = call(
            &app.router,
            "POST",
            "/api/v1/pay",
            Some(app.a),
            Some(json!({ "amount": 5000, "remarks": "too much" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app.router,
            "POST",
            "/api/v1/transfer",
            Some(app.a),
            Some(json!({ "target_user": app.a, "amount": 10, "remarks": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(
            &app.router,
            "POST",
            "/api/v1/transfer",
            Some(app.a),
            Some(json!({ "target_user": Uuid::now_v7(), "amount": 10, "remarks": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app.router,
            "POST",
            "/api/v1/topup",
            Some(Uuid::now_v7()),
            Some(json!({ "amount": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_transfer_is_pending_then_settles() {
        let app = test_app().await;
        let (status, body) = call(
            &app.router,
            "POST",
            "/api/v1/transfer",
            Some(app.a),
            Some(json!({ "target_user": app.t, "amount": 300, "remarks": "rent" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["status"], "pending");
        assert_eq!(body["result"]["balance_after"], 700);
        let id = body["result"]["transaction_id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/transactions/{id}");
        let mut settled = false;
        for _ in 0..200 {
            let (_, body) = call(&app.router, "GET", &uri, Some(app.a), None).await;
            if body["result"]["status"] == "success" {
                assert_eq!(body["result"]["transaction_type"], "CREDIT");
                assert_eq!(body["result"]["remarks"], "rent");
                settled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(settled);
        assert_eq!(balance(&app.memory, app.a).await, 700);
        assert_eq!(balance(&app.memory, app.t).await, 800);

        // Another account cannot see the record.
        let (status, _) = call(&app.router, "GET", &uri, Some(app.t), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_history_lists_oldest_first() {
        let app = test_app().await;
        call(
            &app.router,
            "POST",
            "/api/v1/topup",
            Some(app.a),
            Some(json!({ "amount": 50 })),
        )
        .await;
        call(
            &app.router,
            "POST",
            "/api/v1/pay",
            Some(app.a),
            Some(json!({ "amount": 20, "remarks": "coffee" })),
        )
        .await;

        let (status, body) =
            call(&app.router, "GET", "/api/v1/transactions", Some(app.a), None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["result"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["transaction_type"], "DEBIT");
        assert_eq!(items[0]["remarks"], "topup");
        assert_eq!(items[1]["transaction_type"], "CREDIT");
        assert_eq!(items[1]["remarks"], "coffee");
        assert_eq!(items[1]["balance_after"], 1030);

        app.runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_sdk_client_against_live_server() {
        let app = test_app().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, app.router.clone(), async move {
            let _ = stop_rx.await;
        }));

        let base = url::Url::parse(&format!("http://{addr}")).unwrap();
        let client = WalletClient::new(base, app.a);

        let top_up = client.top_up(200).await.unwrap();
        assert_eq!(top_up.balance_after, 1200);

        let transfer = client.transfer(app.t, 300, "split").await.unwrap();
        assert_eq!(transfer.status, TransactionStatus::Pending);
        assert_eq!(transfer.balance_after, 900);

        let mut settled = false;
        for _ in 0..200 {
            let details = client.get_transaction(transfer.transaction_id).await.unwrap();
            if details.status == TransactionStatus::Success {
                settled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(settled);

        let err = client.pay(5000, "").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api { status, .. } if status.as_u16() == 422
        ));

        let history = client.list_transactions().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(balance(&app.memory, app.a).await, 900);
        assert_eq!(balance(&app.memory, app.t).await, 800);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        app.runtime.shutdown().await;
    }
}
