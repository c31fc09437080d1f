//! Per-request transaction binding.
//!
//! Every request runs inside exactly one database transaction. Its fate is
//! decided by the final response status, not by whether a handler returned
//! an error: some handlers signal failure purely through the status code,
//! so commit/rollback cannot key off error returns alone.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ErrorBody;

/// The transaction bound to the current request, shared through request
/// extensions.
///
/// Repositories lock it for the duration of each query. The middleware
/// takes it back after the handler finishes to commit or roll back; a
/// request that finds no transaction bound is a wiring bug, surfaced as an
/// internal error rather than a panic.
#[derive(Clone)]
pub struct RequestTx(Arc<Mutex<Option<Transaction<'static, Postgres>>>>);

impl RequestTx {
    fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self(Arc::new(Mutex::new(Some(tx))))
    }

    /// Locks the slot for query execution.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.0.lock().await
    }

    async fn take(&self) -> Option<Transaction<'static, Postgres>> {
        self.0.lock().await.take()
    }
}

/// Returns true if a response with this status should commit the request's
/// transaction. Anything outside `[200, 400)` rolls back.
#[must_use]
pub fn commit_on(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

/// Terminal transaction operations, abstracted so settlement is testable
/// without a live database.
trait Settle {
    async fn commit(self) -> Result<(), sqlx::Error>;
    async fn rollback(self) -> Result<(), sqlx::Error>;
}

impl<'a> Settle for Transaction<'a, Postgres> {
    async fn commit(self) -> Result<(), sqlx::Error> {
        Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Transaction::rollback(self).await
    }
}

/// Settles the transaction from the response status.
///
/// A rollback is silent; the response already carries the real error. A
/// commit failure becomes a 500, since the handler's writes were lost.
async fn settle<T: Settle>(tx: T, res: Response) -> Response {
    if commit_on(res.status()) {
        if let Err(err) = tx.commit().await {
            tracing::error!(error = %err, status = %res.status(), "transaction commit failed");
            return internal_error();
        }
        res
    } else {
        if let Err(err) = tx.rollback().await {
            tracing::warn!(error = %err, status = %res.status(), "transaction rollback failed");
        }
        res
    }
}

/// Wraps the request in a transaction and settles it from the response
/// status.
pub async fn tx_middleware(State(pool): State<PgPool>, mut req: Request, next: Next) -> Response {
    let tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(error = %err, "failed to begin request transaction");
            return internal_error();
        }
    };

    let request_tx = RequestTx::new(tx);
    req.extensions_mut().insert(request_tx.clone());

    let res = next.run(req).await;

    let Some(tx) = request_tx.take().await else {
        // A handler took ownership; nothing left to settle.
        return res;
    };

    settle(tx, res).await
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "internal server error".to_string(),
        }),
    )
        .into_response()
}
