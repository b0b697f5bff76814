// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-shot local listener that captures the OAuth redirect.
//!
//! Binds the host and port of the registered redirect URI, serves exactly one
//! callback, and hands back the authorization code it carried.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SyncError};

const SUCCESS_PAGE: &str = "<h1>Authorized. You can close this window.</h1>";
const FAILURE_PAGE: &str = "<h1>Authorization failed. Check the terminal.</h1>";

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

type CallbackSender = mpsc::Sender<Result<String>>;

/// Listener bound to the redirect URI, waiting for the browser.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind to the host and port named in `redirect_uri`.
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = reqwest::Url::parse(redirect_uri)
            .map_err(|e| SyncError::Auth(format!("Invalid redirect URI {redirect_uri}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::Auth(format!("Redirect URI {redirect_uri} has no host")))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            SyncError::Auth(format!("Failed to listen on {host}:{port} for the redirect: {e}"))
        })?;

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| SyncError::Auth(format!("Callback listener has no address: {e}")))
    }

    /// Serve until the redirect arrives and return its authorization code.
    ///
    /// A denied authorization or a redirect without a code is `Auth`.
    pub async fn wait_for_code(self) -> Result<String> {
        let addr = self.local_addr()?;
        let (result_tx, mut result_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(result_tx);

        tracing::info!(address = %addr, path = %self.path, "Waiting for OAuth redirect");
        let server = tokio::spawn(async move {
            axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = result_rx.recv().await;
        let _ = stop_tx.send(());
        if let Ok(Err(e)) = server.await {
            tracing::warn!(error = %e, "Callback listener shut down with an error");
        }

        outcome.unwrap_or_else(|| {
            Err(SyncError::Auth(
                "Callback listener stopped before the redirect arrived".to_string(),
            ))
        })
    }
}

async fn handle_callback(
    State(result_tx): State<CallbackSender>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    let outcome = match (params.code, params.error) {
        (_, Some(error)) => {
            tracing::warn!(error = %error, "OAuth error from Strava");
            Err(SyncError::Auth(format!("Authorization denied: {error}")))
        }
        (Some(code), None) if !code.trim().is_empty() => Ok(code),
        _ => Err(SyncError::Auth(
            "Redirect carried no authorization code".to_string(),
        )),
    };

    let (status, page) = match &outcome {
        Ok(_) => (StatusCode::OK, SUCCESS_PAGE),
        Err(_) => (StatusCode::BAD_REQUEST, FAILURE_PAGE),
    };

    // Only the first redirect counts.
    let _ = result_tx.try_send(outcome);
    (status, Html(page))
}
