//! HttpExecutionTrigger - executor への HTTP 通知
//!
//! `POST {base}/executor`、`Authorization: Bearer <token>`、body は `{"job_id": ...}`。
//!
//! # タイムアウトはエラーではない
//! 呼び出しがタイムアウトで打ち切られても、ジョブはサーバー側で走り続けている前提です。
//! 結果は `TriggerOutcome::TimedOut` として成功扱いで返し、完了はポーリングで確認します。

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::config::TriggerConfig;
use crate::domain::JobId;
use crate::error::OrchestratorError;
use crate::ports::{ExecutionTrigger, SessionProvider, TriggerOutcome};

#[derive(Debug, Serialize)]
struct TriggerRequest {
    job_id: JobId,
}

pub struct HttpExecutionTrigger<P> {
    client: Client,
    config: TriggerConfig,
    session: P,
}

impl<P: SessionProvider> HttpExecutionTrigger<P> {
    pub fn new(config: TriggerConfig, session: P) -> Self {
        Self::with_client(Client::new(), config, session)
    }

    /// Share a connection pool with the rest of the app.
    pub fn with_client(client: Client, config: TriggerConfig, session: P) -> Self {
        Self {
            client,
            config,
            session,
        }
    }
}

#[async_trait]
impl<P: SessionProvider> ExecutionTrigger for HttpExecutionTrigger<P> {
    async fn trigger(&self, job_id: JobId) -> Result<TriggerOutcome, OrchestratorError> {
        let token = self
            .session
            .access_token()
            .await
            .filter(|t| !t.is_empty())
            .ok_or(OrchestratorError::Auth)?;
        let url = format!("{}/executor", self.config.endpoint.resolve()?);

        debug!(%job_id, %url, "triggering executor");
        let sent = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&TriggerRequest { job_id })
            .timeout(self.config.timeout)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                info!(
                    %job_id,
                    timeout = ?self.config.timeout,
                    "executor trigger timed out, job assumed running"
                );
                return Ok(TriggerOutcome::TimedOut);
            }
            Err(e) => {
                warn!(%job_id, error = %e, "executor trigger failed");
                return Err(OrchestratorError::Transport {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(%job_id, status = status.as_u16(), "executor accepted job");
            return Ok(TriggerOutcome::Accepted);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                info!(%job_id, "executor error body timed out, job assumed running");
                return Ok(TriggerOutcome::TimedOut);
            }
            Err(e) => e.to_string(),
        };

        if status == StatusCode::UNAUTHORIZED && mentions_invalid_token(&body) {
            warn!(%job_id, "executor rejected session token");
            return Err(OrchestratorError::Reauthenticate);
        }

        warn!(%job_id, status = status.as_u16(), %body, "executor returned error status");
        Err(OrchestratorError::Transport {
            status: Some(status.as_u16()),
            message: body,
        })
    }
}

fn mentions_invalid_token(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("invalid token")
        || body.contains("invalid jwt")
        || body.contains("jwt expired")
        || body.contains("token expired")
}
