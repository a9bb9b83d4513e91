// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use steward_core::{
    ApprovalMode, AuditRecord, ConversationSummary, PendingExecution, StewardError, ToolClass,
    Turn,
};
use steward_engine::{ChatOptions, DecisionOutcome, ToolResultRecord};

use crate::server::GatewayState;

/// Request body for POST /v1/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User message text.
    pub message: String,
    /// Continue an existing conversation when present.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Approval mode: "strict", "normal" (default), or "auto".
    #[serde(default)]
    pub approval_mode: Option<String>,
    /// Model identifier override.
    #[serde(default)]
    pub model: Option<String>,
}

/// Response body for POST /v1/chat.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub response_text: String,
    /// "completed" or "approval_required".
    pub status: String,
    pub tool_uses: Vec<steward_core::ToolCall>,
    pub tool_results: Vec<ToolResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<PendingExecution>,
    pub iterations: u32,
}

/// Request body for POST /v1/approve.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub execution_id: String,
    pub approved: bool,
    /// Identity recorded as the approver; defaults to "operator".
    #[serde(default)]
    pub approver: Option<String>,
}

/// Response body for POST /v1/approve.
#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub execution_id: String,
    /// "success", "rejected", or the terminal status of an idempotent re-send.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Populated when the resumed turn suspended behind another gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<PendingExecution>,
}

/// One catalog entry in GET /v1/tools.
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub class: ToolClass,
}

/// Query parameters for GET /v1/executions/history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps a core error to an HTTP response.
fn error_response(e: StewardError) -> Response {
    let status = match &e {
        StewardError::BadParams { .. } | StewardError::BadModel { .. } => StatusCode::BAD_REQUEST,
        StewardError::NotFound(_) => StatusCode::NOT_FOUND,
        StewardError::ConversationBusy { .. } | StewardError::AlreadyDecided { .. } => {
            StatusCode::CONFLICT
        }
        StewardError::Unreachable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %e, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// POST /v1/chat
pub async fn post_chat(
    State(state): State<GatewayState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let approval_mode = match body.approval_mode.as_deref() {
        None => ApprovalMode::Normal,
        Some(raw) => match ApprovalMode::from_str(raw) {
            Ok(mode) => mode,
            Err(_) => {
                return error_response(StewardError::BadParams {
                    detail: format!("approval_mode must be strict, normal, or auto (got {raw})"),
                })
            }
        },
    };

    let options = ChatOptions {
        approval_mode,
        model: body.model,
    };
    match state
        .agent
        .chat(body.conversation_id, &body.message, &options)
        .await
    {
        Ok(outcome) => {
            let status = if outcome.pending_execution.is_some() {
                "approval_required"
            } else {
                "completed"
            };
            Json(ChatResponse {
                conversation_id: outcome.conversation_id,
                response_text: outcome.response_text,
                status: status.to_string(),
                tool_uses: outcome.tool_uses,
                tool_results: outcome.tool_results,
                execution: outcome.pending_execution,
                iterations: outcome.iterations,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /v1/approve
pub async fn post_approve(
    State(state): State<GatewayState>,
    Json(body): Json<ApproveRequest>,
) -> Response {
    let approver = body.approver.as_deref().unwrap_or("operator");
    match state
        .agent
        .decide(&body.execution_id, body.approved, approver)
        .await
    {
        Ok(DecisionOutcome::Approved(outcome)) => Json(ApproveResponse {
            execution_id: body.execution_id,
            status: "success".to_string(),
            response_text: Some(outcome.response_text),
            result: None,
            execution: outcome.pending_execution,
        })
        .into_response(),
        Ok(DecisionOutcome::Rejected(outcome)) => Json(ApproveResponse {
            execution_id: body.execution_id,
            status: "rejected".to_string(),
            response_text: Some(outcome.response_text),
            result: None,
            execution: outcome.pending_execution,
        })
        .into_response(),
        Ok(DecisionOutcome::Idempotent { status, result, .. }) => Json(ApproveResponse {
            execution_id: body.execution_id,
            status: status.to_string(),
            response_text: None,
            result,
            execution: None,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/conversations
pub async fn get_conversations(State(state): State<GatewayState>) -> Response {
    match state.agent.list_conversations().await {
        Ok(conversations) => Json(ConversationListResponse { conversations }).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// GET /v1/conversations/{id}
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.agent.load_conversation(&id).await {
        Ok(conversation) => Json(ConversationResponse {
            conversation_id: conversation.id,
            title: conversation.title,
            messages: conversation.turns,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub title: String,
    pub messages: Vec<Turn>,
}

/// DELETE /v1/conversations/{id}
pub async fn delete_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.agent.delete_conversation(&id).await {
        Ok(()) => Json(serde_json::json!({"deleted": id})).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /v1/executions/pending
pub async fn get_pending(State(state): State<GatewayState>) -> Response {
    match state.agent.list_pending().await {
        Ok(pending) => Json(PendingListResponse {
            count: pending.len(),
            pending,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub pending: Vec<PendingExecution>,
    pub count: usize,
}

/// GET /v1/executions/history
pub async fn get_history(
    State(state): State<GatewayState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.agent.history(query.limit).await {
        Ok(history) => Json(HistoryResponse {
            count: history.len(),
            history,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<AuditRecord>,
    pub count: usize,
}

/// GET /v1/tools
pub async fn get_tools(State(state): State<GatewayState>) -> Response {
    let tools: Vec<ToolInfo> = state
        .agent
        .tools()
        .into_iter()
        .map(|spec| ToolInfo {
            name: spec.name,
            description: spec.description,
            schema: spec.input_schema,
            class: spec.class,
        })
        .collect();
    Json(ToolListResponse {
        total: tools.len(),
        tools,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
    pub total: usize,
}

/// GET /health (public)
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}
