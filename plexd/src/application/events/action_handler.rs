// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Action Event Handler
//!
//! Adapts a transport envelope carrying an action request into an
//! executor call.
//!
//! The handler parses the envelope payload, validates the execution id,
//! fast-rejects when the executor is disabled, and otherwise delegates to
//! [`ActionExecutor::execute`]. It never blocks on execution completion.
//! Malformed payloads propagate a parse error so the transport layer can
//! surface its own diagnostics; everything after admission is reported
//! through the reporter, not the return value.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use plexd_domain::entities::{ActionRequest, EventEnvelope, ExecutionAck, RejectReason};
use plexd_domain::services::Reporter;
use plexd_domain::AgentError;

use crate::infrastructure::executor::ActionExecutor;

/// Handles `action.request` events from the controller.
pub struct ActionEventHandler {
    executor: ActionExecutor,
    reporter: Arc<dyn Reporter>,
}

impl ActionEventHandler {
    pub fn new(executor: ActionExecutor, reporter: Arc<dyn Reporter>) -> Self {
        Self { executor, reporter }
    }

    /// Parses the envelope payload and hands the request to the
    /// executor.
    ///
    /// Returns an error only for unusable payloads (malformed JSON,
    /// missing execution id); admission outcomes travel through acks.
    pub async fn handle(
        &self,
        parent: &CancellationToken,
        node_id: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), AgentError> {
        let request: ActionRequest = serde_json::from_slice(&envelope.payload)?;

        if request.execution_id.is_empty() {
            return Err(AgentError::validation_error(format!(
                "event {}: execution_id is required",
                envelope.event_id
            )));
        }

        debug!(
            event_id = %envelope.event_id,
            execution_id = %request.execution_id,
            action = %request.action,
            "action request received"
        );

        if !self.executor.enabled() {
            let ack = ExecutionAck::rejected(&request.execution_id, RejectReason::ActionsDisabled);
            if let Err(e) = self
                .reporter
                .ack_execution(node_id, &request.execution_id, ack)
                .await
            {
                warn!(execution_id = %request.execution_id, error = %e, "failed to send execution ack");
            }
            return Ok(());
        }

        self.executor.execute(parent, node_id, request).await;
        Ok(())
    }
}
