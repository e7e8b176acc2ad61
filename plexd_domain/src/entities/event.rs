// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Event Envelope
//!
//! The transport-level record handed to event handlers. Envelope signature
//! verification happens upstream in the transport layer; by the time a
//! handler sees an envelope, the payload is trusted bytes.

/// Event type carried by action execution requests.
pub const EVENT_TYPE_ACTION_REQUEST: &str = "action.request";

/// A delivered event: type tag, id, and opaque JSON payload.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub payload: Vec<u8>,
}

impl EventEnvelope {
    pub fn new(event_id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            payload,
        }
    }
}
