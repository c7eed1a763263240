// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Supervisor protocol messages.
//!
//! The manager speaks this protocol to supervisors when admitting them
//! (health check) and when removing them (teardown).

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckReply {
    /// `OK` or `FULL` when healthy; anything else is a failure.
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, tag = "2")]
    pub region: String,
    #[prost(string, tag = "3")]
    pub zone: String,
    #[prost(uint32, tag = "4")]
    pub free_containers: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TeardownRequest {
    #[prost(string, repeated, tag = "1")]
    pub containers: Vec<String>,
    /// Tear down every container when set, ignoring `containers`.
    #[prost(bool, tag = "2")]
    pub all: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TeardownReply {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, repeated, tag = "2")]
    pub containers: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SupervisorError {
    #[prost(string, tag = "1")]
    pub code: String,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SupervisorRequest {
    #[prost(oneof = "supervisor_request::Request", tags = "1, 2")]
    pub request: Option<supervisor_request::Request>,
}

pub mod supervisor_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        HealthCheck(super::HealthCheckRequest),
        #[prost(message, tag = "2")]
        Teardown(super::TeardownRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SupervisorResponse {
    #[prost(oneof = "supervisor_response::Response", tags = "1, 2, 3")]
    pub response: Option<supervisor_response::Response>,
}

pub mod supervisor_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Error(super::SupervisorError),
        #[prost(message, tag = "2")]
        HealthCheck(super::HealthCheckReply),
        #[prost(message, tag = "3")]
        Teardown(super::TeardownReply),
    }
}
