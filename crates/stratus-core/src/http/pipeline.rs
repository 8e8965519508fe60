//! Ordered policy chain terminated by a transport.
//!
//! Built once per client and shared (`Arc<Pipeline>`) by every request and every
//! chunk worker; configuration is read-only after `build`. Ownership is a
//! strict tree: the pipeline owns its policies and its transport.

use std::sync::Arc;

use super::policies::{LoggingPolicy, PerRetryPolicy, RequestIdPolicy, TelemetryPolicy};
use super::request::Request;
use super::response::Response;
use super::transport::{CurlTransport, Transport};
use crate::context::Context;
use crate::error::Result;
use crate::retry::{RetryOptions, RetryPolicy};

/// One node of the chain. A policy may mutate the request, call `next`
/// (any number of times), inspect or replace the response, or convert an error
/// coming from downstream.
pub trait Policy: Send + Sync {
    fn send(&self, ctx: &Context, request: &mut Request<'_>, next: Next<'_>) -> Result<Response>;
}

/// The remainder of the chain after the current policy.
#[derive(Clone, Copy)]
pub struct Next<'p> {
    policies: &'p [Arc<dyn Policy>],
    transport: &'p dyn Transport,
}

impl<'p> Next<'p> {
    pub fn send(self, ctx: &Context, request: &mut Request<'_>) -> Result<Response> {
        match self.policies.split_first() {
            Some((policy, rest)) => policy.send(
                ctx,
                request,
                Next {
                    policies: rest,
                    transport: self.transport,
                },
            ),
            None => self.transport.send(ctx, request),
        }
    }
}

pub struct Pipeline {
    policies: Vec<Arc<dyn Policy>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Pipeline with default policies, the given retry options and transport.
    pub fn new(retry: RetryOptions, transport: Arc<dyn Transport>) -> Self {
        Self::builder().retry_options(retry).transport(transport).build()
    }

    pub fn send(&self, ctx: &Context, request: &mut Request<'_>) -> Result<Response> {
        Next {
            policies: &self.policies,
            transport: self.transport.as_ref(),
        }
        .send(ctx, request)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Assembles `[telemetry, request id, per-operation..., retry, per-retry...,
/// date stamp, logging] -> transport`.
///
/// Policies before the retry policy run once per logical send; policies after
/// it run once per attempt.
#[derive(Default)]
pub struct PipelineBuilder {
    retry: RetryOptions,
    application_id: Option<String>,
    per_operation: Vec<Arc<dyn Policy>>,
    per_retry: Vec<Arc<dyn Policy>>,
    transport: Option<Arc<dyn Transport>>,
}

impl PipelineBuilder {
    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Prefix for the User-Agent header.
    pub fn application_id(mut self, id: impl Into<String>) -> Self {
        self.application_id = Some(id.into());
        self
    }

    pub fn per_operation_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_operation.push(policy);
        self
    }

    pub fn per_retry_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.per_retry.push(policy);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Pipeline {
        let mut policies: Vec<Arc<dyn Policy>> =
            Vec::with_capacity(6 + self.per_operation.len() + self.per_retry.len());
        policies.push(Arc::new(TelemetryPolicy::new(self.application_id.as_deref())));
        policies.push(Arc::new(RequestIdPolicy));
        policies.extend(self.per_operation);
        policies.push(Arc::new(RetryPolicy::new(self.retry)));
        policies.extend(self.per_retry);
        policies.push(Arc::new(PerRetryPolicy));
        policies.push(Arc::new(LoggingPolicy));
        Pipeline {
            policies,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(CurlTransport::default())),
        }
    }
}
