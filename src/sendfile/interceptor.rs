//! The X-Sendfile response interceptor.
//!
//! # Responsibilities
//! - Decorate the real response writer for exactly one request
//! - Decide, on the first status/body/flush call, whether the response passes
//!   through or is hijacked by a delivery adapter
//! - Swallow everything the application writes after a hijack
//!
//! # State Machine
//! ```text
//! Pending ──write_header(!=200)──────────────▶ Decided(PassThrough)
//!    │    ──write_header(200), no signal─────▶ Decided(PassThrough)
//!    │    ──write_header(200), X-Sendfile────▶ Decided(HijackFile)
//!    │    ──write_header(200), blob signal───▶ Decided(HijackBlob)
//!    └─── write / write_body / flush act as write_header(200)
//! ```
//! Any call made once decided never re-enters the decision.
//!
//! # Design Decisions
//! - Only `200 OK` is eligible for hijack; errors and redirects reach the
//!   client untouched
//! - The decision itself is synchronous; only adapter work is awaited
//! - The real writer is borrowed and never outlived

use std::io;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
};

use crate::delivery::RequestHead;
use crate::observability::metrics;
use crate::sendfile::registry::{DeliveryKind, DeliverySpec};
use crate::sendfile::{Dispatcher, ResponseWriter};

/// Terminal outcome of the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    PassThrough,
    HijackFile,
    HijackBlob,
}

impl Decision {
    fn label(self) -> &'static str {
        match self {
            Decision::PassThrough => "pass_through",
            Decision::HijackFile => "file",
            Decision::HijackBlob => "blob",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Decided(Decision),
}

/// What `write_header` has to do after the decision ran.
enum Step {
    Ignore,
    Forward(StatusCode),
    Deliver(DeliverySpec),
}

/// Response writer decorator that diverts signalled `200` responses.
pub struct ResponseInterceptor<'a> {
    writer: &'a mut dyn ResponseWriter,
    request: &'a RequestHead,
    dispatcher: &'a Dispatcher,
    status: Option<StatusCode>,
    state: State,
}

impl<'a> ResponseInterceptor<'a> {
    pub fn new(
        writer: &'a mut dyn ResponseWriter,
        request: &'a RequestHead,
        dispatcher: &'a Dispatcher,
    ) -> Self {
        Self {
            writer,
            request,
            dispatcher,
            status: None,
            state: State::Pending,
        }
    }

    /// Status the application declared, once decided.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn decision(&self) -> Option<Decision> {
        match self.state {
            State::Pending => None,
            State::Decided(decision) => Some(decision),
        }
    }

    pub fn is_hijacked(&self) -> bool {
        matches!(
            self.state,
            State::Decided(Decision::HijackFile | Decision::HijackBlob)
        )
    }

    fn decide(&mut self, status: StatusCode) -> Step {
        if self.state != State::Pending {
            return Step::Ignore;
        }
        self.status = Some(status);

        if status != StatusCode::OK {
            self.settle(Decision::PassThrough);
            return Step::Forward(status);
        }

        let dispatcher = self.dispatcher;
        let registry = dispatcher.registry();
        let headers = self.writer.headers_mut();
        match registry.resolve(headers).map(|(_, spec)| spec) {
            Some(spec) => {
                registry.strip(headers);
                self.settle(match spec.kind {
                    DeliveryKind::File => Decision::HijackFile,
                    DeliveryKind::Blob(_) => Decision::HijackBlob,
                });
                Step::Deliver(spec)
            }
            None => {
                if dispatcher.strips_unmatched() {
                    registry.strip(headers);
                }
                self.settle(Decision::PassThrough);
                Step::Forward(status)
            }
        }
    }

    fn settle(&mut self, decision: Decision) {
        self.state = State::Decided(decision);
        metrics::record_decision(decision.label());
        tracing::debug!(
            decision = decision.label(),
            method = %self.request.method,
            uri = %self.request.uri,
            "Response decided"
        );
    }
}

#[async_trait]
impl<'a> ResponseWriter for ResponseInterceptor<'a> {
    fn headers(&self) -> &HeaderMap {
        self.writer.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    async fn write_header(&mut self, status: StatusCode) {
        match self.decide(status) {
            Step::Ignore => {}
            Step::Forward(status) => self.writer.write_header(status).await,
            Step::Deliver(spec) => {
                self.dispatcher
                    .dispatch(spec, &mut *self.writer, self.request)
                    .await
            }
        }
    }

    async fn write(&mut self, data: Bytes) -> io::Result<usize> {
        if self.state == State::Pending {
            self.write_header(StatusCode::OK).await;
        }
        if self.is_hijacked() {
            return Ok(0);
        }
        self.writer.write(data).await
    }

    async fn write_body(&mut self, body: Body) -> io::Result<()> {
        if self.state == State::Pending {
            self.write_header(StatusCode::OK).await;
        }
        if self.is_hijacked() {
            return Ok(());
        }
        self.writer.write_body(body).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        if self.state == State::Pending {
            self.write_header(StatusCode::OK).await;
        }
        if self.is_hijacked() {
            return Ok(());
        }
        self.writer.flush().await
    }
}
