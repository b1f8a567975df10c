//! Composes the payment gate around registered handlers.
//!
//! A [`WrappedHandler`] is what the session layer dispatches an inbound RPC
//! to. Free handlers forward straight to the callable; protected handlers
//! run the full verify → execute → settle flow. On every exit path —
//! payment failure, handler failure, settlement failure, or success — the
//! context's payment slot is cleared before the wrapper returns.

use std::sync::Arc;

use serde_json::Value;

use s402::error::PaymentError;

use crate::context::InvocationContext;
use crate::gate::PaymentGate;
use crate::registry::{
    HandlerArgs, HandlerDescriptor, HandlerKind, HandlerRegistry, SessionDescriptors,
};

/// A registered handler bound to the payment gate.
#[derive(Clone)]
pub struct WrappedHandler {
    descriptor: Arc<HandlerDescriptor>,
    gate: Arc<PaymentGate>,
}

impl std::fmt::Debug for WrappedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedHandler")
            .field("name", &self.descriptor.name)
            .field("kind", &self.descriptor.kind)
            .field("protected", &self.descriptor.is_protected())
            .finish()
    }
}

impl WrappedHandler {
    fn new(descriptor: HandlerDescriptor, gate: Arc<PaymentGate>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            gate,
        }
    }

    /// Handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Handler kind.
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        self.descriptor.kind
    }

    /// Declared input schema.
    #[must_use]
    pub fn input_schema(&self) -> Option<&Value> {
        self.descriptor.input_schema.as_ref()
    }

    /// Declared output schema.
    #[must_use]
    pub fn output_schema(&self) -> Option<&Value> {
        self.descriptor.output_schema.as_ref()
    }

    /// Returns `true` when invocations demand payment.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.descriptor.is_protected()
    }

    /// Runs one invocation to completion.
    ///
    /// # Errors
    ///
    /// Payment failures from the gate are returned verbatim; a failing
    /// handler body surfaces as an internal `Handler execution failed: …`
    /// error and suppresses settlement.
    pub async fn invoke(
        &self,
        args: HandlerArgs,
        mut ctx: InvocationContext,
    ) -> Result<Value, PaymentError> {
        if !self.descriptor.is_protected() {
            return run_handler(&self.descriptor, args, &ctx).await;
        }

        if let Err(err) = self.gate.verify(&self.descriptor, &mut ctx).await {
            ctx.clear_payment();
            return Err(err);
        }

        let outcome = run_handler(&self.descriptor, args, &ctx).await;
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                // Handler failed: the verified proof is discarded unsettled.
                ctx.clear_payment();
                return Err(err);
            }
        };

        let settled = self.gate.settle(&mut ctx).await;
        ctx.clear_payment();
        settled?;
        Ok(value)
    }
}

async fn run_handler(
    descriptor: &HandlerDescriptor,
    args: HandlerArgs,
    ctx: &InvocationContext,
) -> Result<Value, PaymentError> {
    (descriptor.callable)(args, ctx).await.map_err(|err| {
        tracing::debug!(handler = %descriptor.name, %err, "handler body failed");
        PaymentError::internal(format!("Handler execution failed: {err}"))
    })
}

/// All handlers of one session, partitioned by kind and bound to the gate.
#[derive(Debug, Default)]
pub struct SessionHandlers {
    /// Tool handlers, in registration order.
    pub tools: Vec<WrappedHandler>,
    /// Prompt handlers.
    pub prompts: Vec<WrappedHandler>,
    /// Resource handlers.
    pub resources: Vec<WrappedHandler>,
    /// Resource-template handlers.
    pub resource_templates: Vec<WrappedHandler>,
}

impl SessionHandlers {
    /// Binds freshly built descriptors to the gate.
    #[must_use]
    pub fn bind(descriptors: SessionDescriptors, gate: &Arc<PaymentGate>) -> Self {
        let wrap_all = |descriptors: Vec<HandlerDescriptor>| {
            descriptors
                .into_iter()
                .map(|d| WrappedHandler::new(d, Arc::clone(gate)))
                .collect()
        };
        Self {
            tools: wrap_all(descriptors.tools),
            prompts: wrap_all(descriptors.prompts),
            resources: wrap_all(descriptors.resources),
            resource_templates: wrap_all(descriptors.resource_templates),
        }
    }

    /// Finds a handler by kind and name.
    #[must_use]
    pub fn find(&self, kind: HandlerKind, name: &str) -> Option<&WrappedHandler> {
        let bucket = match kind {
            HandlerKind::Tool => &self.tools,
            HandlerKind::Prompt => &self.prompts,
            HandlerKind::Resource => &self.resources,
            HandlerKind::ResourceTemplate => &self.resource_templates,
        };
        bucket.iter().find(|h| h.name() == name)
    }

    /// Finds a tool handler by name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&WrappedHandler> {
        self.find(HandlerKind::Tool, name)
    }
}

impl HandlerRegistry {
    /// Materializes one session: fresh handler instances, validated and
    /// bound to the payment gate.
    ///
    /// # Errors
    ///
    /// Propagates registration-time configuration failures.
    pub fn build_session(
        &self,
        gate: &Arc<PaymentGate>,
    ) -> Result<SessionHandlers, crate::registry::ConfigError> {
        Ok(SessionHandlers::bind(self.build_descriptors()?, gate))
    }
}
