//! Handler registration and per-session materialization.
//!
//! Handlers are registered explicitly: a [`HandlerDescriptor`] names the
//! callable, its kind, its schemas, and — for protected handlers — its
//! price. Descriptors are grouped into [`HandlerSet`]s, and the
//! [`HandlerRegistry`] holds *factories* for those sets so that each session
//! gets freshly built handler instances and per-session mutable state cannot
//! leak across sessions.

use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;

use s402::BoxFuture;

use crate::context::InvocationContext;

/// Type-erased failure of a handler body.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The four kinds of registrable handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// A callable tool.
    Tool,
    /// A prompt template.
    Prompt,
    /// A fixed resource.
    Resource,
    /// A parameterized resource template.
    ResourceTemplate,
}

impl HandlerKind {
    /// Stable lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
            Self::ResourceTemplate => "resource-template",
        }
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing metadata for a protected handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOptions {
    /// Price per invocation, in priced units (e.g. USDC).
    pub amount: Decimal,
    /// Human-readable description of what the payment buys.
    pub description: Option<String>,
}

impl PaymentOptions {
    /// Prices a handler at `amount` per invocation.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self {
            amount,
            description: None,
        }
    }

    /// Attaches a description carried into the payment requirement.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Arguments delivered to a handler, shaped by its kind.
#[derive(Debug, Clone)]
pub enum HandlerArgs {
    /// Tool invocation arguments (absent when the tool declares no input).
    Tool {
        /// Structured arguments.
        arguments: Option<Value>,
    },
    /// Prompt arguments.
    Prompt {
        /// Structured arguments.
        arguments: Option<Value>,
    },
    /// Resource read.
    Resource {
        /// Resource URI.
        uri: String,
    },
    /// Resource-template read.
    ResourceTemplate {
        /// Expanded URI.
        uri: String,
        /// Template variables.
        variables: HashMap<String, String>,
    },
}

/// Boxed handler callable.
///
/// The closure runs synchronously with the context in scope and returns an
/// owned future; anything the future needs from the context (the request
/// id, a session handle) is cloned out before it is returned. Payment state
/// on the context is not visible to handlers at all.
pub type HandlerCallable = Arc<
    dyn Fn(HandlerArgs, &InvocationContext) -> BoxFuture<'static, Result<Value, HandlerError>>
        + Send
        + Sync,
>;

fn boxed<F, Fut>(callable: F) -> HandlerCallable
where
    F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(move |args, ctx: &InvocationContext| Box::pin(callable(args, ctx)))
}

/// Registration record for one handler.
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// Unique handler name.
    pub name: String,
    /// Handler kind.
    pub kind: HandlerKind,
    /// Declared input schema, if any.
    pub input_schema: Option<Value>,
    /// Declared output schema, if any.
    pub output_schema: Option<Value>,
    /// Pricing; present iff the handler is protected.
    pub payment: Option<PaymentOptions>,
    pub(crate) callable: HandlerCallable,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("payment", &self.payment)
            .finish_non_exhaustive()
    }
}

impl HandlerDescriptor {
    /// Creates a descriptor of the given kind.
    pub fn new<F, Fut>(name: impl Into<String>, kind: HandlerKind, callable: F) -> Self
    where
        F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            input_schema: None,
            output_schema: None,
            payment: None,
            callable: boxed(callable),
        }
    }

    /// Creates a tool descriptor.
    pub fn tool<F, Fut>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::new(name, HandlerKind::Tool, callable)
    }

    /// Creates a prompt descriptor.
    pub fn prompt<F, Fut>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::new(name, HandlerKind::Prompt, callable)
    }

    /// Creates a resource descriptor.
    pub fn resource<F, Fut>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::new(name, HandlerKind::Resource, callable)
    }

    /// Creates a resource-template descriptor.
    pub fn resource_template<F, Fut>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(HandlerArgs, &InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::new(name, HandlerKind::ResourceTemplate, callable)
    }

    /// Declares the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Declares the output schema, echoed in payment requirements.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Marks the handler as protected with the given pricing.
    #[must_use]
    pub fn with_payment(mut self, payment: PaymentOptions) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Returns `true` when the handler demands payment.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.payment.is_some()
    }
}

/// A group of handlers registered together.
///
/// Sets are built inside registry factories, so anything a set's closures
/// capture is created freshly per session.
#[derive(Debug, Default)]
pub struct HandlerSet {
    descriptors: Vec<HandlerDescriptor>,
}

impl HandlerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. Validation happens when a session is built.
    #[must_use]
    pub fn with(mut self, descriptor: HandlerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Adds a descriptor in place.
    pub fn register(&mut self, descriptor: HandlerDescriptor) {
        self.descriptors.push(descriptor);
    }

    fn into_descriptors(self) -> Vec<HandlerDescriptor> {
        self.descriptors
    }
}

/// Registration-time configuration failures.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The same handler name was registered more than once (possibly under
    /// different kinds).
    #[error("handler '{0}' is registered more than once")]
    DuplicateHandler(String),
    /// A protected handler is priced at zero or less.
    #[error("handler '{name}' has a non-positive payment amount: {amount}")]
    NonPositiveAmount {
        /// Offending handler.
        name: String,
        /// Offending amount.
        amount: Decimal,
    },
}

type SetFactory = Arc<dyn Fn() -> HandlerSet + Send + Sync>;

/// Registry of handler-set factories.
///
/// Each call to [`HandlerRegistry::build_session`] runs every factory once,
/// validates the combined result, and partitions it by kind in registration
/// order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: Vec<SetFactory>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("sets", &self.factories.len())
            .finish()
    }
}

/// Descriptors of one session, partitioned by kind.
#[derive(Debug, Default)]
pub struct SessionDescriptors {
    /// Tool handlers, in registration order.
    pub tools: Vec<HandlerDescriptor>,
    /// Prompt handlers.
    pub prompts: Vec<HandlerDescriptor>,
    /// Resource handlers.
    pub resources: Vec<HandlerDescriptor>,
    /// Resource-template handlers.
    pub resource_templates: Vec<HandlerDescriptor>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler-set factory and returns the registry for chaining.
    #[must_use]
    pub fn with_set<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> HandlerSet + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Materializes fresh descriptors for one session.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError`] when a name is registered twice or a
    /// protected handler is priced at zero or less.
    pub fn build_descriptors(&self) -> Result<SessionDescriptors, ConfigError> {
        let mut seen = HashSet::new();
        let mut session = SessionDescriptors::default();
        for factory in &self.factories {
            for descriptor in factory().into_descriptors() {
                if !seen.insert(descriptor.name.clone()) {
                    return Err(ConfigError::DuplicateHandler(descriptor.name));
                }
                if let Some(payment) = &descriptor.payment
                    && payment.amount <= Decimal::ZERO
                {
                    return Err(ConfigError::NonPositiveAmount {
                        name: descriptor.name,
                        amount: payment.amount,
                    });
                }
                match descriptor.kind {
                    HandlerKind::Tool => session.tools.push(descriptor),
                    HandlerKind::Prompt => session.prompts.push(descriptor),
                    HandlerKind::Resource => session.resources.push(descriptor),
                    HandlerKind::ResourceTemplate => session.resource_templates.push(descriptor),
                }
            }
        }
        Ok(session)
    }
}
