//! In-memory client/server loop for exercising the full payment flow.
//!
//! Wires a real `PaymentResponder` (with a real EIP-712 signing wallet)
//! behind a `SessionPeer`, and a real `SessionHandlers` behind the client's
//! `RecordingSender`, so a test drives exactly the traffic a live session
//! would carry.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use s402::BoxFuture;
use s402::facilitator::{
    Facilitator, FacilitatorError, SettleOutcome, StaticFacilitator, VerifyOutcome,
};
use s402::pricing::Pricer;
use s402::proto::{
    METHOD_PAYMENT_REQUIRED, METHOD_PAYMENT_RESULT, PaymentPayload, PaymentRequirements,
    PaymentResult,
};
use s402::session::{
    OutboundNotification, OutboundRequest, RpcErrorObject, RpcSender, SessionError, SessionPeer,
};
use s402::wallet::Wallet;
use s402_client::{AuditLedger, Guardrails, PaymentResponder, RecordingSender};
use s402_evm::{PrivateKeyWallet, UsdcPricer};
use s402_server::{
    GateConfig, HandlerArgs, HandlerDescriptor, HandlerRegistry, HandlerSet, InvocationContext,
    PaymentGate, PaymentOptions, SessionHandlers,
};

pub const PAY_TO: &str = "0x1111111111111111111111111111111111111111";
pub const NETWORK: &str = "base-sepolia";

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Counts facilitator calls around a scripted inner facilitator.
pub struct CountingFacilitator {
    inner: StaticFacilitator,
    pub verify_calls: AtomicUsize,
    pub settle_calls: AtomicUsize,
}

impl CountingFacilitator {
    pub fn new(inner: StaticFacilitator) -> Self {
        Self {
            inner,
            verify_calls: AtomicUsize::new(0),
            settle_calls: AtomicUsize::new(0),
        }
    }

    pub fn verified(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn settled(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }
}

impl Facilitator for CountingFacilitator {
    fn verify_proof<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyOutcome, FacilitatorError>> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_proof(payload, requirements)
    }

    fn execute_settlement<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleOutcome, FacilitatorError>> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_settlement(payload, requirements)
    }
}

/// The client end of the loop, as the server sees it.
pub struct ClientPeer {
    responder: Option<PaymentResponder>,
    pub notifications: Mutex<Vec<PaymentResult>>,
}

impl SessionPeer for ClientPeer {
    fn send_request<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> BoxFuture<'a, Result<Value, SessionError>> {
        Box::pin(async move {
            let extension_aware = self.responder.as_ref();
            match extension_aware {
                Some(responder) if request.method == METHOD_PAYMENT_REQUIRED => responder
                    .handle_payment_required(request.params)
                    .await
                    .map_err(|err| SessionError::Rpc(err.to_rpc_error())),
                _ => Err(SessionError::Rpc(RpcErrorObject {
                    code: -32601,
                    message: "Method not found".into(),
                    data: None,
                })),
            }
        })
    }

    fn send_notification<'a>(
        &'a self,
        notification: OutboundNotification,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            if notification.method == METHOD_PAYMENT_RESULT {
                if let Ok(result) =
                    serde_json::from_value::<PaymentResult>(notification.params.clone())
                {
                    self.notifications.lock().unwrap().push(result);
                }
                if let Some(responder) = &self.responder {
                    responder.handle_payment_result(notification.params);
                }
            }
            Ok(())
        })
    }
}

/// The server end of the loop, as the client's transport sees it.
pub struct ServerSender {
    handlers: SessionHandlers,
    peer: Arc<ClientPeer>,
    cancellation: CancellationToken,
}

impl RpcSender for ServerSender {
    fn send<'a>(&'a self, message: Value) -> BoxFuture<'a, Result<Value, SessionError>> {
        Box::pin(async move {
            let id = serde_json::from_value(message["id"].clone())
                .map_err(|e| SessionError::Transport(format!("bad id: {e}")))?;
            if message["method"].as_str() != Some("tools/call") {
                return Err(SessionError::Rpc(RpcErrorObject {
                    code: -32601,
                    message: "Method not found".into(),
                    data: None,
                }));
            }
            let name = message["params"]["name"].as_str().unwrap_or_default();
            let arguments = message["params"].get("arguments").cloned();
            let Some(handler) = self.handlers.tool(name) else {
                return Err(SessionError::Rpc(RpcErrorObject {
                    code: -32601,
                    message: format!("Unknown tool: {name}"),
                    data: None,
                }));
            };
            let ctx = InvocationContext::new(
                id,
                Arc::clone(&self.peer) as Arc<dyn SessionPeer>,
                self.cancellation.clone(),
            );
            handler
                .invoke(HandlerArgs::Tool { arguments }, ctx)
                .await
                .map_err(|err| SessionError::Rpc(err.to_rpc_error()))
        })
    }
}

/// One wired-up client/server pair.
pub struct Bench {
    pub client: RecordingSender<ServerSender>,
    pub peer: Arc<ClientPeer>,
    pub facilitator: Arc<CountingFacilitator>,
    pub ledger: AuditLedger,
    pub cancellation: CancellationToken,
}

impl Bench {
    pub async fn call_tool(&self, id: i64, name: &str, arguments: Value) -> Result<Value, SessionError> {
        self.client
            .send(serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": { "name": name, "arguments": arguments }
            }))
            .await
    }

    pub fn notifications(&self) -> Vec<PaymentResult> {
        self.peer.notifications.lock().unwrap().clone()
    }
}

pub fn registry(price: rust_decimal::Decimal) -> HandlerRegistry {
    HandlerRegistry::new().with_set(move || {
        HandlerSet::new()
            .with(
                HandlerDescriptor::tool("add-numbers", |args, _ctx| async move {
                    let HandlerArgs::Tool {
                        arguments: Some(arguments),
                    } = args
                    else {
                        return Err("missing arguments".into());
                    };
                    let a = arguments["a"].as_i64().ok_or("missing a")?;
                    let b = arguments["b"].as_i64().ok_or("missing b")?;
                    Ok(Value::from(format!("Result: {}", a + b)))
                })
                .with_payment(PaymentOptions::new(price)),
            )
            .with(
                HandlerDescriptor::tool("boom", |_args, _ctx| async move { Err("boom".into()) })
                    .with_payment(PaymentOptions::new(price)),
            )
            .with(HandlerDescriptor::tool("ping", |_args, _ctx| async move {
                Ok(Value::from("pong"))
            }))
    })
}

pub struct BenchOptions {
    pub facilitator: StaticFacilitator,
    pub guardrails: Guardrails,
    pub extension_aware: bool,
    pub price: rust_decimal::Decimal,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            facilitator: StaticFacilitator::approving("0xabc"),
            guardrails: Guardrails::new().with_max_payment_per_call("0.01".parse().unwrap()),
            extension_aware: true,
            price: "0.001".parse().unwrap(),
        }
    }
}

pub fn bench(options: BenchOptions) -> Bench {
    init_tracing();
    let facilitator = Arc::new(CountingFacilitator::new(options.facilitator));
    let pricer = Arc::new(UsdcPricer);
    let gate = Arc::new(PaymentGate::new(
        Arc::clone(&facilitator) as Arc<dyn Facilitator>,
        Arc::clone(&pricer) as Arc<dyn Pricer>,
        GateConfig::new(PAY_TO, NETWORK)
            .with_base_url(Url::parse("https://api.example.com").unwrap()),
    ));

    let ledger = AuditLedger::in_memory();
    let responder = options.extension_aware.then(|| {
        let wallet = Arc::new(PrivateKeyWallet::random()) as Arc<dyn Wallet>;
        PaymentResponder::builder(wallet, Arc::clone(&pricer) as Arc<dyn Pricer>)
            .ledger(ledger.clone())
            .guardrails(options.guardrails.clone())
            .build()
    });
    let peer = Arc::new(ClientPeer {
        responder,
        notifications: Mutex::new(Vec::new()),
    });

    let handlers = registry(options.price)
        .build_session(&gate)
        .expect("valid registration");
    let cancellation = CancellationToken::new();
    let server = ServerSender {
        handlers,
        peer: Arc::clone(&peer),
        cancellation: cancellation.clone(),
    };
    let client = RecordingSender::new(server, ledger.clone(), "https://api.example.com");

    Bench {
        client,
        peer,
        facilitator,
        ledger,
        cancellation,
    }
}
