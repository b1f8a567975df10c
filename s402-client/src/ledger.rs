//! The RPC audit ledger.
//!
//! Every outgoing RPC gets a record at `pending:<id>` the moment it is
//! sent. Records stay in the `pending:` namespace only while both the
//! request and any embedded payment are unresolved, so that namespace is
//! always the worklist of live invocations; any record that progresses past
//! that state is rekeyed to the bare `<id>` and the pending entry deleted.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use s402::error::PaymentError;
use s402::session::RequestId;
use s402::timestamp::UnixTimestamp;

use crate::store::{KvStore, MemoryStore};

/// How long records are retained by default.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const PENDING_PREFIX: &str = "pending:";

/// Lifecycle of the request itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Sent, response outstanding.
    Pending,
    /// Response received.
    Completed,
    /// Send failed terminally.
    Failed,
}

/// Lifecycle of the payment embedded in a request, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// No payment concluded yet.
    Pending,
    /// Settlement confirmed.
    Completed,
    /// Payment refused or settlement failed.
    Failed,
}

/// One audited RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Id of the RPC.
    pub request_id: RequestId,
    /// Identity of the server the RPC went to.
    pub server_id: String,
    /// Method name.
    pub method: String,
    /// Params, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request lifecycle state.
    pub request_status: RequestStatus,
    /// Payment lifecycle state.
    pub payment_status: PaymentStatus,
    /// Insertion time.
    pub created_at: UnixTimestamp,
    /// When the response arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_completed_at: Option<UnixTimestamp>,
    /// When the payment reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_completed_at: Option<UnixTimestamp>,
    /// Settlement transaction hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Paying address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_address: Option<String>,
    /// Why the request or payment failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Demanded amount in priced units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<Decimal>,
    /// Network the payment was demanded on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_network: Option<String>,
    /// Token the payment was demanded in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_asset: Option<String>,
    /// Demanded recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_pay_to: Option<String>,
}

/// Insertion parameters for [`AuditLedger::store_pending`].
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Id of the outgoing RPC.
    pub request_id: RequestId,
    /// Identity of the target server.
    pub server_id: String,
    /// Method name.
    pub method: String,
    /// Params, if worth retaining.
    pub params: Option<Value>,
    /// Known payment amount, when the caller already expects a charge.
    pub payment_amount: Option<Decimal>,
    /// Known payment network.
    pub payment_network: Option<String>,
    /// Known payment asset.
    pub payment_asset: Option<String>,
    /// Known payment recipient.
    pub payment_pay_to: Option<String>,
}

impl PendingRequest {
    /// Creates the minimal insertion record.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        server_id: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            server_id: server_id.into(),
            method: method.into(),
            params: None,
            payment_amount: None,
            payment_network: None,
            payment_asset: None,
            payment_pay_to: None,
        }
    }

    /// Attaches the request params.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Payment terms learned when a challenge arrives.
#[derive(Debug, Clone)]
pub struct PaymentTerms {
    /// Demanded amount in priced units.
    pub amount: Decimal,
    /// Network of the demand.
    pub network: String,
    /// Token of the demand.
    pub asset: String,
    /// Demanded recipient.
    pub pay_to: String,
}

/// Field updates applied by [`AuditLedger::update_payment_status`].
#[derive(Debug, Clone, Default)]
pub struct PaymentUpdate {
    /// Settlement transaction hash.
    pub tx_hash: Option<String>,
    /// Paying address.
    pub payer: Option<String>,
    /// Failure reason.
    pub error_reason: Option<String>,
    /// Completion time override; defaults to now for terminal statuses.
    pub when: Option<UnixTimestamp>,
}

/// Where a record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Final,
}

/// Audit trail of outgoing RPCs, backed by a [`KvStore`].
#[derive(Clone)]
pub struct AuditLedger {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl AuditLedger {
    /// Creates a ledger over the given store with [`DEFAULT_RECORD_TTL`].
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_RECORD_TTL,
        }
    }

    /// Creates a ledger over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Overrides the record TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Inserts a record for a just-sent RPC under `pending:<id>`.
    ///
    /// # Errors
    ///
    /// Rejects an empty request id with `-32600`.
    pub fn store_pending(&self, request: PendingRequest) -> Result<(), PaymentError> {
        if request.request_id.is_empty() {
            return Err(PaymentError::invalid_request("request id must not be empty"));
        }
        let record = AuditRecord {
            request_id: request.request_id.clone(),
            server_id: request.server_id,
            method: request.method,
            params: request.params,
            request_status: RequestStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: UnixTimestamp::now(),
            request_completed_at: None,
            payment_completed_at: None,
            tx_hash: None,
            payer_address: None,
            error_reason: None,
            payment_amount: request.payment_amount,
            payment_network: request.payment_network,
            payment_asset: request.payment_asset,
            payment_pay_to: request.payment_pay_to,
        };
        self.write(&pending_key(&request.request_id), &record);
        Ok(())
    }

    /// Reads the record still in the pending namespace, if any.
    #[must_use]
    pub fn pending(&self, id: &RequestId) -> Option<AuditRecord> {
        self.read(&pending_key(id))
    }

    /// Reads the record wherever it currently lives.
    #[must_use]
    pub fn find(&self, id: &RequestId) -> Option<AuditRecord> {
        self.locate(id).map(|(record, _)| record)
    }

    /// Marks the request half of the record completed and moves it out of
    /// the pending namespace.
    pub fn mark_request_completed(&self, id: &RequestId, when: Option<UnixTimestamp>) {
        let Some((mut record, slot)) = self.locate(id) else {
            tracing::debug!(id = %id, "request completion for unknown record");
            return;
        };
        record.request_status = RequestStatus::Completed;
        record.request_completed_at = Some(when.unwrap_or_else(UnixTimestamp::now));
        self.write(&final_key(id), &record);
        if slot == Slot::Pending {
            self.store.delete(&pending_key(id));
        }
    }

    /// Applies a payment status change.
    ///
    /// Terminal statuses rekey the record to `<id>` and delete the pending
    /// entry; a `pending` status leaves the record where it was found.
    pub fn update_payment_status(
        &self,
        id: &RequestId,
        status: PaymentStatus,
        update: PaymentUpdate,
    ) {
        let Some((mut record, slot)) = self.locate(id) else {
            tracing::debug!(id = %id, "payment update for unknown record");
            return;
        };
        record.payment_status = status;
        if let Some(tx_hash) = update.tx_hash {
            record.tx_hash = Some(tx_hash);
        }
        if let Some(payer) = update.payer {
            record.payer_address = Some(payer);
        }
        if let Some(reason) = update.error_reason {
            record.error_reason = Some(reason);
        }
        if status == PaymentStatus::Pending {
            let key = match slot {
                Slot::Pending => pending_key(id),
                Slot::Final => final_key(id),
            };
            self.write(&key, &record);
        } else {
            record.payment_completed_at = Some(update.when.unwrap_or_else(UnixTimestamp::now));
            self.write(&final_key(id), &record);
            if slot == Slot::Pending {
                self.store.delete(&pending_key(id));
            }
        }
    }

    /// Records what a payment challenge demanded, wherever the record lives.
    pub fn record_payment_terms(&self, id: &RequestId, terms: &PaymentTerms) {
        let Some((mut record, slot)) = self.locate(id) else {
            return;
        };
        record.payment_amount = Some(terms.amount);
        record.payment_network = Some(terms.network.clone());
        record.payment_asset = Some(terms.asset.clone());
        record.payment_pay_to = Some(terms.pay_to.clone());
        let key = match slot {
            Slot::Pending => pending_key(id),
            Slot::Final => final_key(id),
        };
        self.write(&key, &record);
    }

    /// Deletes the rekeyed record under `<id>`.
    pub fn remove(&self, id: &RequestId) {
        self.store.delete(&final_key(id));
    }

    fn locate(&self, id: &RequestId) -> Option<(AuditRecord, Slot)> {
        if let Some(record) = self.read(&pending_key(id)) {
            return Some((record, Slot::Pending));
        }
        self.read(&final_key(id)).map(|record| (record, Slot::Final))
    }

    fn read(&self, key: &str) -> Option<AuditRecord> {
        let value = self.store.get(key)?;
        serde_json::from_value(value).ok()
    }

    fn write(&self, key: &str, record: &AuditRecord) {
        match serde_json::to_value(record) {
            Ok(value) => self.store.set(key, value, Some(self.ttl)),
            Err(err) => tracing::warn!(%err, "audit record not serializable"),
        }
    }
}

fn pending_key(id: &RequestId) -> String {
    format!("{PENDING_PREFIX}{id}")
}

fn final_key(id: &RequestId) -> String {
    id.to_string()
}
