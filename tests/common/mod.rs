//! Shared fixtures for integration tests: in-memory ledger and catalog, and a
//! gateway that replays scripted responses.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use clinic_payments::config::GatewayEnvironment;
use clinic_payments::gateway::types::{
    ConfirmPayload, GatewayPaymentLink, GatewayTransaction, GatewayVoid, PaymentLinkPayload,
    TransactionPayload, VoidPayload,
};
use clinic_payments::gateway::{GatewayClient, GatewayError, GatewayResult, LoggingGateway};
use clinic_payments::models::catalog::{Package, User};
use clinic_payments::models::payment_transaction::{
    NewPaymentTransaction, PaymentTransaction, StatusChange, StatusUpdate, TransactionStatus,
    Transition,
};
use clinic_payments::models::payment_webhook::{
    NewPaymentWebhook, PaymentWebhook, WebhookStatus, WebhookUpdate,
};
use clinic_payments::models::purchase::{FailedAttempt, NewPurchase, Purchase, PurchaseStatus};
use clinic_payments::services::catalog::Catalog;
use clinic_payments::services::ledger::{LedgerError, LedgerStore};
use clinic_payments::services::webhook_service::compute_signature;
use clinic_payments::state::{AppState, PaymentSettings};

pub const TEST_SECRET: &str = "test_events_secret_123";
pub const PROVIDER: &str = "wompi";

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LedgerData {
    pub purchases: Vec<Purchase>,
    pub transactions: Vec<PaymentTransaction>,
    pub webhooks: Vec<PaymentWebhook>,
}

/// `LedgerStore` over a mutex; the lock stands in for the row locks.
#[derive(Default)]
pub struct MemoryLedger {
    data: Mutex<LedgerData>,
}

impl MemoryLedger {
    pub fn snapshot(&self) -> LedgerData {
        self.data.lock().unwrap().clone()
    }

    pub fn purchase(&self, id: Uuid) -> Purchase {
        self.snapshot()
            .purchases
            .into_iter()
            .find(|p| p.id == id)
            .expect("purchase exists")
    }

    pub fn transaction(&self, gateway_id: &str) -> Option<PaymentTransaction> {
        self.snapshot()
            .transactions
            .into_iter()
            .find(|t| t.gateway_transaction_id.as_deref() == Some(gateway_id))
    }

    pub fn webhook(&self, id: Uuid) -> PaymentWebhook {
        self.snapshot()
            .webhooks
            .into_iter()
            .find(|w| w.id == id)
            .expect("webhook exists")
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn create_purchase(&self, purchase: NewPurchase) -> Result<Purchase, LedgerError> {
        let now = Utc::now();
        let row = Purchase {
            id: Uuid::new_v4(),
            user_id: purchase.user_id,
            customer_email: purchase.customer_email,
            package_id: purchase.package_id,
            amount_in_cents: purchase.amount_in_cents,
            currency: purchase.currency,
            payment_status: PurchaseStatus::Pending,
            payment_method: purchase.payment_method,
            transaction_reference: None,
            payment_link_id: None,
            payment_details: purchase.payment_details,
            created_at: now,
            updated_at: now,
            expires_at: purchase.expires_at,
        };
        self.data.lock().unwrap().purchases.push(row.clone());
        Ok(row)
    }

    async fn record_failed_attempt(
        &self,
        purchase_id: Uuid,
        attempt: FailedAttempt,
    ) -> Result<(), LedgerError> {
        let attempt = serde_json::to_value(attempt)?;
        let mut data = self.data.lock().unwrap();
        let purchase = data
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .ok_or(LedgerError::NotFound("purchase"))?;

        if !purchase.payment_details.is_object() {
            purchase.payment_details = json!({});
        }
        let attempts = purchase
            .payment_details
            .as_object_mut()
            .unwrap()
            .entry("attempts")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = attempts {
            items.push(attempt);
        }
        purchase.updated_at = Utc::now();
        Ok(())
    }

    async fn attach_payment_link(
        &self,
        purchase_id: Uuid,
        payment_link_id: &str,
    ) -> Result<(), LedgerError> {
        let mut data = self.data.lock().unwrap();
        let purchase = data
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .ok_or(LedgerError::NotFound("purchase"))?;
        purchase.payment_link_id = Some(payment_link_id.to_string());
        Ok(())
    }

    async fn find_purchase_by_payment_link(
        &self,
        payment_link_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .purchases
            .iter()
            .find(|p| p.payment_link_id.as_deref() == Some(payment_link_id))
            .cloned())
    }

    async fn record_transaction(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, LedgerError> {
        let mut data = self.data.lock().unwrap();
        if let Some(existing) = data.transactions.iter().find(|t| {
            t.provider == transaction.provider
                && t.gateway_transaction_id.as_deref()
                    == Some(transaction.gateway_transaction_id.as_str())
        }) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let row = PaymentTransaction {
            id: Uuid::new_v4(),
            purchase_id: transaction.purchase_id,
            gateway_transaction_id: Some(transaction.gateway_transaction_id),
            provider: transaction.provider,
            reference: transaction.reference,
            amount_in_cents: transaction.amount_in_cents,
            currency: transaction.currency,
            payment_method: transaction.payment_method,
            status: TransactionStatus::Pending,
            gateway_response: transaction.gateway_response,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        data.transactions.push(row.clone());
        Ok(row)
    }

    async fn find_transaction_by_gateway_id(
        &self,
        provider: &str,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, LedgerError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|t| {
                t.provider == provider
                    && t.gateway_transaction_id.as_deref() == Some(gateway_transaction_id)
            })
            .cloned())
    }

    async fn apply_transaction_status(
        &self,
        transaction_id: Uuid,
        update: StatusUpdate,
    ) -> Result<StatusChange, LedgerError> {
        let mut data = self.data.lock().unwrap();
        let now = Utc::now();

        let tx = data
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or(LedgerError::NotFound("payment transaction"))?;

        let current = tx.status;
        let requested = update.transaction_status;

        match Transition::between(current, requested) {
            Transition::Same => {
                tx.updated_at = now;
                return Ok(StatusChange::Unchanged(current));
            }
            Transition::Invalid => return Ok(StatusChange::Rejected { current, requested }),
            Transition::Advance => {}
        }

        tx.status = requested;
        tx.updated_at = now;
        if update.payment_method.is_some() {
            tx.payment_method = update.payment_method.clone();
        }
        if update.gateway_response.is_some() {
            tx.gateway_response = update.gateway_response.clone();
        }
        if requested == TransactionStatus::Completed {
            tx.completed_at = Some(now);
        }
        let purchase_id = tx.purchase_id;
        let gateway_id = tx.gateway_transaction_id.clone();

        let purchase = data
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .ok_or(LedgerError::NotFound("purchase"))?;

        let purchase_status = if purchase.payment_status.can_move_to(update.purchase_status) {
            purchase.payment_status = update.purchase_status;
            purchase.updated_at = now;
            if update.payment_method.is_some() {
                purchase.payment_method = update.payment_method;
            }
            if gateway_id.is_some() {
                purchase.transaction_reference = gateway_id;
            }
            Some(update.purchase_status)
        } else {
            None
        };

        Ok(StatusChange::Applied {
            previous: current,
            current: requested,
            purchase_status,
        })
    }

    async fn insert_webhook(
        &self,
        webhook: NewPaymentWebhook,
    ) -> Result<PaymentWebhook, LedgerError> {
        let row = PaymentWebhook {
            id: Uuid::new_v4(),
            transaction_id: None,
            gateway_transaction_id: webhook.gateway_transaction_id,
            provider: webhook.provider,
            event_type: webhook.event_type,
            payload: webhook.payload,
            signature: webhook.signature,
            status: WebhookStatus::Received,
            received_at: Utc::now(),
            processed_at: None,
            error_message: None,
        };
        self.data.lock().unwrap().webhooks.push(row.clone());
        Ok(row)
    }

    async fn update_webhook(
        &self,
        webhook_id: Uuid,
        update: WebhookUpdate,
    ) -> Result<(), LedgerError> {
        let mut data = self.data.lock().unwrap();
        let webhook = data
            .webhooks
            .iter_mut()
            .find(|w| w.id == webhook_id)
            .ok_or(LedgerError::NotFound("payment webhook"))?;

        webhook.status = update.status;
        if update.transaction_id.is_some() {
            webhook.transaction_id = update.transaction_id;
        }
        webhook.error_message = update.error_message;
        if update.status.is_final() {
            webhook.processed_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    pub users: Vec<User>,
    pub packages: Vec<Package>,
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_package(&self, package_id: Uuid) -> Result<Option<Package>, LedgerError> {
        Ok(self.packages.iter().find(|p| p.id == package_id).cloned())
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Replays queued responses in order. An empty queue answers with a
/// transport error so unexpected calls fail loudly.
#[derive(Default)]
pub struct ScriptedGateway {
    transactions: Mutex<VecDeque<GatewayResult<GatewayTransaction>>>,
    links: Mutex<VecDeque<GatewayResult<GatewayPaymentLink>>>,
    lookups: Mutex<VecDeque<GatewayResult<GatewayTransaction>>>,
    voids: Mutex<VecDeque<GatewayResult<GatewayVoid>>>,
    /// References sent to `create_transaction`, in call order
    pub references: Mutex<Vec<String>>,
    pub link_payloads: Mutex<Vec<PaymentLinkPayload>>,
    /// Transaction ids sent to confirm and status lookups
    pub lookup_ids: Mutex<Vec<String>>,
    pub void_requests: Mutex<Vec<(String, VoidPayload)>>,
}

impl ScriptedGateway {
    pub fn push_transaction(&self, result: GatewayResult<GatewayTransaction>) {
        self.transactions.lock().unwrap().push_back(result);
    }

    pub fn push_link(&self, result: GatewayResult<GatewayPaymentLink>) {
        self.links.lock().unwrap().push_back(result);
    }

    /// Response for the next confirm or status lookup.
    pub fn push_lookup(&self, result: GatewayResult<GatewayTransaction>) {
        self.lookups.lock().unwrap().push_back(result);
    }

    pub fn push_void(&self, result: GatewayResult<GatewayVoid>) {
        self.voids.lock().unwrap().push_back(result);
    }

    pub fn transaction_calls(&self) -> usize {
        self.references.lock().unwrap().len()
    }

    fn next<T>(queue: &Mutex<VecDeque<GatewayResult<T>>>) -> GatewayResult<T> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted response".to_string())))
    }
}

#[async_trait]
impl GatewayClient for ScriptedGateway {
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> GatewayResult<GatewayTransaction> {
        self.references
            .lock()
            .unwrap()
            .push(payload.reference.clone());
        Self::next(&self.transactions).map(|mut tx| {
            tx.reference.get_or_insert_with(|| payload.reference.clone());
            tx
        })
    }

    async fn create_payment_link(
        &self,
        payload: &PaymentLinkPayload,
    ) -> GatewayResult<GatewayPaymentLink> {
        self.link_payloads.lock().unwrap().push(payload.clone());
        Self::next(&self.links)
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        _payload: &ConfirmPayload,
    ) -> GatewayResult<GatewayTransaction> {
        self.lookup_ids.lock().unwrap().push(transaction_id.to_string());
        Self::next(&self.lookups)
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<GatewayTransaction> {
        self.lookup_ids.lock().unwrap().push(transaction_id.to_string());
        Self::next(&self.lookups)
    }

    async fn void_transaction(
        &self,
        transaction_id: &str,
        payload: &VoidPayload,
    ) -> GatewayResult<GatewayVoid> {
        self.void_requests
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), payload.clone()));
        Self::next(&self.voids)
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn gateway_tx(id: &str, status: &str) -> GatewayTransaction {
    serde_json::from_value(json!({
        "id": id,
        "status": status,
        "amount_in_cents": 15_000_000,
        "currency": "COP",
        "payment_method_type": "CARD",
    }))
    .unwrap()
}

pub fn validation_error(field: &str, message: &str) -> GatewayError {
    let mut messages = std::collections::BTreeMap::new();
    messages.insert(field.to_string(), vec![message.to_string()]);
    GatewayError::Validation {
        message: "La referencia ya fue usada".to_string(),
        messages,
    }
}

/// Event body as the gateway would post it.
pub fn event_body(event: &str, transaction: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": event,
        "data": { "transaction": transaction },
        "environment": "test",
        "sent_at": "2025-01-14T16:17:05.000Z",
    }))
    .unwrap()
}

pub fn sign(body: &[u8]) -> String {
    compute_signature(TEST_SECRET, body)
}

pub struct TestApp {
    pub state: AppState,
    pub ledger: Arc<MemoryLedger>,
    pub gateway: Arc<ScriptedGateway>,
    pub user: User,
    pub package: Package,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_secret(Some(TEST_SECRET))
    }

    pub fn with_secret(secret: Option<&str>) -> Self {
        let user = User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            full_name: "Ana Pérez".to_string(),
            phone_number: Some("3001234567".to_string()),
        };
        let package = Package {
            id: Uuid::new_v4(),
            name: "Plan Fisioterapia 10 sesiones".to_string(),
            price_in_cents: 15_000_000,
            currency: "COP".to_string(),
            validity_days: 90,
        };

        let ledger = Arc::new(MemoryLedger::default());
        let gateway = Arc::new(ScriptedGateway::default());
        let catalog = MemoryCatalog {
            users: vec![user.clone()],
            packages: vec![package.clone()],
        };

        let state = AppState {
            gateway: Arc::new(LoggingGateway::new(gateway.clone())),
            ledger: ledger.clone(),
            catalog: Arc::new(catalog),
            settings: Arc::new(PaymentSettings {
                provider: PROVIDER.to_string(),
                public_key: "pub_test_abc123".to_string(),
                environment: GatewayEnvironment::Sandbox,
                events_secret: secret.map(str::to_string),
                checkout_url: "https://checkout.wompi.co/l/".to_string(),
                redirect_url: None,
            }),
        };

        Self {
            state,
            ledger,
            gateway,
            user,
            package,
        }
    }

    /// A valid card transaction request for the test user and package.
    pub fn transaction_request(&self, amount_in_cents: i64) -> Value {
        json!({
            "amount_in_cents": amount_in_cents,
            "currency": "COP",
            "package_id": self.package.id,
            "user_id": self.user.id,
            "payment_method": { "type": "CARD", "token": "tok_test_4242", "installments": 1 },
            "customer": { "email": "Ana@Example.com", "full_name": "Ana Pérez" },
            "acceptance_token": "acc_tok_test",
        })
    }
}
