//! Payment provider boundary.
//!
//! The external provider is a black-box session service: the engine
//! creates a session carrying reconstruction metadata, the payer
//! completes it out of band, and confirmation reads the session state
//! back. Provider internals are out of scope.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::money::Money;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider rejected the request
    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    /// Unknown session id
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A created checkout session.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub session_id: String,
    /// Where the payer completes the charge.
    pub checkout_url: String,
}

/// Session state read back at confirmation time.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub paid: bool,
    pub amount_paid: Money,
    /// The metadata the session was created with, verbatim.
    pub metadata: Value,
}

/// External payment provider boundary.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session carrying `metadata`.
    async fn create_session(
        &self,
        amount: Money,
        currency: &str,
        metadata: Value,
    ) -> ProviderResult<ProviderSession>;

    /// Fetch a session's current state.
    async fn get_session(&self, session_id: &str) -> ProviderResult<SessionState>;
}

#[derive(Debug, Clone)]
struct MockSession {
    amount: Money,
    paid: bool,
    metadata: Value,
}

/// In-memory provider for tests and embedded use. Sessions start
/// unpaid; [`MockPaymentProvider::mark_paid`] simulates the payer
/// completing checkout.
#[derive(Default)]
pub struct MockPaymentProvider {
    sessions: Mutex<HashMap<String, MockSession>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the payer completing the session.
    pub async fn mark_paid(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.paid = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_session(
        &self,
        amount: Money,
        _currency: &str,
        metadata: Value,
    ) -> ProviderResult<ProviderSession> {
        if amount <= 0 {
            return Err(ProviderError::Rejected(format!(
                "non-positive amount {amount}"
            )));
        }
        let session_id = format!("cs_{}", Uuid::new_v4().simple());
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_id.clone(),
            MockSession {
                amount,
                paid: false,
                metadata,
            },
        );
        Ok(ProviderSession {
            checkout_url: format!("https://pay.invalid/session/{session_id}"),
            session_id,
        })
    }

    async fn get_session(&self, session_id: &str) -> ProviderResult<SessionState> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| ProviderError::UnknownSession(session_id.to_string()))?;
        Ok(SessionState {
            paid: session.paid,
            amount_paid: if session.paid { session.amount } else { 0 },
            metadata: session.metadata.clone(),
        })
    }
}
