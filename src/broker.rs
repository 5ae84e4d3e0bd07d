//! Broker adapter contract (§6, "Broker adapter (consumed)"). The engine is
//! written against this trait; a real exchange client (REST/WS, order
//! signing, rate-limit backoff) is an external collaborator out of scope
//! here (§1).

use crate::error::EngineError;
use crate::types::Order;

/// Opaque exchange-assigned order identifier.
pub type OrderId = String;

pub trait BrokerAdapter {
    /// Submit an order for placement. May no-op in dry-run.
    fn submit_order(&mut self, order: &Order) -> Result<OrderId, EngineError>;

    /// Cancel a previously submitted order.
    fn cancel_order(&mut self, order_id: &OrderId) -> Result<(), EngineError>;

    /// Notify the adapter that the engine inferred a fill from price-crossing
    /// (§4.2), so it can reconcile against the exchange's own fill record.
    fn fill_notification(&mut self, order_id: &OrderId, fill_price: f64) -> Result<(), EngineError>;

    /// Current account balance in USD, queried at setup time for sizing.
    fn balance(&self) -> Result<f64, EngineError>;
}

/// A broker that always succeeds and never actually places anything —
/// useful for unit tests that drive the engine purely off price-crossing
/// fill inference (§4.2) and don't care about adapter round-trips.
#[derive(Clone, Debug, Default)]
pub struct NullBroker {
    pub fixed_balance: f64,
    next_id: u64,
}

impl NullBroker {
    pub fn new(fixed_balance: f64) -> Self {
        NullBroker { fixed_balance, next_id: 0 }
    }
}

impl BrokerAdapter for NullBroker {
    fn submit_order(&mut self, _order: &Order) -> Result<OrderId, EngineError> {
        self.next_id += 1;
        Ok(format!("null-{}", self.next_id))
    }

    fn cancel_order(&mut self, _order_id: &OrderId) -> Result<(), EngineError> {
        Ok(())
    }

    fn fill_notification(&mut self, _order_id: &OrderId, _fill_price: f64) -> Result<(), EngineError> {
        Ok(())
    }

    fn balance(&self) -> Result<f64, EngineError> {
        Ok(self.fixed_balance)
    }
}
