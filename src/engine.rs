//! Per-tick dispatcher (§4.5). Owns the candle window, balance, and active
//! positions; strategies are stateless and receive everything by reference.
//! Follows the classic bot main-loop shape (snapshot candles -> manage
//! positions -> look for new entries -> notify), made synchronous and
//! broker-agnostic since network I/O is out of scope here (§1).

use std::collections::HashMap;

use crate::broker::BrokerAdapter;
use crate::candle::CandleWindow;
use crate::config::{SmogParams, TclParams};
use crate::error::EngineError;
use crate::events::{EngineEvent, EngineObserver};
use crate::position::Position;
use crate::strategies::{ManagementAction, SmogStrategy, TclStrategy};
use crate::types::{Candle, OrderStatus, SetupKind, Strategy};

pub struct Engine {
    candles: CandleWindow,
    positions: HashMap<Strategy, Position>,
    tcl: TclStrategy,
    smog: SmogStrategy,
    broker: Box<dyn BrokerAdapter>,
    observer: Box<dyn EngineObserver>,
}

impl Engine {
    pub fn new(
        tcl_params: TclParams,
        smog_params: SmogParams,
        broker: Box<dyn BrokerAdapter>,
        observer: Box<dyn EngineObserver>,
    ) -> Self {
        Engine {
            candles: CandleWindow::new(),
            positions: HashMap::new(),
            tcl: TclStrategy::new(tcl_params),
            smog: SmogStrategy::new(smog_params),
            broker,
            observer,
        }
    }

    pub fn candles(&self) -> &CandleWindow {
        &self.candles
    }

    /// Current account balance, queried live from the broker (§6).
    pub fn balance(&self) -> Result<f64, EngineError> {
        self.broker.balance()
    }

    pub fn position(&self, strategy: Strategy) -> Option<&Position> {
        self.positions.get(&strategy)
    }

    /// The full tick algorithm: append the candle, look for new setups on
    /// strategies with no active position, manage and check exits on every
    /// active position. An `InvariantViolation` propagated from a position
    /// operation halts the tick and is returned to the caller (§7) — the
    /// caller is expected to stop feeding candles.
    pub fn on_candle(&mut self, candle: Candle) -> Result<(), EngineError> {
        self.candles.push(candle);

        self.try_open(Strategy::Tcl)?;
        self.try_open(Strategy::Smog)?;

        for strategy in [Strategy::Tcl, Strategy::Smog] {
            self.manage_and_check_exit(strategy)?;
        }

        Ok(())
    }

    fn try_open(&mut self, strategy: Strategy) -> Result<(), EngineError> {
        if self.positions.contains_key(&strategy) {
            return Ok(());
        }
        match strategy {
            Strategy::Tcl => {
                let Some(setup) = self.tcl.detect_setup(&self.candles) else { return Ok(()) };
                let direction = setup.direction;
                self.observer.on_event(&EngineEvent::SetupDetected { strategy, direction, setup: SetupKind::Tcl(setup.clone()) });
                let balance = self.broker.balance()?;
                let Some(orders) = self.tcl.calculate_entries(&setup, balance) else { return Ok(()) };
                self.open_position(strategy, direction, orders, SetupKind::Tcl(setup));
            }
            Strategy::Smog => {
                let Some(setup) = self.smog.detect_setup(&self.candles) else { return Ok(()) };
                let direction = setup.direction;
                self.observer.on_event(&EngineEvent::SetupDetected { strategy, direction, setup: SetupKind::Smog(setup.clone()) });
                let balance = self.broker.balance()?;
                let Some(orders) = self.smog.calculate_entries(&setup, balance) else { return Ok(()) };
                self.open_position(strategy, direction, orders, SetupKind::Smog(setup));
            }
        }
        Ok(())
    }

    fn open_position(
        &mut self,
        strategy: Strategy,
        direction: crate::types::Side,
        mut orders: Vec<crate::types::Order>,
        metadata: SetupKind,
    ) {
        if orders.iter().map(|o| o.size_usd).sum::<f64>() <= 0.0 {
            return;
        }
        let opened_at = self.candles.last().map(|c| c.timestamp).unwrap_or(0);
        for order in orders.iter_mut() {
            match self.broker.submit_order(order) {
                Ok(id) => order.order_id = Some(id),
                Err(e) => tracing::warn!(error = %e, "broker rejected order submission"),
            }
            self.observer.on_event(&EngineEvent::OrderSubmitted {
                strategy,
                order_type: order.order_type,
                entry_price: order.entry_price,
                size_usd: order.size_usd,
            });
        }
        let position = Position::new(strategy, direction, orders, opened_at, metadata);
        self.positions.insert(strategy, position);
    }

    fn manage_and_check_exit(&mut self, strategy: Strategy) -> Result<(), EngineError> {
        let actions = {
            let Some(position) = self.positions.get_mut(&strategy) else { return Ok(()) };
            match strategy {
                Strategy::Tcl => self.tcl.manage_position(position, &self.candles),
                Strategy::Smog => self.smog.manage_position(position, &self.candles),
            }
        };

        for action in actions {
            let event = match action {
                ManagementAction::OrderFilled { order_type, price } => {
                    let position = self.positions.get(&strategy).expect("position present during management");
                    let order_id = position.orders.iter().find(|o| o.order_type == order_type).and_then(|o| o.order_id.clone());
                    if let Some(id) = order_id {
                        if let Err(e) = self.broker.fill_notification(&id, price) {
                            tracing::warn!(error = %e, "broker rejected fill notification");
                        }
                    }
                    let position = self.positions.get(&strategy).expect("position present during management");
                    EngineEvent::OrderFilled {
                        strategy,
                        order_type,
                        price,
                        new_avg_entry: position.avg_entry,
                        new_total_size: position.total_size,
                    }
                }
                ManagementAction::ScaleInCancelled { cancelled_count, current_r } => {
                    let cancelled_ids: Vec<String> = self
                        .positions
                        .get(&strategy)
                        .map(|p| {
                            p.orders
                                .iter()
                                .filter(|o| o.status == OrderStatus::Cancelled)
                                .filter_map(|o| o.order_id.clone())
                                .collect()
                        })
                        .unwrap_or_default();
                    for id in cancelled_ids {
                        if let Err(e) = self.broker.cancel_order(&id) {
                            tracing::warn!(error = %e, "broker rejected order cancellation");
                        }
                    }
                    EngineEvent::ScaleInCancelled { strategy, cancelled_count, current_r }
                }
                ManagementAction::SlMoved { old_sl, new_sl, reason } => EngineEvent::SlMoved { strategy, old_sl, new_sl, reason },
            };
            self.observer.on_event(&event);
        }

        let exit = {
            let Some(position) = self.positions.get(&strategy) else { return Ok(()) };
            match strategy {
                Strategy::Tcl => self.tcl.should_exit(position, &self.candles),
                Strategy::Smog => self.smog.should_exit(position, &self.candles),
            }
        };

        if let Some(reason) = exit {
            let price = self.candles.last().map(|c| c.close).unwrap_or(0.0);
            let position = self.positions.get_mut(&strategy).expect("position present at exit");
            let realized_pnl = position.close(price, reason);
            let risk = position.original_risk_usd();
            let r_multiple = if risk > 0.0 { realized_pnl / risk } else { 0.0 };
            self.observer.on_event(&EngineEvent::PositionClosed { strategy, reason, realized_pnl, r_multiple });
            self.positions.remove(&strategy);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{NullBroker, OrderId};
    use crate::events::RecordingObserver;
    use crate::types::Order;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn candle(ts: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle { timestamp: ts, open, high, low, close, volume: 10.0 }
    }

    /// Broker double whose reported balance can change after construction,
    /// to confirm the engine queries it live rather than caching a snapshot.
    struct VariableBalanceBroker {
        balance: Rc<RefCell<f64>>,
        next_id: u64,
    }

    impl BrokerAdapter for VariableBalanceBroker {
        fn submit_order(&mut self, _order: &Order) -> Result<OrderId, EngineError> {
            self.next_id += 1;
            Ok(format!("vb-{}", self.next_id))
        }

        fn cancel_order(&mut self, _order_id: &OrderId) -> Result<(), EngineError> {
            Ok(())
        }

        fn fill_notification(&mut self, _order_id: &OrderId, _fill_price: f64) -> Result<(), EngineError> {
            Ok(())
        }

        fn balance(&self) -> Result<f64, EngineError> {
            Ok(*self.balance.borrow())
        }
    }

    #[test]
    fn balance_is_queried_live_from_broker() {
        let shared_balance = Rc::new(RefCell::new(10_000.0));
        let broker = VariableBalanceBroker { balance: shared_balance.clone(), next_id: 0 };
        let engine = Engine::new(
            TclParams::default(),
            SmogParams::default(),
            Box::new(broker),
            Box::new(RecordingObserver::default()),
        );
        assert_eq!(engine.balance().unwrap(), 10_000.0);

        *shared_balance.borrow_mut() = 3_000.0;
        assert_eq!(engine.balance().unwrap(), 3_000.0);
    }

    #[test]
    fn engine_opens_no_position_on_insufficient_history() {
        let mut engine = Engine::new(
            TclParams::default(),
            SmogParams::default(),
            Box::new(NullBroker::new(10_000.0)),
            Box::new(RecordingObserver::default()),
        );
        for i in 0..10 {
            engine.on_candle(candle(i, 100.0, 101.0, 99.0, 100.0)).unwrap();
        }
        assert!(engine.position(Strategy::Tcl).is_none());
        assert!(engine.position(Strategy::Smog).is_none());
    }

    #[test]
    fn engine_detects_tcl_setup_and_opens_position() {
        let mut engine = Engine::new(
            TclParams::default(),
            SmogParams::default(),
            Box::new(NullBroker::new(10_000.0)),
            Box::new(RecordingObserver::default()),
        );
        let mut price = 100.0;
        for i in 0..250 {
            let step = if i >= 230 { 0.35 } else { 0.15 };
            price += step;
            engine.on_candle(candle(i, price - step, price + 0.3, price - 0.3, price)).unwrap();
        }
        assert!(engine.position(Strategy::Tcl).is_some());
    }

    #[test]
    fn engine_closes_position_and_removes_it_on_exit() {
        let mut engine = Engine::new(
            TclParams::default(),
            SmogParams::default(),
            Box::new(NullBroker::new(10_000.0)),
            Box::new(RecordingObserver::default()),
        );
        let mut price = 100.0;
        for i in 0..250 {
            let step = if i >= 230 { 0.35 } else { 0.15 };
            price += step;
            engine.on_candle(candle(i, price - step, price + 0.3, price - 0.3, price)).unwrap();
        }
        let position = engine.position(Strategy::Tcl).expect("setup should have opened a position");
        let entry_price = position.orders[0].entry_price;
        let tp = position.orders[0].tp;
        engine.on_candle(candle(250, price, price, entry_price - 1.0, entry_price)).unwrap();
        engine.on_candle(candle(251, entry_price, tp + 1.0, entry_price, tp + 1.0)).unwrap();
        assert!(engine.position(Strategy::Tcl).is_none());
    }
}
