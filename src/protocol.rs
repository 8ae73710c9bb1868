//! Event dispatch: selects the task list for a trade's role, phase and event,
//! runs it and applies the resulting phase.
//!
//! ```text
//! SellerAsTaker                                   BuyerAsMaker
//! TakeOffer            --PayDepositRequest-->       (PendingDeposit -> DepositPrepared)
//! (-> DepositPublished) <--PublishDepositTxRequest--
//!                      --DepositTxPublished-->      (-> DepositPublished)
//!                                                   StartFiatPayment (-> PayoutSigned)
//! (-> PayoutSigned)    <--FiatPaymentStarted--
//! ConfirmFiatReceived  --PayoutTxPublished-->       (-> PayoutPublished)
//! (-> PayoutPublished)
//! PayoutConfirmed (-> Completed)                    PayoutConfirmed (-> Completed)
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::TradeError;
use crate::message::{TradeEvent, TradeMessage};
use crate::task::buyer::{
    BuyerProcessesPayoutTxPublished, BuyerSendsFiatPaymentStarted, BuyerSignsPayoutTx,
};
use crate::task::common::SwapTradeEntriesToAvailable;
use crate::task::maker::{
    BuyerAsMakerCreatesAndSignsDepositTx, MakerCreatesContract, MakerProcessesDepositTxPublished,
    MakerProcessesPayDepositRequest, MakerSendsPublishDepositTxRequest,
};
use crate::task::seller::{
    SellerProcessesFiatPaymentStarted, SellerSendsPayoutTxPublished, SellerSignAndFinalizePayoutTx,
    SellerVerifiesContractHash,
};
use crate::task::taker::{
    SellerAsTakerSignsDepositTx, TakerCreatesDepositTxInputs, TakerProcessesPublishDepositTxRequest,
    TakerSendsDepositTxPublished, TakerSendsPayDepositRequest, TakerVerifiesContractHash,
};
use crate::task::{TaskRunner, TradeTask};
use crate::trade::{ProcessModel, Trade, TradePhase, TradeRole};

macro_rules! tasks {
    ($($task:expr),+ $(,)?) => {
        vec![$(Box::new($task) as Box<dyn TradeTask>),+]
    };
}

/// Ordered task list for one step plus the phase it leads to.
pub struct ProtocolStep {
    pub tasks: Vec<Box<dyn TradeTask>>,
    pub next_phase: TradePhase,
}

fn step(tasks: Vec<Box<dyn TradeTask>>, next_phase: TradePhase) -> Option<ProtocolStep> {
    Some(ProtocolStep { tasks, next_phase })
}

/// Task list for `event` in the given role and phase, `None` when the event
/// is not expected there.
pub fn protocol_step(
    role: TradeRole,
    phase: TradePhase,
    event: &TradeEvent,
) -> Option<ProtocolStep> {
    use TradePhase::*;
    use TradeRole::*;

    match (role, phase, event) {
        (SellerAsTaker, PendingDeposit, TradeEvent::TakeOffer) => step(
            tasks![TakerCreatesDepositTxInputs, TakerSendsPayDepositRequest],
            PendingDeposit,
        ),
        (
            BuyerAsMaker,
            PendingDeposit,
            TradeEvent::Message(TradeMessage::PayDepositRequest { .. }),
        ) => step(
            tasks![
                MakerProcessesPayDepositRequest,
                MakerCreatesContract,
                BuyerAsMakerCreatesAndSignsDepositTx,
                MakerSendsPublishDepositTxRequest,
            ],
            DepositPrepared,
        ),
        (
            SellerAsTaker,
            PendingDeposit,
            TradeEvent::Message(TradeMessage::PublishDepositTxRequest { .. }),
        ) => step(
            tasks![
                TakerProcessesPublishDepositTxRequest,
                TakerVerifiesContractHash,
                SellerAsTakerSignsDepositTx,
                TakerSendsDepositTxPublished,
            ],
            DepositPublished,
        ),
        (
            BuyerAsMaker,
            DepositPrepared,
            TradeEvent::Message(TradeMessage::DepositTxPublished { .. }),
        ) => step(tasks![MakerProcessesDepositTxPublished], DepositPublished),
        (BuyerAsMaker, DepositPublished, TradeEvent::StartFiatPayment) => step(
            tasks![BuyerSignsPayoutTx, BuyerSendsFiatPaymentStarted],
            PayoutSigned,
        ),
        (
            SellerAsTaker,
            DepositPublished,
            TradeEvent::Message(TradeMessage::FiatPaymentStarted { .. }),
        ) => step(tasks![SellerProcessesFiatPaymentStarted], PayoutSigned),
        (SellerAsTaker, PayoutSigned, TradeEvent::ConfirmFiatReceived) => step(
            tasks![
                SellerVerifiesContractHash,
                SellerSignAndFinalizePayoutTx,
                SellerSendsPayoutTxPublished,
            ],
            PayoutPublished,
        ),
        (
            BuyerAsMaker,
            PayoutSigned,
            TradeEvent::Message(TradeMessage::PayoutTxPublished { .. }),
        ) => step(tasks![BuyerProcessesPayoutTxPublished], PayoutPublished),
        (_, PayoutPublished, TradeEvent::PayoutConfirmed) => {
            step(tasks![SwapTradeEntriesToAvailable], Completed)
        }
        _ => None,
    }
}

/// One trade and its working set, locked as a unit.
pub struct TradeSession {
    pub trade: Trade,
    pub model: ProcessModel,
}

/// Owns all running trades. Each trade has its own lock, so distinct trades
/// progress concurrently while events of one trade are applied one at a time.
#[derive(Default)]
pub struct TradeManager {
    sessions: Mutex<HashMap<String, Arc<Mutex<TradeSession>>>>,
    intercepted: Arc<HashSet<String>>,
}

impl TradeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named tasks fail before running, for every trade.
    pub fn with_intercepted_tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.intercepted = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    /// Register a trade. Rejected when the offer direction contradicts the
    /// trade's role.
    pub async fn add_trade(&self, trade: Trade, model: ProcessModel) -> Result<String, TradeError> {
        if !trade.role_matches_offer() {
            return Err(TradeError::Precondition(format!(
                "{:?} cannot trade on a {:?} offer",
                trade.role, trade.offer.direction
            )));
        }
        let id = trade.id.clone();
        let session = Arc::new(Mutex::new(TradeSession { trade, model }));
        self.sessions.lock().await.insert(id.clone(), session);
        Ok(id)
    }

    async fn session(&self, trade_id: &str) -> Result<Arc<Mutex<TradeSession>>, TradeError> {
        self.sessions
            .lock()
            .await
            .get(trade_id)
            .cloned()
            .ok_or_else(|| TradeError::UnknownTrade(trade_id.to_string()))
    }

    /// Snapshot of a trade's current state.
    pub async fn trade(&self, trade_id: &str) -> Result<Trade, TradeError> {
        Ok(self.session(trade_id).await?.lock().await.trade.clone())
    }

    pub async fn process_model(&self, trade_id: &str) -> Result<ProcessModel, TradeError> {
        Ok(self.session(trade_id).await?.lock().await.model.clone())
    }

    /// Deliver a peer message to the trade it names.
    pub async fn handle_message(
        &self,
        message: TradeMessage,
    ) -> Result<Vec<TradeMessage>, TradeError> {
        let trade_id = message.trade_id().to_string();
        self.handle(&trade_id, TradeEvent::Message(message)).await
    }

    /// Deliver a batch of peer messages in order and collect the replies.
    pub async fn handle_messages(
        &self,
        messages: Vec<TradeMessage>,
    ) -> Result<Vec<TradeMessage>, TradeError> {
        let mut replies = Vec::new();
        for message in messages {
            replies.extend(self.handle_message(message).await?);
        }
        Ok(replies)
    }

    /// Apply one event to a trade and return the messages to send to the
    /// peer. A failing task list leaves the trade `Failed`.
    pub async fn handle(
        &self,
        trade_id: &str,
        event: TradeEvent,
    ) -> Result<Vec<TradeMessage>, TradeError> {
        let session = self.session(trade_id).await?;
        let mut guard = session.lock().await;
        let TradeSession { trade, model } = &mut *guard;

        match event {
            TradeEvent::OpenDispute => {
                trade.open_dispute()?;
                return Ok(Vec::new());
            }
            TradeEvent::ResolveDispute => {
                trade.resolve_dispute()?;
                return Ok(Vec::new());
            }
            _ => {}
        }

        // deposit inputs are reserved once per trade
        let repeated_take =
            matches!(event, TradeEvent::TakeOffer) && model.raw_transaction_inputs.is_some();
        let step = if repeated_take {
            None
        } else {
            protocol_step(trade.role, trade.phase, &event)
        };
        let Some(step) = step else {
            warn!(trade_id, event = event.name(), phase = ?trade.phase, "unexpected event");
            return Err(TradeError::UnexpectedEvent {
                event: event.name(),
                phase: trade.phase,
            });
        };

        info!(trade_id, event = event.name(), phase = ?trade.phase, "handling event");
        model.trade_message = match event {
            TradeEvent::Message(message) => Some(message),
            _ => None,
        };

        let runner = TaskRunner::new(step.tasks).with_intercepted(Arc::clone(&self.intercepted));
        let result = runner.run(trade, model).await;
        model.trade_message = None;

        match result {
            Ok(()) => {
                trade.advance_to(step.next_phase)?;
                Ok(model.take_outbound())
            }
            Err(failure) => {
                model.take_outbound();
                trade.advance_to(TradePhase::Failed)?;
                Err(failure.into())
            }
        }
    }
}
