use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::{TradeContext, TradeTask};
use crate::error::TradeError;
use crate::trade::{ProcessModel, Trade};

/// First failing task of a list and its cause.
#[derive(Debug, Error)]
#[error("task {task} failed: {error}")]
pub struct TaskFailure {
    pub task: &'static str,
    #[source]
    pub error: TradeError,
}

/// Runs an ordered task list against one trade, strictly in sequence.
///
/// Each task sees the effects of every task before it. The first failure
/// aborts the rest of the list. The trade and process model are put back to
/// their state from before the failing task, so only the completed tasks'
/// effects remain; wallet side effects of the failing task are not undone.
pub struct TaskRunner {
    tasks: Vec<Box<dyn TradeTask>>,
    intercepted: Arc<HashSet<String>>,
}

impl TaskRunner {
    pub fn new(tasks: Vec<Box<dyn TradeTask>>) -> Self {
        Self {
            tasks,
            intercepted: Arc::default(),
        }
    }

    /// Tasks whose name is in `intercepted` fail before their body runs.
    pub fn with_intercepted(mut self, intercepted: Arc<HashSet<String>>) -> Self {
        self.intercepted = intercepted;
        self
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub async fn run(
        &self,
        trade: &mut Trade,
        model: &mut ProcessModel,
    ) -> Result<(), TaskFailure> {
        for task in &self.tasks {
            let name = task.name();
            if self.intercepted.contains(name) {
                return Err(fail(trade, name, TradeError::Intercepted(name)));
            }

            let snapshot = (trade.clone(), model.clone());
            let result = {
                let mut ctx = TradeContext {
                    trade: &mut *trade,
                    model: &mut *model,
                };
                task.run(&mut ctx).await
            };

            match result {
                Ok(()) => debug!(trade_id = %trade.id, task = name, "task completed"),
                Err(error) => {
                    *trade = snapshot.0;
                    *model = snapshot.1;
                    return Err(fail(trade, name, error));
                }
            }
        }
        Ok(())
    }
}

fn fail(trade: &mut Trade, task: &'static str, error: TradeError) -> TaskFailure {
    warn!(trade_id = %trade.id, task, kind = ?error.kind(), "task failed: {error}");
    trade.error_message = Some(error.to_string());
    TaskFailure { task, error }
}
