use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::models::task::TaskKind;
use crate::services::dispatch_service::ResultDispatcher;
use crate::services::extraction_service::MetadataExtractor;
use crate::services::operator_service::Operator;
use crate::services::queue_service::IngestionQueues;
use crate::services::rename_flow::RenameFlow;
use crate::services::sort_flow::SortFlow;
use crate::services::worker_service::{result_channel, spawn_worker};
use crate::state::AppState;

/// Queues, workers and the dispatcher wired together. Dropping every clone
/// of `queues` winds the workers down, which in turn lets the dispatcher
/// finish.
pub struct Pipeline {
    pub queues: IngestionQueues,
    pub dispatcher: ResultDispatcher,
    pub rename_flow: Arc<RenameFlow>,
    pub workers: Vec<JoinHandle<()>>,
}

pub fn start_pipeline(
    state: &AppState,
    extractor: Arc<dyn MetadataExtractor>,
    operator: Arc<dyn Operator>,
) -> Pipeline {
    let (queues, receivers) = IngestionQueues::new();
    let (results_tx, results_rx) = result_channel();

    let workers = vec![
        spawn_worker(
            receivers.sort,
            extractor.clone(),
            results_tx.clone(),
            state.log.clone(),
        ),
        spawn_worker(receivers.rename, extractor, results_tx, state.log.clone()),
    ];

    let sort_flow = Arc::new(SortFlow::new(
        state.config.sorted_folder.clone(),
        state.extension(),
        operator.clone(),
        state.log.clone(),
    ));
    let rename_flow = Arc::new(RenameFlow::new(
        state.extension(),
        operator,
        state.log.clone(),
    ));

    let mut dispatcher = ResultDispatcher::new(results_rx, state.log.clone());
    dispatcher
        .register(TaskKind::Sort, sort_flow)
        .register(TaskKind::Rename, rename_flow.clone());

    Pipeline {
        queues,
        dispatcher,
        rename_flow,
        workers,
    }
}
