use crate::common::{Codes, Request};
use crate::config::Configuration;
use crate::error::AppError;
use crate::media::{FsMediaLoader, MediaLoader};
use crate::response::{FetchContext, ItemState, ModuleInfo, ModuleResponse, ResponseItem};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// The module specific part of a drive cycle.
pub trait ItemProcessor: Send {
    /// Called before any item of a drive cycle is processed.
    fn begin_cycle(&mut self) {}

    /// Runs the module on an item that is ready. Failures are recorded on
    /// the item's code; the orchestrator finalises the item afterwards.
    fn process_item(&mut self, item: &Arc<ResponseItem>);

    /// Module-level diagnostic for the cycle that just ran.
    fn end_cycle(&mut self) -> Codes {
        Codes::Success
    }

    /// Called once before [`ModuleOrchestrator::drain`] runs its cycles.
    fn begin_run(&mut self) {}

    /// Module-level diagnostic for a whole drain. `cycles` is the first
    /// non-success code any of its cycles reported.
    fn end_run(&mut self, cycles: Codes) -> Codes {
        cycles
    }
}

/// Result of one drive cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    /// Items finished during this call, in admission order.
    pub responses: Vec<ModuleResponse>,
    pub code: Codes,
    /// Requests waiting for room in the working set.
    pub pending: usize,
    /// Admitted items that are not finished yet.
    pub in_flight: usize,
}

impl CycleOutcome {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }
}

/// Owns the working set and drives its items through fetch and processing.
///
/// Each call to [`ModuleOrchestrator::process`] advances every admitted item
/// by at most one phase and never blocks on a fetch, so callers poll it until
/// [`CycleOutcome::is_idle`]. Taking `&mut self` keeps drive cycles
/// sequential.
pub struct ModuleOrchestrator<P> {
    processor: P,
    fetch: FetchContext,
    module: ModuleInfo,
    buffer_size: usize,
    concurrency_enabled: bool,
    fetch_timeout: Duration,
    pending: VecDeque<Request>,
    working_set: IndexMap<Uuid, Arc<ResponseItem>>,
}

impl<P: ItemProcessor> ModuleOrchestrator<P> {
    pub fn builder(configuration: Configuration) -> ModuleOrchestratorBuilder {
        ModuleOrchestratorBuilder::new(configuration)
    }

    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.working_set.len()
    }

    /// Runs one drive cycle over `requests` plus everything already queued.
    #[instrument(skip(self, requests), fields(incoming = requests.len()))]
    pub fn process(&mut self, requests: Vec<Request>) -> CycleOutcome {
        self.pending.extend(requests);
        self.admit();

        self.processor.begin_cycle();
        self.dispatch_fetches();
        let responses = self.dispatch_processing();
        let code = self.processor.end_cycle();

        debug!(
            "Cycle finished {} items, {} in flight, {} pending",
            responses.len(),
            self.working_set.len(),
            self.pending.len()
        );
        CycleOutcome {
            responses,
            code,
            pending: self.pending.len(),
            in_flight: self.working_set.len(),
        }
    }

    /// Polls drive cycles until every submitted request is finished. The
    /// returned code covers the whole run, not its last cycle.
    pub async fn drain(
        &mut self,
        requests: Vec<Request>,
        poll_interval: Duration,
    ) -> CycleOutcome {
        self.processor.begin_run();
        let mut total = self.process(requests);
        while !total.is_idle() {
            tokio::time::sleep(poll_interval).await;
            let cycle = self.process(Vec::new());
            total.responses.extend(cycle.responses);
            if total.code.is_success() {
                total.code = cycle.code;
            }
            total.pending = cycle.pending;
            total.in_flight = cycle.in_flight;
        }
        total.code = self.processor.end_run(total.code);
        total
    }

    fn admit(&mut self) {
        while self.working_set.len() < self.buffer_size {
            let Some(request) = self.pending.pop_front() else {
                break;
            };
            let item = ResponseItem::new(request);
            if self.concurrency_enabled {
                item.enable();
            }
            debug!("Admitted {} as {}", item.url(), item.id());
            self.working_set.insert(item.id(), Arc::new(item));
        }
    }

    // Pass 1: claim every item still waiting and start its fetch. A failed
    // claim means the item is already being fetched.
    fn dispatch_fetches(&mut self) {
        for item in self.working_set.values() {
            if !item.is_to_be_processed() {
                continue;
            }
            if !item.try_set_state(ItemState::PreparingToBeProcessed) {
                continue;
            }
            item.start_fetch(&self.fetch);
        }
    }

    // Pass 2: finalise failed or stale items and process the ready ones.
    // Items still fetching are skipped until a later cycle.
    fn dispatch_processing(&mut self) -> Vec<ModuleResponse> {
        let mut finished = Vec::new();
        for (id, item) in &self.working_set {
            if item.check_timeout(self.fetch_timeout) {
                finished.push(*id);
                continue;
            }
            if !item.code().is_success() {
                item.try_set_state(ItemState::Processed);
                finished.push(*id);
                continue;
            }
            if !item.is_ready_to_be_processed() {
                continue;
            }
            if !item.try_set_state(ItemState::BeingProcessed) {
                continue;
            }
            self.processor.process_item(item);
            item.try_set_state(ItemState::Processed);
            finished.push(*id);
        }

        finished
            .into_iter()
            .filter_map(|id| self.working_set.shift_remove(&id))
            .map(|item| {
                info!("Finished {} with {}", item.url(), item.code());
                item.to_response(&self.module)
            })
            .collect()
    }
}

/// Builds a [`ModuleOrchestrator`] from a [`Configuration`]; each setter
/// overrides the configured value.
pub struct ModuleOrchestratorBuilder {
    configuration: Configuration,
    fetch_timeout: Option<Duration>,
    loader: Option<Arc<dyn MediaLoader>>,
    runtime: Option<Handle>,
}

impl ModuleOrchestratorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            fetch_timeout: None,
            loader: None,
            runtime: None,
        }
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.configuration.buffer_size = buffer_size;
        self
    }

    pub fn concurrency_enabled(mut self, concurrency_enabled: bool) -> Self {
        self.configuration.concurrency_enabled = concurrency_enabled;
        self
    }

    pub fn fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = Some(fetch_timeout);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn MediaLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Runtime used for background fetches; defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build<P: ItemProcessor>(
        self,
        processor: P,
    ) -> Result<ModuleOrchestrator<P>, AppError> {
        self.configuration.validate()?;
        let configuration = self.configuration;

        let runtime = if configuration.concurrency_enabled {
            match self.runtime {
                Some(runtime) => Some(runtime),
                None => {
                    let current =
                        Handle::try_current().map_err(|e| AppError::Runtime(e.to_string()))?;
                    Some(current)
                }
            }
        } else {
            None
        };
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FsMediaLoader::new(configuration.frame_directory_fps)));

        info!(
            "Creating orchestrator with buffer_size: {}, concurrency: {}",
            configuration.buffer_size, configuration.concurrency_enabled
        );
        Ok(ModuleOrchestrator {
            processor,
            fetch: FetchContext::new(loader, runtime),
            module: configuration.module_info(),
            buffer_size: configuration.buffer_size,
            concurrency_enabled: configuration.concurrency_enabled,
            fetch_timeout: self
                .fetch_timeout
                .unwrap_or_else(|| configuration.fetch_timeout()),
            pending: VecDeque::new(),
            working_set: IndexMap::new(),
        })
    }
}
