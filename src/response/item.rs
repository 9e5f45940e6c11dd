use super::state::ItemState;
use super::{ModuleInfo, ModuleResponse};
use crate::common::request::push_region;
use crate::common::{Codes, FrameAnnotation, Region, Request};
use crate::media::{FrameStream, MediaSource};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// One request's unit of work.
///
/// The state is an atomic tag next to a `managed` flag. While unmanaged
/// (bypass mode) every transition succeeds without changing anything and
/// every readiness query except [`ResponseItem::is_irrelevant`] answers
/// `true`, so callers behave as if each gate were already passed.
///
/// Everything else the fetch task and the orchestrator share lives behind
/// `data`; that lock is never held across media I/O.
pub struct ResponseItem {
    id: Uuid,
    request: Request,
    managed: AtomicBool,
    state: AtomicU8,
    code: AtomicU8,
    data: Mutex<ItemData>,
}

pub(crate) struct ItemData {
    pub(crate) media: Option<Box<dyn MediaSource>>,
    pub(crate) frames: Option<FrameStream>,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
    pub(crate) tstamps_processed: Vec<f64>,
    pub(crate) frame_annotations: Vec<FrameAnnotation>,
    pub(crate) fetch_started: Option<Instant>,
}

impl ResponseItem {
    pub fn new(request: Request) -> Self {
        let frame_annotations = request
            .prev_response
            .as_ref()
            .map(|prior| prior.frame_annotations.clone())
            .unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            request,
            managed: AtomicBool::new(false),
            state: AtomicU8::new(ItemState::Irrelevant as u8),
            code: AtomicU8::new(Codes::Success as u8),
            data: Mutex::new(ItemData {
                media: None,
                frames: None,
                width: None,
                height: None,
                tstamps_processed: Vec::new(),
                frame_annotations,
                fetch_started: None,
            }),
        }
    }

    /// Attaches already retrieved media; the fetch will not load it again.
    pub fn with_media(self, media: Box<dyn MediaSource>) -> Self {
        self.data().media = Some(media);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn sample_rate(&self) -> f64 {
        self.request.sample_rate
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub(crate) fn data(&self) -> MutexGuard<'_, ItemData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_managed(&self) -> bool {
        self.managed.load(Ordering::Acquire)
    }

    /// Moves the item into the managed lifecycle.
    pub fn enable(&self) {
        self.managed.store(true, Ordering::Release);
        if self.transition(ItemState::Irrelevant, ItemState::ToBeProcessed) {
            info!(
                "From {} to {}.{}",
                ItemState::Irrelevant,
                ItemState::ToBeProcessed,
                self.url()
            );
        }
    }

    pub fn state(&self) -> ItemState {
        if !self.is_managed() {
            return ItemState::Irrelevant;
        }
        ItemState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_state(&self, state: ItemState) -> bool {
        if state == ItemState::Irrelevant {
            return self.state() == ItemState::Irrelevant;
        }
        !self.is_managed() || self.state() == state
    }

    pub fn is_irrelevant(&self) -> bool {
        self.is_state(ItemState::Irrelevant)
    }

    pub fn is_to_be_processed(&self) -> bool {
        self.is_state(ItemState::ToBeProcessed)
    }

    pub fn is_preparing_to_be_processed(&self) -> bool {
        self.is_state(ItemState::PreparingToBeProcessed)
    }

    pub fn is_ready_to_be_processed(&self) -> bool {
        self.is_state(ItemState::ReadyToBeProcessed)
    }

    pub fn is_being_processed(&self) -> bool {
        self.is_state(ItemState::BeingProcessed)
    }

    pub fn is_already_processed(&self) -> bool {
        self.is_state(ItemState::Processed)
    }

    /// Sets `state` and reports whether this call changed it. Racing callers
    /// with the same target see exactly one `true`.
    pub fn try_set_state(&self, state: ItemState) -> bool {
        if !self.is_managed() {
            return true;
        }
        let previous = ItemState::from_u8(self.state.swap(state as u8, Ordering::AcqRel));
        if previous == state {
            return false;
        }
        info!("From {} to {}.{}", previous, state, self.url());
        true
    }

    /// Compare-and-set from `from` to `to`; used where a write must not land
    /// on an item that has already moved on.
    pub(crate) fn transition(&self, from: ItemState, to: ItemState) -> bool {
        if !self.is_managed() {
            return true;
        }
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn code(&self) -> Codes {
        Codes::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Records a failure. The first failure sticks and `Success` is never
    /// written back.
    pub fn set_code(&self, code: Codes) -> bool {
        if code.is_success() {
            return false;
        }
        self.code
            .compare_exchange(
                Codes::Success as u8,
                code as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn force_code(&self, code: Codes) {
        if !code.is_success() {
            self.code.store(code as u8, Ordering::Release);
        }
    }

    /// Reclaims an item whose fetch has been running longer than
    /// `max_lifetime`. The fetch task itself is left running.
    pub fn check_timeout(&self, max_lifetime: Duration) -> bool {
        if !self.is_managed() || self.state() != ItemState::PreparingToBeProcessed {
            return false;
        }
        let Some(started) = self.data().fetch_started else {
            return false;
        };
        let lifetime = started.elapsed();
        if lifetime <= max_lifetime {
            return false;
        }
        if !self.transition(ItemState::PreparingToBeProcessed, ItemState::Processed) {
            return false;
        }
        info!("lifetime: {:?} for {}", lifetime, self.url());
        warn!("{}", Codes::ErrorTimeout);
        self.force_code(Codes::ErrorTimeout);
        true
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let data = self.data();
        data.width.zip(data.height)
    }

    /// Takes the frame stream; it can only be consumed once.
    pub fn take_frames(&self) -> Option<FrameStream> {
        self.data().frames.take()
    }

    pub fn has_frame_annotations(&self) -> bool {
        self.request
            .prev_response
            .as_ref()
            .is_some_and(|prior| !prior.frame_annotations.is_empty())
    }

    /// Regions the previous response recorded at `tstamp`.
    pub fn prior_regions_at(&self, tstamp: f64) -> Option<&[Region]> {
        self.request
            .prev_response
            .as_ref()?
            .frame_annotations
            .iter()
            .find(|annotation| annotation.matches_tstamp(tstamp))
            .map(|annotation| annotation.regions.as_slice())
    }

    pub fn record_tstamp(&self, tstamp: f64) {
        self.data().tstamps_processed.push(tstamp);
    }

    pub fn tstamps_processed(&self) -> Vec<f64> {
        self.data().tstamps_processed.clone()
    }

    /// Adds a region produced by this module at `tstamp`.
    pub fn add_region(&self, tstamp: f64, region: Region) {
        push_region(&mut self.data().frame_annotations, tstamp, region);
    }

    pub(crate) fn to_response(&self, module: &ModuleInfo) -> ModuleResponse {
        let mut data = self.data();
        ModuleResponse {
            id: self.id,
            module: module.clone(),
            url: self.request.url.clone(),
            sample_rate: self.request.sample_rate,
            code: self.code(),
            width: data.width,
            height: data.height,
            tstamps_processed: std::mem::take(&mut data.tstamps_processed),
            frame_annotations: std::mem::take(&mut data.frame_annotations),
            completed_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for ResponseItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseItem")
            .field("id", &self.id)
            .field("url", &self.request.url)
            .field("state", &self.state())
            .field("code", &self.code())
            .finish()
    }
}
