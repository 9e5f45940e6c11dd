use super::item::ResponseItem;
use super::state::ItemState;
use crate::common::Codes;
use crate::error::MediaError;
use crate::media::MediaLoader;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

/// What an item needs to retrieve its media.
#[derive(Clone)]
pub struct FetchContext {
    loader: Arc<dyn MediaLoader>,
    runtime: Option<Handle>,
}

impl FetchContext {
    pub fn new(loader: Arc<dyn MediaLoader>, runtime: Option<Handle>) -> Self {
        Self { loader, runtime }
    }

    pub fn loader(&self) -> &dyn MediaLoader {
        self.loader.as_ref()
    }
}

enum FetchOutcome {
    Ready,
    Abandoned,
}

impl ResponseItem {
    /// Retrieves the media. Managed items fetch on the runtime's blocking
    /// pool and record the start time for [`ResponseItem::check_timeout`];
    /// bypass items fetch inline.
    ///
    /// A background fetch is never cancelled. If the item times out first,
    /// the task runs to completion and its writes are dropped.
    pub fn start_fetch(self: &Arc<Self>, ctx: &FetchContext) {
        match (&ctx.runtime, self.is_managed()) {
            (Some(runtime), true) => {
                let started = Instant::now();
                self.data().fetch_started = Some(started);
                info!("Starting fetch for {} at {:?}", self.url(), started);
                let item = Arc::clone(self);
                let loader = Arc::clone(&ctx.loader);
                // detached
                drop(runtime.spawn_blocking(move || item.fetch_media(loader.as_ref())));
            }
            _ => self.fetch_media(ctx.loader()),
        }
    }

    pub(crate) fn fetch_media(&self, loader: &dyn MediaLoader) {
        debug!("preparing response {}", self.url());
        let loaded = match panic::catch_unwind(AssertUnwindSafe(|| self.load_media(loader))) {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err("media loading panicked".to_string()),
        };

        match loaded {
            Ok(FetchOutcome::Ready) => {
                if !self.transition(
                    ItemState::PreparingToBeProcessed,
                    ItemState::ReadyToBeProcessed,
                ) {
                    debug!("{} moved on while fetching, dropping result", self.url());
                } else if self.is_managed() {
                    info!(
                        "From {} to {}.{}",
                        ItemState::PreparingToBeProcessed,
                        ItemState::ReadyToBeProcessed,
                        self.url()
                    );
                }
            }
            Ok(FetchOutcome::Abandoned) => {
                debug!("{} moved on while fetching, dropping media", self.url());
            }
            Err(reason) => {
                error!("Error loading media from {}: {}", self.url(), reason);
                if self.is_preparing_to_be_processed() {
                    self.set_code(Codes::ErrorLoadingMedia);
                    self.transition(ItemState::PreparingToBeProcessed, ItemState::Processed);
                }
            }
        }
    }

    // The data lock is only taken around the writes, never while decoding.
    fn load_media(&self, loader: &dyn MediaLoader) -> Result<FetchOutcome, MediaError> {
        let attached = self.data().media.take();
        let media = match attached {
            Some(media) => {
                info!("media from url: {} was already in place.", self.url());
                media
            }
            None => loader.load(self.url())?,
        };

        let frames = if media.is_image() || media.is_video() {
            Some(media.frames(self.sample_rate()))
        } else {
            None
        };
        let (width, height) = media.dimensions();

        let mut data = self.data();
        if !self.is_preparing_to_be_processed() {
            return Ok(FetchOutcome::Abandoned);
        }
        debug!("Setting in response w: {} h: {}", width, height);
        data.frames = frames;
        data.width = Some(width);
        data.height = Some(height);
        data.media = Some(media);
        Ok(FetchOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Request;
    use crate::testing::{GatedLoader, StaticLoader, StaticSource};
    use std::time::Duration;

    fn claimed(url: &str) -> Arc<ResponseItem> {
        let item = Arc::new(ResponseItem::new(Request::new(url)));
        item.enable();
        assert!(item.try_set_state(ItemState::PreparingToBeProcessed));
        item
    }

    async fn wait_until_left_preparing(item: &ResponseItem) {
        for _ in 0..200 {
            if item.state() != ItemState::PreparingToBeProcessed {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("fetch did not finish");
    }

    #[test]
    fn inline_fetch_populates_frames_and_dimensions() {
        let loader = Arc::new(StaticLoader::new().with_media("mem://a", 3, 40, 30));
        let ctx = FetchContext::new(loader.clone(), None);
        let item = Arc::new(ResponseItem::new(Request::new("mem://a")));

        item.start_fetch(&ctx);

        assert_eq!(item.dimensions(), Some((40, 30)));
        assert_eq!(item.take_frames().map(|f| f.count()), Some(3));
        assert_eq!(item.code(), Codes::Success);
        assert_eq!(loader.loads(), 1);
    }

    #[test]
    fn inline_fetch_of_managed_item_reaches_ready() {
        let loader = Arc::new(StaticLoader::new().with_media("mem://a", 1, 4, 4));
        let item = claimed("mem://a");
        item.start_fetch(&FetchContext::new(loader, None));
        assert_eq!(item.state(), ItemState::ReadyToBeProcessed);
    }

    #[test]
    fn attached_media_is_not_loaded_again() {
        let loader = Arc::new(StaticLoader::new());
        let item = Arc::new(
            ResponseItem::new(Request::new("mem://attached"))
                .with_media(Box::new(StaticSource::image(8, 8))),
        );
        item.enable();
        item.try_set_state(ItemState::PreparingToBeProcessed);
        item.start_fetch(&FetchContext::new(loader.clone(), None));
        assert_eq!(loader.loads(), 0);
        assert_eq!(item.state(), ItemState::ReadyToBeProcessed);
        assert_eq!(item.dimensions(), Some((8, 8)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_media_is_processed_with_loading_error() {
        let loader = Arc::new(StaticLoader::new());
        let item = claimed("mem://missing");
        item.start_fetch(&FetchContext::new(loader, Some(Handle::current())));

        wait_until_left_preparing(&item).await;
        assert_eq!(item.state(), ItemState::Processed);
        assert_eq!(item.code(), Codes::ErrorLoadingMedia);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_loader_is_contained() {
        let loader = Arc::new(StaticLoader::new().panicking());
        let item = claimed("mem://boom");
        item.start_fetch(&FetchContext::new(loader, Some(Handle::current())));

        wait_until_left_preparing(&item).await;
        assert_eq!(item.code(), Codes::ErrorLoadingMedia);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_claims_fetch_once() {
        let loader = Arc::new(StaticLoader::new().with_media("mem://a", 1, 2, 2));
        let ctx = FetchContext::new(loader.clone(), Some(Handle::current()));
        let item = Arc::new(ResponseItem::new(Request::new("mem://a")));
        item.enable();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let item = Arc::clone(&item);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if item.try_set_state(ItemState::PreparingToBeProcessed) {
                        item.start_fetch(&ctx);
                        true
                    } else {
                        false
                    }
                })
            })
            .collect();
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        wait_until_left_preparing(&item).await;
        assert_eq!(winners, 1);
        assert_eq!(loader.loads(), 1);
        assert_eq!(item.state(), ItemState::ReadyToBeProcessed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timed_out_fetch_is_abandoned_safely() {
        let (loader, release) = GatedLoader::new(StaticSource::image(5, 5));
        let item = claimed("mem://slow");
        item.start_fetch(&FetchContext::new(Arc::new(loader), Some(Handle::current())));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(item.check_timeout(Duration::from_millis(1)));
        assert_eq!(item.state(), ItemState::Processed);
        assert_eq!(item.code(), Codes::ErrorTimeout);

        release.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(item.state(), ItemState::Processed);
        assert_eq!(item.code(), Codes::ErrorTimeout);
        assert!(item.dimensions().is_none());
    }
}
