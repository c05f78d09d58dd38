//! Lifecycle wrapper around a single long-lived recognition engine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::OcrError;

use super::engine::{EngineLoader, RecognitionEngine};

type PendingInit<E> = Shared<BoxFuture<'static, Result<Arc<E>, OcrError>>>;

enum EngineState<E> {
    Uninitialized,
    Initializing { attempt: u64, pending: PendingInit<E> },
    Ready(Arc<E>),
    Terminated,
}

/// Observable adapter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready,
    Terminated,
}

/// Owns the engine handle and its `Uninitialized -> Initializing -> Ready ->
/// Terminated` transitions.
///
/// * `initialize` collapses concurrent callers onto one in-flight load. A
///   failed load returns the adapter to `Uninitialized` so a later call retries.
/// * `recognize` calls are queued in arrival order; the engine never sees two
///   at once.
/// * `terminate` is valid from any state and bounded by the shutdown timeout.
///   A terminated adapter may be initialized again.
pub struct OcrAdapter<L: EngineLoader> {
    loader: Arc<L>,
    state: Mutex<EngineState<L::Engine>>,
    next_attempt: AtomicU64,
    recognize_gate: tokio::sync::Mutex<()>,
    shutdown_timeout: Duration,
}

impl<L: EngineLoader> OcrAdapter<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            state: Mutex::new(EngineState::Uninitialized),
            next_attempt: AtomicU64::new(0),
            recognize_gate: tokio::sync::Mutex::new(()),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.lock_state() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Initializing { .. } => EngineStatus::Initializing,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Terminated => EngineStatus::Terminated,
        }
    }

    /// Bring the engine to `Ready`. Cheap when already ready.
    pub async fn initialize(&self) -> Result<(), OcrError> {
        let (attempt, pending) = {
            let mut state = self.lock_state();
            match &*state {
                EngineState::Ready(_) => return Ok(()),
                EngineState::Initializing { attempt, pending } => {
                    debug!("Joining in-flight OCR initialization #{}", attempt);
                    (*attempt, pending.clone())
                }
                EngineState::Uninitialized | EngineState::Terminated => {
                    let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed) + 1;
                    let pending = self.spawn_load();
                    *state = EngineState::Initializing {
                        attempt,
                        pending: pending.clone(),
                    };
                    info!("Initializing OCR engine (attempt #{})", attempt);
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut state = self.lock_state();
        let current =
            matches!(&*state, EngineState::Initializing { attempt: a, .. } if *a == attempt);

        match outcome {
            Ok(engine) if current => {
                info!("OCR engine '{}' ready", engine.name());
                *state = EngineState::Ready(engine);
                Ok(())
            }
            Ok(_) => match &*state {
                EngineState::Ready(_) => Ok(()),
                // Terminated while loading; the loaded engine is dropped.
                _ => Err(OcrError::Terminated),
            },
            Err(e) => {
                if current {
                    warn!("OCR engine initialization failed: {}", e);
                    *state = EngineState::Uninitialized;
                }
                Err(e)
            }
        }
    }

    /// Recognize text in an already-processed image.
    pub async fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        let _turn = self.recognize_gate.lock().await;
        let engine = self.ready_engine()?;
        let path = image_path.to_path_buf();

        debug!("Recognizing {}", path.display());

        tokio::task::spawn_blocking(move || engine.recognize(&path))
            .await
            .map_err(|e| OcrError::Recognition(format!("recognition task failed: {}", e)))?
    }

    /// Release the engine. Safe to call repeatedly and from any state.
    pub async fn terminate(&self) -> Result<(), OcrError> {
        let previous = std::mem::replace(&mut *self.lock_state(), EngineState::Terminated);

        let engine = match previous {
            EngineState::Ready(engine) => engine,
            EngineState::Initializing { attempt, .. } => {
                info!("OCR initialization #{} abandoned by terminate", attempt);
                return Ok(());
            }
            EngineState::Uninitialized => {
                debug!("Terminating OCR adapter that was never initialized");
                return Ok(());
            }
            EngineState::Terminated => {
                debug!("OCR adapter already terminated");
                return Ok(());
            }
        };

        let name = engine.name();
        let release = async {
            // Let an in-progress recognition finish first.
            let _turn = self.recognize_gate.lock().await;
            tokio::task::spawn_blocking(move || engine.shutdown()).await
        };

        match tokio::time::timeout(self.shutdown_timeout, release).await {
            Ok(Ok(())) => {
                info!("OCR engine '{}' terminated", name);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("OCR engine '{}' failed during shutdown: {}", name, e);
                Ok(())
            }
            Err(_) => {
                let millis = self.shutdown_timeout.as_millis() as u64;
                warn!("OCR engine '{}' did not shut down within {}ms", name, millis);
                Err(OcrError::ShutdownTimeout(millis))
            }
        }
    }

    fn spawn_load(&self) -> PendingInit<L::Engine> {
        let loader = Arc::clone(&self.loader);
        async move {
            let engine = tokio::task::spawn_blocking(move || loader.load())
                .await
                .map_err(|e| OcrError::ModelLoad(format!("loader task failed: {}", e)))??;
            Ok(Arc::new(engine))
        }
        .boxed()
        .shared()
    }

    fn ready_engine(&self) -> Result<Arc<L::Engine>, OcrError> {
        match &*self.lock_state() {
            EngineState::Ready(engine) => Ok(Arc::clone(engine)),
            EngineState::Terminated => Err(OcrError::Terminated),
            EngineState::Uninitialized | EngineState::Initializing { .. } => {
                Err(OcrError::NotInitialized)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState<L::Engine>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Engine returning canned text and recording how it is driven.
    #[derive(Default)]
    pub(crate) struct FakeEngine {
        pub text: String,
        pub fail: bool,
        pub shutdown_delay: Duration,
        pub shutdowns: Arc<AtomicUsize>,
        active: AtomicUsize,
        pub max_active: Arc<AtomicUsize>,
    }

    impl RecognitionEngine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn recognize(&self, _image_path: &Path) -> Result<String, OcrError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                Err(OcrError::Recognition("engine crashed".to_string()))
            } else {
                Ok(self.text.clone())
            }
        }

        fn shutdown(&self) {
            std::thread::sleep(self.shutdown_delay);
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeLoader {
        pub text: String,
        pub fail_recognition: bool,
        pub fail_first_load: AtomicBool,
        pub load_delay: Duration,
        pub shutdown_delay: Duration,
        pub loads: Arc<AtomicUsize>,
        pub shutdowns: Arc<AtomicUsize>,
        pub max_active: Arc<AtomicUsize>,
    }

    impl FakeLoader {
        pub(crate) fn with_text(text: &str) -> Self {
            Self {
                text: text.to_string(),
                ..Default::default()
            }
        }
    }

    impl EngineLoader for FakeLoader {
        type Engine = FakeEngine;

        fn load(&self) -> Result<FakeEngine, OcrError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.load_delay);

            if self.fail_first_load.swap(false, Ordering::SeqCst) {
                return Err(OcrError::ModelLoad("det.onnx not found".to_string()));
            }

            Ok(FakeEngine {
                text: self.text.clone(),
                fail: self.fail_recognition,
                shutdown_delay: self.shutdown_delay,
                shutdowns: Arc::clone(&self.shutdowns),
                max_active: Arc::clone(&self.max_active),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_initialize_loads_once() {
        let loader = FakeLoader {
            load_delay: Duration::from_millis(50),
            ..FakeLoader::with_text("FreshMart")
        };
        let loads = Arc::clone(&loader.loads);
        let adapter = OcrAdapter::new(loader);

        let results = join_all((0..8).map(|_| adapter.initialize())).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.status(), EngineStatus::Ready);

        // Already ready: no further loads
        adapter.initialize().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_can_retry() {
        let loader = FakeLoader {
            fail_first_load: AtomicBool::new(true),
            ..FakeLoader::with_text("FreshMart")
        };
        let loads = Arc::clone(&loader.loads);
        let adapter = OcrAdapter::new(loader);

        let err = adapter.initialize().await.unwrap_err();
        assert!(matches!(err, OcrError::ModelLoad(_)));
        assert_eq!(adapter.status(), EngineStatus::Uninitialized);

        adapter.initialize().await.unwrap();
        assert_eq!(adapter.status(), EngineStatus::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recognize_requires_ready_engine() {
        let adapter = OcrAdapter::new(FakeLoader::with_text("FreshMart"));

        let err = adapter.recognize(Path::new("r.png")).await.unwrap_err();
        assert_eq!(err, OcrError::NotInitialized);

        adapter.initialize().await.unwrap();
        let text = adapter.recognize(Path::new("r.png")).await.unwrap();
        assert_eq!(text, "FreshMart");
    }

    #[tokio::test]
    async fn test_recognize_is_serialized() {
        let loader = FakeLoader::with_text("FreshMart");
        let max_active = Arc::clone(&loader.max_active);
        let adapter = OcrAdapter::new(loader);
        adapter.initialize().await.unwrap();

        let path = Path::new("r.png");
        let results = join_all((0..6).map(|_| adapter.recognize(path))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let loader = FakeLoader::with_text("FreshMart");
        let shutdowns = Arc::clone(&loader.shutdowns);
        let adapter = OcrAdapter::new(loader);

        // Valid before initialization
        adapter.terminate().await.unwrap();
        assert_eq!(adapter.status(), EngineStatus::Terminated);

        adapter.initialize().await.unwrap();
        adapter.terminate().await.unwrap();
        adapter.terminate().await.unwrap();

        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(
            adapter.recognize(Path::new("r.png")).await.unwrap_err(),
            OcrError::Terminated
        );
    }

    #[tokio::test]
    async fn test_terminate_is_bounded() {
        let loader = FakeLoader {
            shutdown_delay: Duration::from_millis(300),
            ..FakeLoader::with_text("FreshMart")
        };
        let adapter = OcrAdapter::new(loader).with_shutdown_timeout(Duration::from_millis(20));
        adapter.initialize().await.unwrap();

        let err = adapter.terminate().await.unwrap_err();

        assert_eq!(err, OcrError::ShutdownTimeout(20));
        assert_eq!(adapter.status(), EngineStatus::Terminated);
    }

    #[tokio::test]
    async fn test_terminate_during_initialize() {
        let loader = FakeLoader {
            load_delay: Duration::from_millis(50),
            ..FakeLoader::with_text("FreshMart")
        };
        let adapter = OcrAdapter::new(loader);

        let (init, term) = tokio::join!(adapter.initialize(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            adapter.terminate().await
        });

        assert_eq!(init.unwrap_err(), OcrError::Terminated);
        assert!(term.is_ok());
        assert_eq!(adapter.status(), EngineStatus::Terminated);
    }
}
