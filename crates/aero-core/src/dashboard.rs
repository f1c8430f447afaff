//! The dashboard session: single owner of all mutable state.
//!
//! State lives behind one mutex that is never held across an `.await`, so
//! every mutation between network calls is atomic. Alerts therefore land
//! in the order their operations complete. Each mutation publishes a fresh
//! [`Snapshot`] on a watch channel for the presentation layer.
//!
//! Background work (one expiry timer per INFO alert and the health poller)
//! is owned by the session and aborted on [`Dashboard::shutdown`] or when
//! the last handle is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::alert_feed::{AlertFeed, INFO_ALERT_TTL};
use crate::backend::{Backend, FetchError, ImageUpload, Unreachable};
use crate::cameras::CameraRegistry;
use crate::health::{HealthMonitor, HealthState, HEALTH_POLL_INTERVAL};
use crate::stats::{Stats, DEFAULT_CAMERA_CAPACITY};
use crate::types::{Alert, AlertId, CameraId, HealthStatus, MatchList, MatchView};
use crate::upload::{UploadController, UploadError, UploadStatus};

/// Lowest and highest operator confidence threshold, in percent.
pub const MIN_CONFIDENCE_THRESHOLD: u8 = 50;
pub const MAX_CONFIDENCE_THRESHOLD: u8 = 100;
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 75;

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub alert_ttl: Duration,
    pub health_interval: Duration,
    pub camera_capacity: usize,
    pub confidence_threshold: u8,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            alert_ttl: INFO_ALERT_TTL,
            health_interval: HEALTH_POLL_INTERVAL,
            camera_capacity: DEFAULT_CAMERA_CAPACITY,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Immutable view of the session handed to renderers.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub alerts: Vec<Alert>,
    pub stats: Stats,
    pub cameras: Vec<CameraId>,
    pub selected_camera: Option<CameraId>,
    pub streaming: bool,
    pub stream_url: Option<String>,
    pub upload: UploadStatus,
    /// Matches from the latest finished upload. Empty when it found none,
    /// failed, or was dismissed.
    pub matches: Vec<MatchView>,
    pub confidence_threshold: u8,
}

struct State {
    feed: AlertFeed,
    registry: CameraRegistry,
    health: HealthMonitor,
    upload: UploadController,
    match_count: u64,
    last_matches: MatchList,
    confidence_threshold: u8,
    expiry_timers: HashMap<AlertId, JoinHandle<()>>,
}

struct Inner {
    backend: Arc<dyn Backend>,
    options: DashboardOptions,
    state: Mutex<State>,
    snapshots: watch::Sender<Snapshot>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in state.expiry_timers.drain() {
            timer.abort();
        }
        if let Some(task) = self
            .health_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

/// Clone-safe handle to the session.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, options: DashboardOptions) -> Self {
        let confidence_threshold = options
            .confidence_threshold
            .clamp(MIN_CONFIDENCE_THRESHOLD, MAX_CONFIDENCE_THRESHOLD);
        let state = State {
            feed: AlertFeed::with_ttl(options.alert_ttl),
            registry: CameraRegistry::new(),
            health: HealthMonitor::new(),
            upload: UploadController::new(),
            match_count: 0,
            last_matches: Vec::new(),
            confidence_threshold,
            expiry_timers: HashMap::new(),
        };
        let initial = snapshot_of(&state, backend.as_ref(), &options);
        let (snapshots, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                backend,
                options,
                state: Mutex::new(state),
                snapshots,
                health_task: Mutex::new(None),
            }),
        }
    }

    /// Load cameras, run the first health check, then start periodic polling.
    pub async fn start(&self) {
        tracing::info!("dashboard starting");
        if let Err(err) = self.refresh_cameras().await {
            tracing::warn!(error = %err, "camera list unavailable at startup");
        }
        let _ = self.poll_health().await;
        self.spawn_health_monitor();
        tracing::info!("dashboard ready");
    }

    /// Abort the health poller and every pending expiry timer.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.inner.health_task).take() {
            task.abort();
        }
        let mut state = lock(&self.inner.state);
        for (_, timer) in state.expiry_timers.drain() {
            timer.abort();
        }
        tracing::info!("dashboard shut down");
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = lock(&self.inner.state);
        snapshot_of(&state, self.inner.backend.as_ref(), &self.inner.options)
    }

    pub fn stats(&self) -> Stats {
        let state = lock(&self.inner.state);
        stats_of(&state, &self.inner.options)
    }

    pub fn alerts(&self) -> Vec<Alert> {
        lock(&self.inner.state).feed.all()
    }

    pub fn match_count(&self) -> u64 {
        lock(&self.inner.state).match_count
    }

    pub fn health_state(&self) -> HealthState {
        lock(&self.inner.state).health.state()
    }

    /// Whether the periodic health poller is currently running.
    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.health_task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Submit a suspicious-person image for recognition.
    ///
    /// Uploads are serialized: a second submit while one is in flight is
    /// rejected with [`UploadError::Busy`]. Invalid input never reaches the
    /// network. Every outcome pushes exactly one alert.
    pub async fn submit(&self, image: ImageUpload) -> Result<MatchList, UploadError> {
        let mut slot = {
            let mut state = lock(&self.inner.state);
            if let Err(report) = state.upload.begin(&image.bytes, &image.mime_type) {
                tracing::warn!(error = ?report.result.as_ref().err(), "upload rejected");
                self.push_alert(&mut state, report.alert);
                self.publish(&mut state);
                return report.result;
            }
            self.publish(&mut state);
            UploadSlot {
                dashboard: self,
                claimed: true,
            }
        };

        tracing::info!(
            file = %image.file_name,
            bytes = image.bytes.len(),
            mime = %image.mime_type,
            "submitting image for recognition"
        );
        let result = self.inner.backend.upload_suspicious(image).await;

        let mut state = lock(&self.inner.state);
        slot.claimed = false;
        let report = state.upload.finish(result);
        match &report.result {
            Ok(matches) if !matches.is_empty() => {
                state.match_count += report.match_delta();
                tracing::info!(
                    count = matches.len(),
                    total = state.match_count,
                    "face matches found"
                );
            }
            Ok(_) => tracing::info!("no matches found"),
            Err(err) => tracing::warn!(error = %err, "upload failed"),
        }
        state.last_matches = report.result.clone().unwrap_or_default();
        self.push_alert(&mut state, report.alert);
        self.publish(&mut state);
        report.result
    }

    /// Fetch the camera list. On failure the list is cleared and an ERROR
    /// alert is pushed.
    pub async fn refresh_cameras(&self) -> Result<Vec<CameraId>, FetchError> {
        let result = self.inner.backend.cameras().await;

        let mut state = lock(&self.inner.state);
        let outcome = match result {
            Ok(cameras) => {
                state.registry.replace(cameras);
                tracing::info!(
                    cameras = ?state.registry.cameras(),
                    selected = ?state.registry.selected(),
                    "cameras loaded"
                );
                Ok(state.registry.cameras().to_vec())
            }
            Err(err) => {
                tracing::error!(error = %err, "error loading cameras");
                state.registry.clear();
                self.push_alert(&mut state, Alert::error("Error loading cameras"));
                Err(FetchError(err))
            }
        };
        self.publish(&mut state);
        outcome
    }

    /// Select a camera as the stream source. `None` clears the selection.
    pub fn select_camera(&self, id: Option<&str>) {
        let mut state = lock(&self.inner.state);
        state.registry.select(id);
        self.publish(&mut state);
    }

    /// Start streaming the selected camera.
    pub fn start_surveillance(&self) -> bool {
        let mut state = lock(&self.inner.state);
        let started = state.registry.start_streaming();
        let alert = if started {
            tracing::info!(camera = ?state.registry.selected(), "surveillance started");
            Alert::success("Surveillance started")
        } else {
            Alert::error("Please select a camera first")
        };
        self.push_alert(&mut state, alert);
        self.publish(&mut state);
        started
    }

    pub fn stop_surveillance(&self) {
        let mut state = lock(&self.inner.state);
        state.registry.stop_streaming();
        tracing::info!("surveillance stopped");
        self.push_alert(&mut state, Alert::success("Surveillance stopped"));
        self.publish(&mut state);
    }

    /// Stream source for the selected camera while streaming.
    pub fn stream_url(&self) -> Option<String> {
        let state = lock(&self.inner.state);
        stream_url_of(&state, self.inner.backend.as_ref())
    }

    /// Set the operator threshold, clamped to 50..=100. Returns the value applied.
    pub fn set_confidence_threshold(&self, threshold: u8) -> u8 {
        let mut state = lock(&self.inner.state);
        state.confidence_threshold =
            threshold.clamp(MIN_CONFIDENCE_THRESHOLD, MAX_CONFIDENCE_THRESHOLD);
        self.publish(&mut state);
        state.confidence_threshold
    }

    /// Close the match display.
    pub fn dismiss_matches(&self) {
        let mut state = lock(&self.inner.state);
        state.last_matches.clear();
        self.publish(&mut state);
    }

    /// One health check. Emits an INFO alert only on the first success of
    /// the session; failures only flip the status.
    pub async fn poll_health(&self) -> Result<HealthStatus, Unreachable> {
        let result = self
            .inner
            .backend
            .health()
            .await
            .map_err(Unreachable::from);

        let mut state = lock(&self.inner.state);
        let transition = state.health.observe(result.clone());
        if transition.announce {
            self.push_alert(&mut state, Alert::info("System online and ready"));
        }
        self.publish(&mut state);
        result
    }

    /// Start the periodic health poller. The first poll happens one interval
    /// from now; [`start`](Self::start) performs the initial one itself.
    /// Replaces any poller already running.
    pub fn spawn_health_monitor(&self) {
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.options.health_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let dashboard = Dashboard { inner };
                let _ = dashboard.poll_health().await;
            }
        });

        if let Some(previous) = lock(&self.inner.health_task).replace(task) {
            previous.abort();
        }
        tracing::debug!(interval_secs = interval.as_secs_f32(), "health monitor started");
    }

    /// Push an alert and manage its expiry timer. Caller holds the state lock.
    fn push_alert(&self, state: &mut State, alert: Alert) {
        tracing::debug!(level = alert.level.label(), message = %alert.message, "alert");
        let outcome = state.feed.push(alert);

        if let Some(evicted) = outcome.evicted {
            if let Some(timer) = state.expiry_timers.remove(&evicted) {
                timer.abort();
            }
        }

        let Some(deadline) = outcome.expires_at else {
            return;
        };
        // Without a runtime the deadline is still honoured by evict_expired on publish.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let id = outcome.id;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let dashboard = Dashboard { inner };
            let mut state = lock(&dashboard.inner.state);
            state.expiry_timers.remove(&id);
            if state.feed.remove(id) {
                tracing::debug!(%id, "info alert expired");
                dashboard.publish(&mut state);
            }
        });
        state.expiry_timers.insert(id, timer);
    }

    fn publish(&self, state: &mut State) {
        for id in state.feed.evict_expired(Instant::now()) {
            if let Some(timer) = state.expiry_timers.remove(&id) {
                timer.abort();
            }
        }
        let snapshot = snapshot_of(state, self.inner.backend.as_ref(), &self.inner.options);
        self.inner.snapshots.send_replace(snapshot);
    }
}

/// Claimed upload slot. Dropping it while still claimed (the submit future
/// was cancelled mid-request) releases the slot.
struct UploadSlot<'a> {
    dashboard: &'a Dashboard,
    claimed: bool,
}

impl Drop for UploadSlot<'_> {
    fn drop(&mut self) {
        if !self.claimed {
            return;
        }
        let mut state = lock(&self.dashboard.inner.state);
        state.upload.abandon();
        tracing::warn!("upload cancelled before a result arrived");
        self.dashboard.publish(&mut state);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stats_of(state: &State, options: &DashboardOptions) -> Stats {
    Stats::compute(
        &state.feed,
        &state.registry,
        state.match_count,
        state.health.state(),
        options.camera_capacity,
    )
}

fn stream_url_of(state: &State, backend: &dyn Backend) -> Option<String> {
    if !state.registry.is_streaming() {
        return None;
    }
    state.registry.selected().map(|cam| backend.stream_url(cam))
}

fn snapshot_of(state: &State, backend: &dyn Backend, options: &DashboardOptions) -> Snapshot {
    Snapshot {
        alerts: state.feed.all(),
        stats: stats_of(state, options),
        cameras: state.registry.cameras().to_vec(),
        selected_camera: state.registry.selected().map(str::to_string),
        streaming: state.registry.is_streaming(),
        stream_url: stream_url_of(state, backend),
        upload: state.upload.status().clone(),
        matches: MatchView::from_matches(&state.last_matches, state.confidence_threshold),
        confidence_threshold: state.confidence_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::types::{AlertLevel, Match};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FakeBackend {
        cameras: Mutex<Result<Vec<CameraId>, BackendError>>,
        uploads: Mutex<VecDeque<Result<MatchList, BackendError>>>,
        health: Mutex<VecDeque<Result<HealthStatus, BackendError>>>,
        upload_gate: Option<Arc<Notify>>,
        upload_calls: AtomicUsize,
        health_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                cameras: Mutex::new(Ok(vec!["cam1".into(), "cam2".into()])),
                uploads: Mutex::new(VecDeque::new()),
                health: Mutex::new(VecDeque::new()),
                upload_gate: None,
                upload_calls: AtomicUsize::new(0),
                health_calls: AtomicUsize::new(0),
            }
        }

        fn with_uploads(self, uploads: Vec<Result<MatchList, BackendError>>) -> Self {
            *self.uploads.lock().unwrap() = uploads.into();
            self
        }

        fn with_health(self, polls: Vec<Result<HealthStatus, BackendError>>) -> Self {
            *self.health.lock().unwrap() = polls.into();
            self
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn cameras(&self) -> Result<Vec<CameraId>, BackendError> {
            self.cameras.lock().unwrap().clone()
        }

        async fn upload_suspicious(&self, _image: ImageUpload) -> Result<MatchList, BackendError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.upload_gate {
                gate.notified().await;
            }
            self.uploads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![]))
        }

        async fn health(&self) -> Result<HealthStatus, BackendError> {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            self.health.lock().unwrap().pop_front().unwrap_or_else(|| {
                Ok(HealthStatus {
                    status: "running".into(),
                })
            })
        }

        fn stream_url(&self, camera: &str) -> String {
            format!("fake://stream/{camera}")
        }
    }

    fn image() -> ImageUpload {
        ImageUpload {
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime_type: "image/jpeg".into(),
            file_name: "suspect.jpg".into(),
        }
    }

    fn m(urn: &str, distance: f32) -> Match {
        Match {
            urn: urn.into(),
            distance,
        }
    }

    fn dashboard(backend: FakeBackend) -> (Dashboard, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let dash = Dashboard::new(backend.clone(), DashboardOptions::default());
        (dash, backend)
    }

    #[tokio::test]
    async fn test_refresh_counts_and_auto_selects_first_camera() {
        let (dash, _) = dashboard(FakeBackend::new());
        let cams = dash.refresh_cameras().await.unwrap();

        assert_eq!(cams, vec!["cam1".to_string(), "cam2".to_string()]);
        assert_eq!(dash.stats().active_cameras, 2);
        let snap = dash.snapshot();
        assert_eq!(snap.selected_camera.as_deref(), Some("cam1"));
        assert_eq!(snap.stream_url.as_deref(), Some("fake://stream/cam1"));
        assert!(snap.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_list_and_alerts() {
        let backend = FakeBackend::new();
        *backend.cameras.lock().unwrap() = Err(BackendError::Network("refused".into()));
        let (dash, _) = dashboard(backend);

        assert!(dash.refresh_cameras().await.is_err());
        assert_eq!(dash.stats().active_cameras, 0);
        let alerts = dash.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Error);
        assert_eq!(alerts[0].message, "Error loading cameras");
    }

    #[tokio::test]
    async fn test_upload_with_two_matches() {
        let backend =
            FakeBackend::new().with_uploads(vec![Ok(vec![m("A", 0.1), m("B", 0.4)])]);
        let (dash, _) = dashboard(backend);

        let matches = dash.submit(image()).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(dash.match_count(), 2);

        let snap = dash.snapshot();
        assert_eq!(snap.alerts.len(), 1);
        assert_eq!(snap.alerts[0].level, AlertLevel::Warning);
        let confidences: Vec<u8> = snap.matches.iter().map(|v| v.confidence).collect();
        assert_eq!(confidences, vec![90, 60]);
        assert_eq!(snap.upload, UploadStatus::Complete { matches: 2 });
        assert_eq!(snap.stats.matches_found, 2);
    }

    #[tokio::test]
    async fn test_non_image_never_reaches_network() {
        let (dash, backend) = dashboard(FakeBackend::new());
        let upload = ImageUpload {
            bytes: b"hello".to_vec(),
            mime_type: "text/plain".into(),
            file_name: "notes.txt".into(),
        };

        let err = dash.submit(upload).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(dash.alerts()[0].level, AlertLevel::Error);
        assert_eq!(dash.match_count(), 0);
    }

    #[tokio::test]
    async fn test_match_count_sums_only_successful_non_empty_uploads() {
        let backend = FakeBackend::new().with_uploads(vec![
            Ok(vec![m("A", 0.2), m("B", 0.3)]),
            Ok(vec![]),
            Err(BackendError::Server {
                status: 500,
                message: Some("recognizer crashed".into()),
            }),
            Err(BackendError::Network("reset".into())),
            Ok(vec![m("C", 0.05)]),
        ]);
        let (dash, _) = dashboard(backend);

        let mut last = 0;
        for _ in 0..5 {
            let _ = dash.submit(image()).await;
            let now = dash.match_count();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(dash.match_count(), 3);

        let levels: Vec<AlertLevel> = dash.alerts().iter().map(|a| a.level).collect();
        assert_eq!(
            levels,
            vec![
                AlertLevel::Warning,
                AlertLevel::Error,
                AlertLevel::Error,
                AlertLevel::Info,
                AlertLevel::Warning,
            ]
        );
        assert_eq!(dash.alerts()[2].message, "recognizer crashed");
    }

    #[tokio::test]
    async fn test_second_upload_while_in_flight_is_busy() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new().with_uploads(vec![Ok(vec![m("A", 0.1)])]);
        backend.upload_gate = Some(gate.clone());
        let (dash, backend) = dashboard(backend);

        let first = {
            let dash = dash.clone();
            tokio::spawn(async move { dash.submit(image()).await })
        };
        while backend.upload_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dash.snapshot().upload, UploadStatus::Analyzing);

        let second = dash.submit(image()).await;
        assert_eq!(second, Err(UploadError::Busy));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(dash.match_count(), 1);
        assert_eq!(dash.alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_three_failed_polls_stay_offline_without_alerts() {
        let backend = FakeBackend::new().with_health(vec![
            Err(BackendError::Timeout),
            Err(BackendError::Network("refused".into())),
            Err(BackendError::Server {
                status: 502,
                message: None,
            }),
        ]);
        let (dash, _) = dashboard(backend);

        for _ in 0..3 {
            assert!(dash.poll_health().await.is_err());
            assert_eq!(dash.health_state(), HealthState::Offline);
        }
        assert!(dash.alerts().is_empty());
        assert_eq!(dash.stats().scanning_status, crate::stats::ScanningStatus::Offline);
    }

    #[tokio::test]
    async fn test_online_announced_once_per_session() {
        let backend = FakeBackend::new().with_health(vec![
            Ok(HealthStatus {
                status: "running".into(),
            }),
            Err(BackendError::Timeout),
        ]);
        let (dash, _) = dashboard(backend);

        dash.poll_health().await.unwrap();
        dash.poll_health().await.unwrap_err();
        dash.poll_health().await.unwrap();

        let alerts = dash.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "System online and ready");
        assert_eq!(dash.health_state(), HealthState::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_alert_expires() {
        let (dash, _) = dashboard(FakeBackend::new());

        dash.submit(image()).await.unwrap();
        dash.start_surveillance();
        assert_eq!(dash.alerts().len(), 2);

        tokio::time::sleep(INFO_ALERT_TTL - Duration::from_millis(1)).await;
        assert_eq!(dash.alerts().len(), 2);

        tokio::time::sleep(Duration::from_millis(2)).await;
        let alerts = dash.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Error);
        assert!(lock(&dash.inner.state).expiry_timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_info_alert_timer_is_cancelled() {
        let uploads = std::iter::once(Ok(vec![]))
            .chain((0..10).map(|_| Ok(vec![m("A", 0.1)])))
            .collect();
        let (dash, _) = dashboard(FakeBackend::new().with_uploads(uploads));

        dash.submit(image()).await.unwrap();
        let info = dash.alerts()[0].clone();
        assert_eq!(info.level, AlertLevel::Info);
        assert!(lock(&dash.inner.state).expiry_timers.contains_key(&info.id));

        for _ in 0..10 {
            dash.submit(image()).await.unwrap();
        }
        assert!(!lock(&dash.inner.state).expiry_timers.contains_key(&info.id));
        let before: Vec<AlertId> = dash.alerts().iter().map(|a| a.id).collect();
        assert!(!before.contains(&info.id));

        tokio::time::sleep(INFO_ALERT_TTL * 2).await;
        let after = dash.alerts();
        assert_eq!(after.len(), crate::ALERT_FEED_CAPACITY);
        assert!(after.iter().all(|a| a.level == AlertLevel::Warning));
        assert_eq!(after.iter().map(|a| a.id).collect::<Vec<_>>(), before);
    }

    #[tokio::test]
    async fn test_feed_capped_at_ten() {
        let uploads = (0..15)
            .map(|_| Err(BackendError::Network("down".into())))
            .collect();
        let (dash, _) = dashboard(FakeBackend::new().with_uploads(uploads));

        for _ in 0..15 {
            let _ = dash.submit(image()).await;
            assert!(dash.alerts().len() <= crate::ALERT_FEED_CAPACITY);
        }
        assert_eq!(dash.stats().active_alerts, crate::ALERT_FEED_CAPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_polls_periodically_until_shutdown() {
        let (dash, backend) = dashboard(FakeBackend::new());

        dash.start().await;
        assert!(dash.is_monitoring());
        assert_eq!(dash.snapshot().selected_camera.as_deref(), Some("cam1"));
        assert_eq!(backend.health_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(HEALTH_POLL_INTERVAL * 3 + Duration::from_secs(1)).await;
        assert_eq!(backend.health_calls.load(Ordering::SeqCst), 4);

        dash.shutdown();
        tokio::task::yield_now().await;
        assert!(!dash.is_monitoring());
        tokio::time::sleep(HEALTH_POLL_INTERVAL * 5).await;
        assert_eq!(backend.health_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_submit_releases_upload_slot() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new().with_uploads(vec![Ok(vec![m("A", 0.1)])]);
        backend.upload_gate = Some(gate.clone());
        let (dash, backend) = dashboard(backend);

        let cancelled = tokio::time::timeout(Duration::from_millis(50), dash.submit(image())).await;
        assert!(cancelled.is_err());
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dash.snapshot().upload, UploadStatus::Idle);

        gate.notify_one();
        let matches = dash.submit(image()).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 2);
        assert_eq!(dash.match_count(), 1);
    }

    #[tokio::test]
    async fn test_later_upload_replaces_displayed_matches() {
        let backend = FakeBackend::new().with_uploads(vec![
            Ok(vec![m("A", 0.1)]),
            Ok(vec![]),
            Ok(vec![m("B", 0.2)]),
            Err(BackendError::Network("reset".into())),
        ]);
        let (dash, _) = dashboard(backend);

        dash.submit(image()).await.unwrap();
        assert_eq!(dash.snapshot().matches.len(), 1);

        dash.submit(image()).await.unwrap();
        let snap = dash.snapshot();
        assert!(snap.matches.is_empty());
        assert_eq!(snap.upload, UploadStatus::Complete { matches: 0 });

        dash.submit(image()).await.unwrap();
        assert_eq!(dash.snapshot().matches[0].urn, "B");
        dash.submit(image()).await.unwrap_err();
        assert!(dash.snapshot().matches.is_empty());
        assert_eq!(dash.match_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_mutations() {
        let (dash, _) = dashboard(FakeBackend::new());
        let mut rx = dash.subscribe();
        dash.refresh_cameras().await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().stats.active_cameras, 2);

        dash.select_camera(None);
        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.selected_camera, None);
        assert_eq!(snap.stream_url, None);
    }

    #[tokio::test]
    async fn test_surveillance_requires_selection() {
        let (dash, _) = dashboard(FakeBackend::new());
        assert!(!dash.start_surveillance());
        assert_eq!(dash.alerts()[0].message, "Please select a camera first");

        dash.refresh_cameras().await.unwrap();
        dash.stop_surveillance();
        assert!(dash.stream_url().is_none());
        assert!(dash.start_surveillance());
        assert_eq!(dash.stream_url().as_deref(), Some("fake://stream/cam1"));
        assert_eq!(dash.alerts()[0].level, AlertLevel::Success);
    }

    #[tokio::test]
    async fn test_threshold_clamped_and_applied_to_matches() {
        let backend = FakeBackend::new().with_uploads(vec![Ok(vec![m("A", 0.3)])]);
        let (dash, _) = dashboard(backend);
        dash.submit(image()).await.unwrap();
        assert!(!dash.snapshot().matches[0].meets_threshold);

        assert_eq!(dash.set_confidence_threshold(10), 50);
        assert!(dash.snapshot().matches[0].meets_threshold);
        assert_eq!(dash.set_confidence_threshold(250), 100);

        dash.dismiss_matches();
        assert!(dash.snapshot().matches.is_empty());
        assert_eq!(dash.match_count(), 1);
    }
}
