use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisClient, PostureAnalysis};
use crate::error::AnalysisFailure;
use crate::intake::FrameSource;
use crate::notify::CompletionCue;
use crate::pipeline::auto_capture::AutoCaptureTimer;
use crate::pipeline::preview::{PreviewFrame, PreviewPump};
use crate::pipeline::state::{CaptureState, DevicePhase};
use crate::pipeline::store::{ResultStore, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    Manual,
    Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Completed(PostureAnalysis),
    Failed(AnalysisFailure),
    Skipped(SkipReason),
}

const PREVIEW_WIDTH: u32 = 640;
const PREVIEW_HEIGHT: u32 = 480;

pub(crate) struct Inner {
    frame_source: Arc<tokio::sync::Mutex<FrameSource>>,
    client: AnalysisClient,
    store: ResultStore,
    cue: Arc<dyn CompletionCue>,
    auto_interval: Duration,
    auto_timer: Mutex<Option<AutoCaptureTimer>>,
    preview_tx: watch::Sender<Option<PreviewFrame>>,
    preview_pump: Mutex<Option<PreviewPump>>,
}

/// Gates captures so that at most one analysis call is in flight, whether
/// triggered by the user or by the auto-capture timer.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
}

impl CaptureOrchestrator {
    pub fn new(
        frame_source: FrameSource,
        client: AnalysisClient,
        store: ResultStore,
        cue: Arc<dyn CompletionCue>,
        auto_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                frame_source: Arc::new(tokio::sync::Mutex::new(frame_source)),
                client,
                store,
                cue,
                auto_interval,
                auto_timer: Mutex::new(None),
                preview_tx: watch::Sender::new(None),
                preview_pump: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.inner.store.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        self.inner.store.snapshot()
    }

    pub fn subscribe_preview(&self) -> watch::Receiver<Option<PreviewFrame>> {
        self.inner.preview_tx.subscribe()
    }

    pub fn auto_interval(&self) -> Duration {
        self.inner.auto_interval
    }

    /// Requests camera access. Ends in `Active` or `PermissionDenied`; a call
    /// while a request is pending or the device is active changes nothing.
    pub async fn open_device(&self) -> DevicePhase {
        let store = &self.inner.store;
        if !store.begin_device_request() {
            return store.snapshot().device_phase;
        }
        let result = self.inner.frame_source.lock().await.open().await;
        let phase = match result {
            Ok(()) => DevicePhase::Active,
            Err(e) => {
                warn!("Camera unavailable: {}", e);
                DevicePhase::PermissionDenied
            }
        };
        store.set_phase(phase);
        phase
    }

    /// Explicit user retry after a denial; resets the phase to `Requesting`
    /// before asking again.
    pub async fn retry_device(&self) -> DevicePhase {
        let phase = self.inner.store.snapshot().device_phase;
        if phase != DevicePhase::PermissionDenied {
            debug!("Retry ignored in phase {:?}", phase);
            return phase;
        }
        info!("Retrying camera access");
        self.open_device().await
    }

    /// Runs one capture -> analyse -> record sequence, or skips it when the
    /// gate is closed. Never retries.
    pub async fn capture_now(&self, trigger: CaptureTrigger) -> CaptureOutcome {
        let store = &self.inner.store;
        let state = store.snapshot();
        if trigger == CaptureTrigger::Auto && !state.auto_capture_enabled {
            return CaptureOutcome::Skipped(SkipReason::AutoCaptureDisabled);
        }
        if state.in_flight {
            debug!("{:?} capture skipped: analysis in flight", trigger);
            return CaptureOutcome::Skipped(SkipReason::InFlight);
        }
        if state.device_phase != DevicePhase::Active {
            debug!("{:?} capture skipped: device {:?}", trigger, state.device_phase);
            return CaptureOutcome::Skipped(SkipReason::DeviceNotActive);
        }

        let source = self.inner.frame_source.clone().lock_owned().await;
        let sampled = tokio::task::spawn_blocking(move || {
            let mut source = source;
            source.capture()
        })
        .await;
        let snapshot = match sampled {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return CaptureOutcome::Skipped(SkipReason::NoImage),
            Err(e) => {
                warn!("Frame capture task failed: {}", e);
                return CaptureOutcome::Skipped(SkipReason::NoImage);
            }
        };

        if let Err(reason) = store.try_begin_analysis() {
            debug!("{:?} capture skipped: {:?}", trigger, reason);
            return CaptureOutcome::Skipped(reason);
        }
        let mut slot = InFlightSlot::new(store);
        info!("{:?} capture {} sent for analysis", trigger, snapshot.id());

        match self.inner.client.analyze(snapshot).await {
            Ok(analysis) => {
                slot.complete();
                store.complete_success(analysis.clone(), Utc::now());
                self.inner.cue.play();
                CaptureOutcome::Completed(analysis)
            }
            Err(failure) => {
                slot.complete();
                store.complete_failure(failure.message());
                CaptureOutcome::Failed(failure)
            }
        }
    }

    /// Turning auto capture off stops future ticks; a call already in flight
    /// still completes.
    pub fn set_auto_capture(&self, enabled: bool) {
        let mut timer = self
            .inner
            .auto_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.store.set_auto_capture(enabled);
        match (enabled, timer.is_some()) {
            (true, false) => {
                *timer = Some(AutoCaptureTimer::start(
                    Arc::downgrade(&self.inner),
                    self.inner.auto_interval,
                ));
            }
            (false, true) => {
                if let Some(timer) = timer.take() {
                    timer.stop();
                }
                info!("Auto capture disabled");
            }
            _ => {}
        }
    }

    /// Starts publishing live frames on [`Self::subscribe_preview`]. Calling
    /// it again while running changes nothing.
    pub fn start_preview(&self, period: Duration) {
        let mut pump = self
            .inner
            .preview_pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pump.is_none() {
            *pump = Some(PreviewPump::start(Arc::downgrade(&self.inner), period));
        }
    }

    fn stop_preview(&self) {
        let pump = self
            .inner
            .preview_pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            pump.stop();
        }
        self.inner.preview_tx.send_replace(None);
    }

    /// Publishes one preview frame. Skipped while the camera is inactive or
    /// busy with a capture; returns whether a frame was published.
    pub async fn refresh_preview(&self) -> bool {
        if self.inner.store.snapshot().device_phase != DevicePhase::Active {
            return false;
        }
        let Ok(source) = self.inner.frame_source.clone().try_lock_owned() else {
            return false;
        };
        let sampled = tokio::task::spawn_blocking(move || {
            let mut source = source;
            source.preview(PREVIEW_WIDTH, PREVIEW_HEIGHT)
        })
        .await;
        let Ok(Some(image)) = sampled else {
            return false;
        };
        let image = Arc::new(image);
        self.inner.preview_tx.send_modify(|slot| {
            let sequence = slot.as_ref().map_or(1, |frame| frame.sequence + 1);
            *slot = Some(PreviewFrame { sequence, image });
        });
        true
    }

    /// Stops the timers and releases the camera. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.set_auto_capture(false);
        self.stop_preview();
        self.inner.frame_source.lock().await.close();
        self.inner.store.set_phase(DevicePhase::Idle);
    }
}

/// Frees the in-flight slot if the capture future is dropped mid-call.
struct InFlightSlot<'a> {
    store: &'a ResultStore,
    completed: bool,
}

impl<'a> InFlightSlot<'a> {
    fn new(store: &'a ResultStore) -> Self {
        Self {
            store,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.store.abandon_analysis();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PostureStatus;
    use crate::analysis::client::tests::{GOOD_RESPONSE, ScriptedEndpoint};
    use crate::intake::frame_source::tests::{ScriptedDevice, source_for};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingCue {
        plays: AtomicUsize,
    }

    impl CompletionCue for CountingCue {
        fn play(&self) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        orchestrator: CaptureOrchestrator,
        endpoint: Arc<ScriptedEndpoint>,
        device: ScriptedDevice,
        cue: Arc<CountingCue>,
    }

    fn harness(device: ScriptedDevice, endpoint: ScriptedEndpoint) -> Harness {
        let endpoint = Arc::new(endpoint);
        let cue = Arc::new(CountingCue::default());
        let orchestrator = CaptureOrchestrator::new(
            source_for(device.clone()),
            AnalysisClient::new(endpoint.clone()),
            ResultStore::new(),
            cue.clone(),
            Duration::from_secs(10),
        );
        Harness {
            orchestrator,
            endpoint,
            device,
            cue,
        }
    }

    #[tokio::test]
    async fn manual_capture_records_result_and_plays_cue_once() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        assert_eq!(h.orchestrator.open_device().await, DevicePhase::Active);

        let outcome = h.orchestrator.capture_now(CaptureTrigger::Manual).await;
        let expected = PostureAnalysis::from_json(GOOD_RESPONSE).unwrap();
        assert_eq!(outcome, CaptureOutcome::Completed(expected.clone()));

        let state = h.orchestrator.state();
        assert_eq!(state.last_result, Some(expected));
        assert_eq!(state.last_result.as_ref().unwrap().status, PostureStatus::Good);
        assert!(state.last_run.is_some());
        assert_eq!(state.last_error, None);
        assert!(!state.in_flight);
        assert_eq!(h.cue.plays.load(Ordering::SeqCst), 1);

        let requests = h.endpoint.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].instruction, crate::analysis::prompt::INSTRUCTION);
        assert!(!requests[0].image_base64.starts_with("data:"));
    }

    #[tokio::test]
    async fn denied_device_blocks_capture_until_retry() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            ScriptedDevice::denying().gated(gate.clone()),
            ScriptedEndpoint::good(),
        );

        gate.notify_one();
        assert_eq!(h.orchestrator.open_device().await, DevicePhase::PermissionDenied);

        let outcome = h.orchestrator.capture_now(CaptureTrigger::Manual).await;
        assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::DeviceNotActive));
        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 0);

        // access is granted on the retry
        h.device.grant.store(true, Ordering::SeqCst);
        let orchestrator = h.orchestrator.clone();
        let retry = tokio::spawn(async move { orchestrator.retry_device().await });
        tokio::task::yield_now().await;
        assert_eq!(h.orchestrator.state().device_phase, DevicePhase::Requesting);

        gate.notify_one();
        assert_eq!(retry.await.unwrap(), DevicePhase::Active);
        assert_eq!(h.device.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_is_ignored_unless_denied() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;
        assert_eq!(h.orchestrator.retry_device().await, DevicePhase::Active);
        assert_eq!(h.device.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_then_success_round_trip() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;
        h.orchestrator.capture_now(CaptureTrigger::Manual).await;
        let first = h.orchestrator.state();

        h.endpoint.set_reply(Ok(None));
        let outcome = h.orchestrator.capture_now(CaptureTrigger::Manual).await;
        assert_eq!(
            outcome,
            CaptureOutcome::Failed(AnalysisFailure::new("No response from AI"))
        );
        let failed = h.orchestrator.state();
        assert_eq!(failed.last_error.as_deref(), Some("No response from AI"));
        assert_eq!(failed.last_result, first.last_result);
        assert_eq!(failed.last_run, first.last_run);
        assert!(!failed.in_flight);
        assert_eq!(h.cue.plays.load(Ordering::SeqCst), 1);

        h.endpoint.set_reply(Ok(Some(
            r#"{"score":55,"status":"Poor","issues":["Head forward"],"recommendations":["Raise your monitor"],"summary":"Sit back."}"#
                .to_string(),
        )));
        h.orchestrator.capture_now(CaptureTrigger::Manual).await;
        let recovered = h.orchestrator.state();
        assert_eq!(recovered.last_error, None);
        assert_eq!(recovered.last_result.as_ref().map(|r| r.score), Some(55));
        assert!(recovered.last_run >= first.last_run);
        assert_eq!(h.cue.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_manual_triggers_share_one_call() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            ScriptedDevice::granting(),
            ScriptedEndpoint::good().gated(gate.clone()),
        );
        h.orchestrator.open_device().await;

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let orchestrator = h.orchestrator.clone();
                tokio::spawn(async move { orchestrator.capture_now(CaptureTrigger::Manual).await })
            })
            .collect();

        // the call stays open until every other trigger has been turned away
        while attempts.iter().filter(|a| a.is_finished()).count() < 15 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 1);
        gate.notify_one();

        let outcomes = futures::future::join_all(attempts).await;
        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(CaptureOutcome::Completed(_))))
            .count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(CaptureOutcome::Skipped(SkipReason::InFlight))))
            .count();
        assert_eq!((completed, skipped), (1, 15));
        assert_eq!(h.endpoint.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 1);
        assert!(!h.orchestrator.state().in_flight);
    }

    #[tokio::test]
    async fn slow_frame_reads_do_not_stall_the_runtime() {
        let h = harness(
            ScriptedDevice::granting().slow(Duration::from_millis(300)),
            ScriptedEndpoint::good(),
        );
        h.orchestrator.open_device().await;

        let orchestrator = h.orchestrator.clone();
        let capture = tokio::spawn(async move { orchestrator.capture_now(CaptureTrigger::Manual).await });
        let started = std::time::Instant::now();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(250));

        assert!(matches!(capture.await.unwrap(), CaptureOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn preview_is_published_only_while_the_camera_is_active() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        let preview = h.orchestrator.subscribe_preview();
        assert!(!h.orchestrator.refresh_preview().await);
        assert!(preview.borrow().is_none());

        h.orchestrator.open_device().await;
        assert!(h.orchestrator.refresh_preview().await);
        assert!(h.orchestrator.refresh_preview().await);
        {
            let frame = preview.borrow();
            let frame = frame.as_ref().expect("preview frame");
            assert_eq!(frame.sequence, 2);
            assert_eq!(frame.image.dimensions(), (16, 9));
        }

        h.orchestrator.shutdown().await;
        assert!(preview.borrow().is_none());
        assert!(!h.orchestrator.refresh_preview().await);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_pump_keeps_the_feed_moving() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;
        h.orchestrator.start_preview(Duration::from_millis(100));
        h.orchestrator.start_preview(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(450)).await;
        let sequence = h
            .orchestrator
            .subscribe_preview()
            .borrow()
            .as_ref()
            .map(|frame| frame.sequence);
        assert!(sequence >= Some(4));
        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 0);
        h.orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn auto_tick_during_a_call_is_skipped() {
        let h = harness(
            ScriptedDevice::granting(),
            ScriptedEndpoint::good().with_delay(Duration::from_secs(15)),
        );
        h.orchestrator.open_device().await;
        let start = tokio::time::Instant::now();

        h.orchestrator.set_auto_capture(true);
        tokio::time::sleep(Duration::from_secs(31)).await;

        let offsets: Vec<u64> = h
            .endpoint
            .started_at
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        assert_eq!(offsets, vec![10, 30]);
        assert_eq!(h.endpoint.max_in_flight.load(Ordering::SeqCst), 1);
        h.orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_and_auto_triggers_never_overlap() {
        let h = harness(
            ScriptedDevice::granting(),
            ScriptedEndpoint::good().with_delay(Duration::from_secs(15)),
        );
        h.orchestrator.open_device().await;
        let start = tokio::time::Instant::now();
        h.orchestrator.set_auto_capture(true);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let orchestrator = h.orchestrator.clone();
        let manual = tokio::spawn(async move { orchestrator.capture_now(CaptureTrigger::Manual).await });

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(matches!(manual.await.unwrap(), CaptureOutcome::Completed(_)));

        let offsets: Vec<u64> = h
            .endpoint
            .started_at
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        // manual at 3s runs until 18s, so the 10s tick is dropped
        assert_eq!(offsets, vec![3, 20]);
        assert_eq!(h.endpoint.max_in_flight.load(Ordering::SeqCst), 1);
        h.orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_auto_off_before_first_tick_captures_nothing() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;

        h.orchestrator.set_auto_capture(true);
        h.orchestrator.set_auto_capture(false);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 0);
        assert!(!h.orchestrator.state().auto_capture_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_auto_lets_in_flight_call_finish() {
        let h = harness(
            ScriptedDevice::granting(),
            ScriptedEndpoint::good().with_delay(Duration::from_secs(5)),
        );
        h.orchestrator.open_device().await;
        h.orchestrator.set_auto_capture(true);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(h.orchestrator.state().in_flight);
        h.orchestrator.set_auto_capture(false);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let state = h.orchestrator.state();
        assert!(!state.in_flight);
        assert!(state.last_result.is_some());
        assert_eq!(h.endpoint.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_trigger_is_ignored_when_auto_mode_is_off() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;
        let outcome = h.orchestrator.capture_now(CaptureTrigger::Auto).await;
        assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::AutoCaptureDisabled));
    }

    #[tokio::test]
    async fn shutdown_releases_the_camera_once() {
        let h = harness(ScriptedDevice::granting(), ScriptedEndpoint::good());
        h.orchestrator.open_device().await;
        h.orchestrator.set_auto_capture(true);

        h.orchestrator.shutdown().await;
        h.orchestrator.shutdown().await;
        drop(h.orchestrator);

        assert_eq!(h.device.releases.load(Ordering::SeqCst), 1);
    }
}
