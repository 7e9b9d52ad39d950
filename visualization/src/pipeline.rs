//! The per-frame render loop.
//!
//! One task per connected session: every frame it checks that the session is
//! still connected and not cancelled, samples the local microphone, and
//! publishes a fresh [`Scene`] on the canvas channel.

use crate::analyser::Analyser;
use crate::scene::{render, Scene, VisualizationStyle};
use audio_io::SampleTap;
use log::{debug, error, info, warn};
use room_core::ConnectionState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationConfig {
    pub style: VisualizationStyle,
    pub frame_interval: Duration,
    pub ray_count: usize,
    pub width: f32,
    pub height: f32,
}

/// Shortest frame period a render loop runs at.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            style: VisualizationStyle::Radial,
            frame_interval: Duration::from_millis(16),
            ray_count: 64,
            width: 400.0,
            height: 400.0,
        }
    }
}

/// Owns the live canvas and starts render loops that draw into it.
pub struct VisualizationPipeline {
    config: VisualizationConfig,
    canvas: Arc<watch::Sender<Scene>>,
}

impl VisualizationPipeline {
    pub fn new(mut config: VisualizationConfig) -> Self {
        if config.frame_interval < MIN_FRAME_INTERVAL {
            warn!(
                "Frame interval {:?} too short, using {:?}",
                config.frame_interval, MIN_FRAME_INTERVAL
            );
            config.frame_interval = MIN_FRAME_INTERVAL;
        }
        let (canvas, _) = watch::channel(Scene::empty(config.width, config.height));
        Self {
            config,
            canvas: Arc::new(canvas),
        }
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Receiver for the live canvas. Stays valid across sessions.
    pub fn subscribe(&self) -> watch::Receiver<Scene> {
        self.canvas.subscribe()
    }

    /// Start drawing from `tap` for as long as `state` reads `Connected`.
    ///
    /// Without a tap nothing is started and `None` is returned.
    pub fn start(
        &self,
        tap: Option<Arc<dyn SampleTap>>,
        state: watch::Receiver<ConnectionState>,
    ) -> Option<VisualizationHandle> {
        let Some(tap) = tap else {
            warn!("No local microphone track available, visualization not started");
            return None;
        };

        let cancel = CancellationToken::new();
        let frames = Arc::new(AtomicU64::new(0));
        let render_loop = RenderLoop {
            analyser: Analyser::new(),
            tap,
            state,
            canvas: self.canvas.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            frames: frames.clone(),
        };

        info!(
            "Starting {:?} visualization at {:?} per frame",
            self.config.style, self.config.frame_interval
        );
        let task = tokio::spawn(render_loop.run());

        Some(VisualizationHandle {
            cancel,
            task: Some(task),
            frames,
            scenes: self.canvas.subscribe(),
        })
    }
}

impl Default for VisualizationPipeline {
    fn default() -> Self {
        Self::new(VisualizationConfig::default())
    }
}

struct RenderLoop {
    analyser: Analyser,
    tap: Arc<dyn SampleTap>,
    state: watch::Receiver<ConnectionState>,
    canvas: Arc<watch::Sender<Scene>>,
    config: VisualizationConfig,
    cancel: CancellationToken,
    frames: Arc<AtomicU64>,
}

impl RenderLoop {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Visualization cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if self.cancel.is_cancelled() {
                debug!("Visualization cancelled");
                break;
            }
            if self.state.has_changed().is_err() {
                debug!("Connection state channel closed, stopping visualization");
                break;
            }
            let state = *self.state.borrow_and_update();
            if state != ConnectionState::Connected {
                debug!("Connection is {:?}, stopping visualization", state);
                break;
            }

            let bins = self.analyser.sample(self.tap.as_ref());
            let scene = render(
                self.config.style,
                bins,
                self.config.width,
                self.config.height,
                self.config.ray_count,
            );
            self.canvas.send_replace(scene);
            self.frames.fetch_add(1, Ordering::Relaxed);
        }

        self.canvas
            .send_replace(Scene::empty(self.config.width, self.config.height));
        debug!(
            "Visualization stopped after {} frames",
            self.frames.load(Ordering::Relaxed)
        );
    }
}

/// Handle on a running render loop. Dropping it cancels the loop.
pub struct VisualizationHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    frames: Arc<AtomicU64>,
    scenes: watch::Receiver<Scene>,
}

impl VisualizationHandle {
    pub fn is_active(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Ask the loop to stop at its next check.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to finish.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Visualization task failed: {}", e);
            }
        }
    }

    pub fn scenes(&self) -> watch::Receiver<Scene> {
        self.scenes.clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl Drop for VisualizationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_io::ToneTap;
    use std::time::Instant;
    use tokio::time::{sleep, timeout};

    fn fast_pipeline(style: VisualizationStyle) -> VisualizationPipeline {
        VisualizationPipeline::new(VisualizationConfig {
            style,
            frame_interval: Duration::from_millis(5),
            ray_count: 16,
            width: 200.0,
            height: 100.0,
        })
    }

    async fn wait_for_frames(handle: &VisualizationHandle, count: u64) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.frames_rendered() < count {
            assert!(Instant::now() < deadline, "no frames rendered");
            sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn no_tap_starts_nothing() {
        let pipeline = fast_pipeline(VisualizationStyle::Radial);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        assert!(pipeline.start(None, state_rx).is_none());
    }

    #[test_log::test(tokio::test)]
    async fn draws_while_connected_and_stops_on_disconnect() {
        let pipeline = fast_pipeline(VisualizationStyle::Radial);
        let canvas = pipeline.subscribe();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let tap: Arc<dyn SampleTap> = Arc::new(ToneTap::default());

        let handle = pipeline.start(Some(tap), state_rx).unwrap();
        wait_for_frames(&handle, 3).await;
        assert!(handle.is_active());
        {
            let scene = canvas.borrow();
            // orb plus one ray per indicator
            assert_eq!(scene.shapes.len(), 17);
            assert!(scene.pulse > 0.0);
        }

        state_tx.send_replace(ConnectionState::Disconnected);
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("loop should exit after disconnect");
        assert!(canvas.borrow().shapes.is_empty());
    }

    #[tokio::test]
    async fn zero_frame_interval_is_clamped() {
        let pipeline = VisualizationPipeline::new(VisualizationConfig {
            frame_interval: Duration::ZERO,
            ..VisualizationConfig::default()
        });
        assert_eq!(pipeline.config().frame_interval, MIN_FRAME_INTERVAL);

        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let tap: Arc<dyn SampleTap> = Arc::new(ToneTap::default());
        let handle = pipeline.start(Some(tap), state_rx).unwrap();
        wait_for_frames(&handle, 2).await;
        handle.stop();
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("loop should exit after cancel");
    }

    #[tokio::test]
    async fn stop_cancels_the_loop() {
        let pipeline = fast_pipeline(VisualizationStyle::Bars);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let tap: Arc<dyn SampleTap> = Arc::new(ToneTap::default());

        let handle = pipeline.start(Some(tap), state_rx).unwrap();
        wait_for_frames(&handle, 1).await;
        assert_eq!(handle.scenes().borrow().shapes.len(), 128);

        handle.stop();
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("loop should exit after cancel");
    }

    #[tokio::test]
    async fn never_draws_when_not_connected() {
        let pipeline = fast_pipeline(VisualizationStyle::Radial);
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let tap: Arc<dyn SampleTap> = Arc::new(ToneTap::default());

        let handle = pipeline.start(Some(tap), state_rx).unwrap();
        let frames = handle.frames.clone();
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("loop should exit immediately");
        assert_eq!(frames.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn dropped_state_sender_ends_the_loop() {
        let pipeline = fast_pipeline(VisualizationStyle::Radial);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let tap: Arc<dyn SampleTap> = Arc::new(ToneTap::default());

        let handle = pipeline.start(Some(tap), state_rx).unwrap();
        drop(state_tx);
        timeout(Duration::from_secs(2), handle.join())
            .await
            .expect("loop should exit once the state sender is gone");
    }
}
