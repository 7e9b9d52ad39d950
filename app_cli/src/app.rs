use crate::ui;
use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEventKind};
use log::{debug, error, info, warn};
use network::{
    HttpTokenProvider, MicrophoneSource, SimulatedRoom, StaticTokenProvider, TokenProvider,
};
use ratatui::backend::Backend;
use ratatui::Terminal;
use room::{Layout, PanelNames, TrackRouter};
use room_core::{ConnectionState, RoomEvent, SlotId};
use session::{SessionController, SessionNotice};
use settings_manager::Settings;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use visualization::{Scene, VisualizationPipeline};

pub type Controller = SessionController<SimulatedRoom, Box<dyn TokenProvider>>;

const ACTIVITY_LINES: usize = 6;

/// App state
pub struct App {
    pub(crate) should_quit: bool,
    pub(crate) controller: Controller,
    notices: mpsc::UnboundedReceiver<SessionNotice>,
    pub(crate) scene: watch::Receiver<Scene>,
    pub(crate) state: ConnectionState,
    pub(crate) status_message: Option<String>,
    pub(crate) activity: VecDeque<String>,
    redraw_interval: Duration,
}

impl App {
    pub fn new(settings: &Settings) -> Self {
        let identity = settings.participant_identity();
        let tokens: Box<dyn TokenProvider> = if settings.simulation.enabled {
            Box::new(StaticTokenProvider::new("sim://local", "simulated"))
        } else {
            Box::new(HttpTokenProvider::new(settings.token_endpoint.clone()))
        };
        let room = SimulatedRoom::new(simulated_roster(settings.layout, &settings.specialist_names))
            .with_timing(settings.simulation.timing());
        let room = with_microphone(room, settings);

        let visualization = settings.visualization.to_config();
        let redraw_interval = visualization.frame_interval.max(Duration::from_millis(33));
        let pipeline = VisualizationPipeline::new(visualization);
        let router = TrackRouter::for_layout(settings.layout, &settings.specialist_names);

        let (controller, notices) = SessionController::new(
            room,
            tokens,
            router,
            pipeline,
            settings.room_name.clone(),
            identity,
        );
        let scene = controller.watch_scene();

        Self {
            should_quit: false,
            controller,
            notices,
            scene,
            state: ConnectionState::Idle,
            status_message: None,
            activity: VecDeque::with_capacity(ACTIVITY_LINES),
            redraw_interval,
        }
    }

    /// Handle input events
    pub async fn handle_event(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.kind == KeyEventKind::Release {
            return Ok(());
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') => {
                if let Err(e) = self.controller.connect().await {
                    // Failed attempts already reported their message through a notice
                    debug!("Connect failed: {}", e);
                }
            }
            KeyCode::Char('d') => self.controller.disconnect().await?,
            KeyCode::Char('m') => match self.controller.toggle_microphone().await {
                Ok(enabled) => {
                    self.push_activity(if enabled { "Microphone on" } else { "Microphone muted" })
                }
                Err(e) => {
                    warn!("Microphone toggle failed: {}", e);
                    self.status_message = Some(e.user_message());
                }
            },
            _ => {}
        }
        Ok(())
    }

    pub fn on_notice(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::ConnectionChanged { state, message } => {
                self.state = state;
                self.status_message = message;
            }
            SessionNotice::Room(RoomEvent::PresenceChanged { slot, status }) => {
                let name = self.slot_name(slot);
                self.push_activity(&format!("{} is {}", name, status));
            }
            SessionNotice::Room(RoomEvent::SlotContentChanged(slot)) => {
                debug!("Slot {} content changed", slot);
            }
            SessionNotice::Room(RoomEvent::AudioSinkChanged { elements }) => {
                debug!("{} remote audio tracks playing", elements);
            }
        }
    }

    fn drain_notices(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            self.on_notice(notice);
        }
    }

    fn slot_name(&self, slot: SlotId) -> String {
        self.controller
            .router()
            .registry()
            .placeholder(slot)
            .map(|placeholder| placeholder.display_name.clone())
            .unwrap_or_else(|| slot.to_string())
    }

    fn push_activity(&mut self, line: &str) {
        if self.activity.len() == ACTIVITY_LINES {
            self.activity.pop_front();
        }
        self.activity.push_back(line.to_string());
    }

    /// Main loop: keys, session events and notices until the user quits.
    pub async fn run<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        mut keys: mpsc::UnboundedReceiver<Event>,
    ) -> Result<()> {
        let mut redraw = tokio::time::interval(self.redraw_interval);
        redraw.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            self.drain_notices();
            terminal.draw(|f| ui::draw(f, self))?;

            if self.should_quit {
                break;
            }

            let has_session = self.controller.session().is_some();
            tokio::select! {
                Some(event) = keys.recv() => {
                    if let Err(e) = self.handle_event(event).await {
                        error!("Error handling input: {}", e);
                    }
                }
                Some(notice) = self.notices.recv() => self.on_notice(notice),
                Some(event) = self.controller.next_event(), if has_session => {
                    self.controller.dispatch(event).await;
                }
                _ = redraw.tick() => {}
            }
        }

        if self.controller.session().is_some() {
            info!("Leaving session before exit");
            self.controller.disconnect().await?;
        }
        Ok(())
    }
}

/// Identities the simulated room joins with, one per slot of `layout`.
pub fn simulated_roster(layout: Layout, names: &PanelNames) -> Vec<String> {
    match layout {
        Layout::Single => vec!["agent".to_string()],
        Layout::Panel => vec![
            format!("{}-host", names.host.to_lowercase()),
            format!("{}-marketing", names.marketing.to_lowercase()),
            format!("{}-finance", names.finance.to_lowercase()),
            format!("{}-product", names.product.to_lowercase()),
            format!("{}-legal", names.legal.to_lowercase()),
        ],
    }
}

#[cfg(feature = "capture")]
fn with_microphone(room: SimulatedRoom, settings: &Settings) -> SimulatedRoom {
    let device = Some(settings.microphone_device.trim().to_string()).filter(|d| !d.is_empty());
    room.with_microphone(move || {
        let capture = audio_io::capture::MicrophoneCapture::start(
            device.as_deref(),
            visualization::FFT_SIZE * 4,
        )?;
        Ok(MicrophoneSource::new(capture.tap()).keep_alive(capture))
    })
}

#[cfg(not(feature = "capture"))]
fn with_microphone(room: SimulatedRoom, settings: &Settings) -> SimulatedRoom {
    if !settings.microphone_device.is_empty() {
        warn!("Built without capture support, ignoring microphone_device");
    }
    room.with_microphone(|| {
        Ok(MicrophoneSource::new(std::sync::Arc::new(
            audio_io::ToneTap::default(),
        )))
    })
}
