pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod probe;
pub mod reactive;
pub mod render_stats;
pub mod scheduler;
pub mod session;
pub mod surface;
pub mod surface_manager;
pub mod views;

// Public for hosts that want the wgpu-backed provider and surfaces
pub mod renderer;

use std::time::Instant;

use calloop::channel::{Channel, Event as ChannelEvent};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;

use config::GateConfig;
use controller::ResetSource;
use error::AppError;
use gate::GatePhase;
use probe::ContextProvider;
use render_stats::FrameMonitor;
use session::GateSession;
use surface::SurfaceFactory;
use views::{ViewHost, Views};

pub mod prelude {
    pub use crate::config::{ContextOptions, GateConfig, PowerPreference};
    pub use crate::controller::{ResetRequests, ResetSource, RetryHandle};
    pub use crate::error::{AppError, ContextErrorCode, GateError};
    pub use crate::gate::{
        Gate, GateEvent, GatePhase, GateState, Generation, Outcome, Support, Tagged,
    };
    pub use crate::probe::{CapabilityProbe, ContextInfo, ContextProvider, ProbeReport, Tier};
    pub use crate::reactive::{batch, create_effect, create_signal, Effect, ReadSignal, Signal};
    pub use crate::renderer::{WgpuProvider, WgpuSurfaceFactory};
    pub use crate::session::GateSession;
    pub use crate::surface::{
        CreationError, Listener, ListenerSet, LostEvent, Subscription, Surface, SurfaceFactory,
        SurfaceId, SurfaceRequest, SurfaceSignal,
    };
    pub use crate::views::{Presentation, View, ViewHost, ViewProps, Views};
    pub use crate::App;
}

/// Per-loop state handed to every calloop callback.
struct RunState {
    session: GateSession,
    frames: FrameMonitor,
    last_tick: Instant,
    was_ready: bool,
}

impl RunState {
    fn tick(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        self.session.paint_settled();
        self.session.advance(elapsed);

        let ready = self.session.phase() == GatePhase::Ready;
        if ready {
            if !self.was_ready {
                self.frames.restart(now);
            }
            self.frames.update(now);
        }
        self.was_ready = ready;
    }
}

/// Runs a gate session on a calloop event loop.
///
/// # Example
/// ```ignore
/// let (reload_tx, reload_rx) = calloop::channel::channel();
/// watch_assets(move || reload_tx.send(()).ok());
///
/// App::new()
///     .hot_reload(reload_rx)
///     .run(WgpuProvider, WgpuSurfaceFactory::new(), views)?;
/// ```
pub struct App {
    config: GateConfig,
    hot_reload: Option<Channel<()>>,
    exit: Option<Channel<()>>,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(GateConfig::default())
    }

    pub fn with_config(config: GateConfig) -> Self {
        Self {
            config,
            hot_reload: None,
            exit: None,
        }
    }

    pub fn config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Every message on `channel` resets the gate as a hot reload.
    pub fn hot_reload(mut self, channel: Channel<()>) -> Self {
        self.hot_reload = Some(channel);
        self
    }

    /// Stop the loop on the first message on `channel` (or when its sender
    /// goes away).
    pub fn exit_on(mut self, channel: Channel<()>) -> Self {
        self.exit = Some(channel);
        self
    }

    pub fn run(
        self,
        provider: impl ContextProvider + 'static,
        factory: impl SurfaceFactory + 'static,
        views: Views,
    ) -> Result<(), AppError> {
        // A host that already installed a logger keeps it
        let _ = env_logger::try_init();

        let mut event_loop: EventLoop<'static, RunState> = EventLoop::try_new()?;
        let handle = event_loop.handle();

        let session = GateSession::new(self.config.clone(), provider, factory);
        let _host = ViewHost::attach(views, session.watch(), session.retry_handle());

        let interval = self.config.frame_interval;
        handle
            .insert_source(Timer::immediate(), move |deadline, _, state: &mut RunState| {
                state.tick(deadline);
                TimeoutAction::ToDuration(interval)
            })
            .map_err(|e| AppError::Source(format!("frame timer: {}", e.error)))?;

        if let Some(channel) = self.hot_reload {
            let requests = session.requests();
            handle
                .insert_source(channel, move |event, _, _: &mut RunState| {
                    if let ChannelEvent::Msg(()) = event {
                        requests.request(ResetSource::HotReload);
                    }
                })
                .map_err(|e| AppError::Source(format!("hot reload channel: {}", e.error)))?;
        }

        if let Some(channel) = self.exit {
            let signal = event_loop.get_signal();
            handle
                .insert_source(channel, move |_, _, _: &mut RunState| {
                    log::info!("Exit requested");
                    signal.stop();
                })
                .map_err(|e| AppError::Source(format!("exit channel: {}", e.error)))?;
        }

        let now = Instant::now();
        let mut state = RunState {
            session,
            frames: FrameMonitor::new(now),
            last_tick: now,
            was_ready: false,
        };

        event_loop.run(interval, &mut state, |state| state.session.pump())?;

        log::info!(
            "Event loop finished after {} reset(s) in {:?}",
            state.session.resets(),
            state.session.phase()
        );
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
