use ab_glyph::FontArc;
use anyhow::{Context, Result, anyhow};
use iat_core::{ExperimentRunConfig, LEFT_KEY, RIGHT_KEY};
use iat_experiment::{Effect, JsonFileSink, Run, RunPhase, begin_run, load_definition};
use iat_render::{Scene, SkiaRenderer};
use iat_timing::{Clock, MonotonicClock};
use pixels::{Pixels, SurfaceTexture};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::Args;

type LiveRun = Run<MonotonicClock, StdRng, JsonFileSink>;

/// Browser-style key code for a physical key. Only the two arrows answer a
/// trial; everything else is passed through so the run can ignore it.
pub fn key_code(code: KeyCode) -> u32 {
    match code {
        KeyCode::ArrowLeft => LEFT_KEY,
        KeyCode::ArrowRight => RIGHT_KEY,
        KeyCode::ArrowUp => 38,
        KeyCode::ArrowDown => 40,
        KeyCode::Space => 32,
        KeyCode::Enter => 13,
        _ => 0,
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    font: FontArc,
    clock: MonotonicClock,
    // Consumed when the first window comes up.
    pending: Option<(ExperimentRunConfig, StdRng)>,
    run: Option<LiveRun>,
    output: PathBuf,
    windowed: bool,
    // "Incorrect" notice showing until the next display.
    incorrect: bool,
    should_exit: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = load_definition(&args.experiment, args.participant.as_str())
            .with_context(|| format!("loading {}", args.experiment.display()))?;
        info!(
            experiment = config.experiment,
            participant = %config.participant,
            blocks = config.blocks.len(),
            trials = config.total_trials(),
            "experiment definition loaded"
        );

        let bytes = fs::read(&args.font)
            .with_context(|| format!("reading font {}", args.font.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {e}", args.font.display()))?;

        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            window: None,
            pixels: None,
            renderer: None,
            font,
            clock: MonotonicClock::new(),
            pending: Some((config, rng)),
            run: None,
            output: args.output,
            windowed: args.windowed,
            incorrect: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "press the left or right arrow to answer, ESC to abort"
        );
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        let mut attributes = Window::default_attributes().with_title("IAT");
        if self.windowed {
            attributes = attributes.with_inner_size(PhysicalSize::new(1280, 720));
        } else {
            attributes = attributes
                .with_fullscreen(Some(Fullscreen::Borderless(Some(monitor.clone()))))
                .with_resizable(false);
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale = window.scale_factor(),
            refresh_hz = monitor.refresh_rate_millihertz().map(|mhz| mhz as f64 / 1000.0),
            "display ready"
        );

        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        self.pixels = Some(Pixels::new(size.width, size.height, surface)?);
        self.renderer = Some(SkiaRenderer::new(size.width, size.height, self.font.clone())?);

        window.set_cursor_visible(false);
        self.window = Some(window);
        Ok(())
    }

    /// Starts the run once something can show its first trial, so the
    /// first display timestamp matches what the participant sees.
    fn start_run(&mut self) -> Result<()> {
        let Some((config, rng)) = self.pending.take() else {
            return Ok(());
        };

        if let Some(renderer) = self.renderer.as_mut() {
            let cached = renderer.prewarm(
                config.categories.values().map(|c| c.name.as_str()),
                config
                    .categories
                    .values()
                    .flat_map(|c| c.stimuli.iter().map(|s| s.word.as_str())),
            );
            debug!(cached, "text prewarmed");
        }

        let sink = JsonFileSink::new(&self.output);
        let (run, effects) = begin_run(config, self.clock.clone(), rng, sink)?;
        self.run = Some(run);
        self.apply(&effects);
        Ok(())
    }

    /// Mirrors run effects onto the presentation, in emission order.
    fn apply(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Display(_) => self.incorrect = false,
                Effect::IncorrectResponse => self.incorrect = true,
                Effect::Recorded(record) => debug!(
                    stimulus = record.stimulus,
                    response_ms = record.response_time_ms,
                    "response recorded"
                ),
                Effect::Submit(_) => self.report_submission(),
                Effect::ReleaseInput => {}
            }
        }
        if !effects.is_empty() {
            self.request_redraw();
        }
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let scene = match &self.run {
            Some(run) if !run.phase().is_terminal() => Scene::Trial {
                display: run.display(),
                incorrect: self.incorrect,
            },
            Some(run) if run.phase() == RunPhase::Finished => Scene::Complete,
            _ => Scene::Blank,
        };

        let stats = renderer.render_frame(&scene, pixels.frame_mut())?;
        pixels.render()?;
        trace!(
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            blits = stats.blits,
            "frame"
        );
        Ok(())
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        if code == KeyCode::Escape {
            self.cleanup_and_exit(event_loop);
            return;
        }

        let Some(run) = self.run.as_mut() else {
            return;
        };
        let at_ms = self.clock.now_ms();
        match run.handle_input(key_code(code), at_ms) {
            Ok(effects) => self.apply(&effects),
            Err(e) => {
                error!("run aborted: {e}");
                self.cleanup_and_exit(event_loop);
            }
        }
    }

    fn report_submission(&self) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        match run.submission() {
            Some(Ok(receipt)) => info!("{}", receipt.message),
            Some(Err(e)) => error!("responses were not saved: {e}"),
            None => {}
        }
    }

    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(pixels) = self.pixels.as_mut() {
            if let Err(e) = pixels.resize_surface(size.width, size.height) {
                warn!("failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(size.width, size.height) {
                warn!("failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = self.renderer.as_mut() {
            if let Err(e) = renderer.resize(size.width, size.height) {
                warn!("failed to resize canvas: {e}");
            }
        }
        debug!(width = size.width, height = size.height, "display resized");
        self.request_redraw();
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(run) = self.run.as_mut() {
            if !run.phase().is_terminal() {
                run.cancel();
                info!("run cancelled, nothing was submitted");
            }
        }
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_window_and_surface(event_loop) {
            error!("failed to create window and surface: {e:#}");
            event_loop.exit();
            return;
        }
        if let Err(e) = self.start_run() {
            error!("failed to start the run: {e:#}");
            self.cleanup_and_exit(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!("render failed: {e:#}");
                    self.cleanup_and_exit(event_loop);
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
