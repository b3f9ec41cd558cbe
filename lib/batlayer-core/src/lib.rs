use crate::commands::{CommandSource, InteractiveSource, PipedSource, StaticSource, Ticker};
use crate::config::{ConfigError, InputMode};
use crate::engine::{OverlayEngine, Placement, TransitionError};
use crate::icons::{DecodeError, IconCache};
use crate::level::StateId;
use crate::platform::{
    CompositorImpl, HeadlessCompositor, PlatformError, PngDecoder, TerminalKeys,
};
use crate::run_loop::RunLoop;
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub mod commands;
pub mod config;
pub mod engine;
pub mod icons;
pub mod level;
pub mod paths;
pub mod platform;
pub mod run_loop;

pub use config::Config;

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}

/// Shows the first level, then follows commands until told to stop. The overlay is always removed
/// before this returns, whether the run ended normally or not.
pub fn start(shutdown: Arc<AtomicBool>, config: Config) -> BatLayerResult<()> {
    config.validate()?;

    if config.headless {
        return run_with(HeadlessCompositor::new(), &config, &shutdown);
    }

    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            let compositor = platform::FramebufferCompositor::open(config.display)?;
            run_with(compositor, &config, &shutdown)
        } else {
            warn!("No display backend for this platform, falling back to headless");
            run_with(HeadlessCompositor::new(), &config, &shutdown)
        }
    }
}

/// Decodes every icon the configuration points at without touching the display.
pub fn dry_run(config: &Config) -> BatLayerResult<()> {
    config.validate()?;

    let mut cache = build_cache(config);
    cache.preload_all()?;
    for resource in StateId::all().filter_map(|state| cache.get(state)) {
        let size = resource.image().size;
        info!(
            "{}: {} ({}x{})",
            resource.state(),
            cache.path_for(resource.state()).display(),
            size.width,
            size.height
        );
    }
    Ok(())
}

fn build_cache(config: &Config) -> IconCache<PngDecoder> {
    let mut cache = IconCache::new(PngDecoder, config.icon_set());
    if let Some(image) = &config.initial_image {
        cache.set_override(StateId::EMPTY, image.clone());
    }
    cache
}

fn run_with<C: CompositorImpl>(
    compositor: C,
    config: &Config,
    shutdown: &AtomicBool,
) -> BatLayerResult<()> {
    let placement = Placement {
        offset: config.offset(),
        base_layer: config.layer,
        background: config.background(),
    };
    let mut engine = OverlayEngine::new(compositor, build_cache(config), placement);

    if let Err(e) = engine.transition_to(StateId::EMPTY) {
        if let Err(teardown) = engine.shutdown() {
            warn!("Teardown after failed start also failed: {teardown}");
        }
        return Err(e.into());
    }

    let mode = config.input_mode();
    debug!("Input mode: {mode:?}");
    let mut source = command_source(mode, config);

    let mut run_loop = RunLoop::new(config.poll_interval(), config.timeout_ms as u64);
    run_loop.run(&mut engine, &mut source, shutdown)?;
    Ok(())
}

fn command_source(mode: InputMode, config: &Config) -> Box<dyn CommandSource> {
    match mode {
        InputMode::Piped => Box::new(PipedSource::stdin()),
        InputMode::Interactive { keys, animate } => {
            let keys = keys
                .then(|| {
                    TerminalKeys::new()
                        .map_err(|e| warn!("Keyboard unavailable, ignoring key presses: {e}"))
                        .ok()
                })
                .flatten();
            let ticker = animate.then(|| {
                Ticker::new(
                    Duration::from_millis(config.animation_interval_ms as u64),
                    config.poll_interval(),
                )
            });
            Box::new(InteractiveSource::new(keys, ticker, StateId::EMPTY))
        }
        InputMode::Static => Box::new(StaticSource),
    }
}

#[derive(Debug)]
pub enum BatLayerFatalError {
    Error(String),
    Config(ConfigError),
    Decode(DecodeError),
    Transition(TransitionError),
    Platform(PlatformError),
}

pub type BatLayerResult<T> = Result<T, BatLayerFatalError>;

impl Display for BatLayerFatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BatLayerFatalError::Error(message) => write!(f, "{message}"),
            BatLayerFatalError::Config(e) => write!(f, "{e}"),
            BatLayerFatalError::Decode(e) => write!(f, "{e}"),
            BatLayerFatalError::Transition(e) => write!(f, "{e}"),
            BatLayerFatalError::Platform(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BatLayerFatalError {}

impl From<ConfigError> for BatLayerFatalError {
    fn from(error: ConfigError) -> Self {
        BatLayerFatalError::Config(error)
    }
}

impl From<DecodeError> for BatLayerFatalError {
    fn from(error: DecodeError) -> Self {
        BatLayerFatalError::Decode(error)
    }
}

impl From<TransitionError> for BatLayerFatalError {
    fn from(error: TransitionError) -> Self {
        BatLayerFatalError::Transition(error)
    }
}

impl From<PlatformError> for BatLayerFatalError {
    fn from(error: PlatformError) -> Self {
        BatLayerFatalError::Platform(error)
    }
}

impl From<&str> for BatLayerFatalError {
    fn from(value: &str) -> Self {
        BatLayerFatalError::Error(value.to_owned())
    }
}

impl From<String> for BatLayerFatalError {
    fn from(error: String) -> Self {
        BatLayerFatalError::Error(error)
    }
}
