use crate::commands::{CommandSource, OverlayEvent};
use crate::engine::{OverlayEngine, TransitionError};
use crate::platform::{CompositorImpl, ImageDecoderImpl};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Drives the engine from a command source until a shutdown command, the shutdown flag, or the
/// timeout. Time is counted in nominal poll intervals, so time spent inside a transition does not
/// count towards the timeout.
#[derive(Debug)]
pub struct RunLoop {
    poll_interval: Duration,
    timeout_ms: u64,
    elapsed_ms: u64,
    iterations: u64,
}

impl RunLoop {
    /// A `timeout_ms` of 0 disables the timeout.
    pub fn new(poll_interval: Duration, timeout_ms: u64) -> Self {
        Self {
            poll_interval,
            timeout_ms,
            elapsed_ms: 0,
            iterations: 0,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn step<C, D, S>(
        &mut self,
        engine: &mut OverlayEngine<C, D>,
        source: &mut S,
        shutdown: &AtomicBool,
    ) -> Result<RunState, TransitionError>
    where
        C: CompositorImpl,
        D: ImageDecoderImpl,
        S: CommandSource + ?Sized,
    {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested");
            return Ok(RunState::Stopped);
        }

        self.iterations += 1;

        match source.poll() {
            OverlayEvent::Show(state) => match engine.transition_to(state) {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => error!("{e}"),
                Err(e) => return Err(e),
            },
            OverlayEvent::Shutdown => {
                info!("Exit command received");
                return Ok(RunState::Stopped);
            }
            OverlayEvent::Tick => thread::sleep(self.poll_interval),
        }

        self.elapsed_ms += self.poll_interval.as_millis() as u64;
        if self.timeout_ms > 0 && self.elapsed_ms >= self.timeout_ms {
            info!("Timed out after {}ms", self.timeout_ms);
            return Ok(RunState::Stopped);
        }

        Ok(RunState::Running)
    }

    /// Steps until stopped, then tears the overlay down. A fatal transition error still tears
    /// down before it is returned.
    pub fn run<C, D, S>(
        &mut self,
        engine: &mut OverlayEngine<C, D>,
        source: &mut S,
        shutdown: &AtomicBool,
    ) -> Result<(), TransitionError>
    where
        C: CompositorImpl,
        D: ImageDecoderImpl,
        S: CommandSource + ?Sized,
    {
        let result = loop {
            match self.step(engine, source, shutdown) {
                Ok(RunState::Running) => continue,
                Ok(RunState::Stopped) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        debug!("Run loop finished after {} iterations", self.iterations);

        let teardown = engine.shutdown();
        result.and(teardown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{InteractiveSource, StaticSource};
    use crate::config::IconSize;
    use crate::engine::Placement;
    use crate::icons::{IconCache, IconSet};
    use crate::level::StateId;
    use crate::platform::mock::{MockCompositor, MockDecoder, MockKeys, MockOp};
    use crate::platform::{Key, Position};
    use std::collections::VecDeque;
    use std::path::PathBuf;

    struct Scripted(VecDeque<OverlayEvent>);

    impl CommandSource for Scripted {
        fn poll(&mut self) -> OverlayEvent {
            self.0.pop_front().unwrap_or(OverlayEvent::Tick)
        }
    }

    fn engine(decoder: MockDecoder) -> OverlayEngine<MockCompositor, MockDecoder> {
        let cache = IconCache::new(decoder, IconSet::new(PathBuf::from("/icons"), IconSize::Small));
        let mut engine = OverlayEngine::new(
            MockCompositor::new(),
            cache,
            Placement {
                offset: Position::new(0, 0),
                base_layer: 3000,
                background: None,
            },
        );
        engine.transition_to(StateId::EMPTY).unwrap();
        engine
    }

    fn state(index: usize) -> StateId {
        StateId::new(index).unwrap()
    }

    #[test]
    fn test_timeout_stops_loop() {
        let mut engine = engine(MockDecoder::new());
        let transactions = engine.compositor().transaction_count();
        let mut events = VecDeque::from([OverlayEvent::Tick; 5]);
        events.extend([OverlayEvent::Show(state(2)), OverlayEvent::Show(state(3))]);
        let mut source = Scripted(events);
        let mut run_loop = RunLoop::new(Duration::from_millis(10), 50);

        run_loop
            .run(&mut engine, &mut source, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(run_loop.iterations(), 5);
        assert_eq!(run_loop.elapsed_ms(), 50);
        assert_eq!(source.0.len(), 2);
        assert_eq!(engine.compositor().transaction_count(), transactions);

        let ops = &engine.compositor().ops;
        let last_submit = ops
            .iter()
            .rposition(|op| matches!(op, MockOp::Submit(_)))
            .unwrap();
        assert!(!ops[last_submit..]
            .iter()
            .any(|op| matches!(op, MockOp::Begin(_))));
        assert!(engine.compositor().closed);
        assert!(engine.compositor().live().is_empty());
    }

    #[test]
    fn test_static_source_runs_until_timeout() {
        let mut engine = engine(MockDecoder::new());
        let mut run_loop = RunLoop::new(Duration::from_millis(10), 30);

        run_loop
            .run(&mut engine, &mut StaticSource, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(run_loop.iterations(), 3);
        assert!(engine.compositor().closed);
    }

    #[test]
    fn test_cycle_skips_past_broken_icon() {
        let mut engine = engine(MockDecoder::new().fail_on("battery25.png"));
        let keys = MockKeys::with_keys([Key::Char('c'), Key::Char('c')]);
        let mut source = InteractiveSource::new(Some(keys), None, StateId::EMPTY);
        let mut run_loop = RunLoop::new(Duration::from_millis(1), 0);
        let shutdown = AtomicBool::new(false);

        run_loop.step(&mut engine, &mut source, &shutdown).unwrap();
        assert_eq!(engine.current(), Some(StateId::EMPTY));
        assert_eq!(source.cursor(), state(1));

        run_loop.step(&mut engine, &mut source, &shutdown).unwrap();
        assert_eq!(engine.current(), Some(state(2)));
        assert_eq!(engine.visible_count(), 1);
    }

    #[test]
    fn test_shutdown_command_stops_loop() {
        let mut engine = engine(MockDecoder::new());
        let mut source = Scripted(VecDeque::from([
            OverlayEvent::Show(state(2)),
            OverlayEvent::Shutdown,
            OverlayEvent::Show(state(3)),
        ]));
        let mut run_loop = RunLoop::new(Duration::from_millis(1), 0);

        run_loop
            .run(&mut engine, &mut source, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(run_loop.iterations(), 2);
        assert_eq!(source.0.len(), 1);
        assert!(engine.compositor().closed);
    }

    #[test]
    fn test_shutdown_flag_stops_before_polling() {
        let mut engine = engine(MockDecoder::new());
        let mut source = Scripted(VecDeque::from([OverlayEvent::Show(state(4))]));
        let mut run_loop = RunLoop::new(Duration::from_millis(1), 0);

        run_loop
            .run(&mut engine, &mut source, &AtomicBool::new(true))
            .unwrap();

        assert_eq!(run_loop.iterations(), 0);
        assert_eq!(source.0.len(), 1);
    }

    #[test]
    fn test_missing_icon_keeps_running() {
        let mut engine = engine(MockDecoder::new().fail_on("battery50.png"));
        let mut source = Scripted(VecDeque::from([
            OverlayEvent::Show(state(2)),
            OverlayEvent::Show(state(3)),
        ]));
        let mut run_loop = RunLoop::new(Duration::from_millis(1), 0);
        let shutdown = AtomicBool::new(false);

        assert_eq!(
            run_loop.step(&mut engine, &mut source, &shutdown).unwrap(),
            RunState::Running
        );
        assert_eq!(engine.current(), Some(StateId::EMPTY));

        assert_eq!(
            run_loop.step(&mut engine, &mut source, &shutdown).unwrap(),
            RunState::Running
        );
        assert_eq!(engine.current(), Some(state(3)));
        assert_eq!(engine.visible_count(), 1);
    }

    #[test]
    fn test_fatal_error_still_tears_down() {
        let mut engine = engine(MockDecoder::new());
        engine.compositor_mut().fail_submit = true;
        let mut source = Scripted(VecDeque::from([OverlayEvent::Show(state(1))]));
        let mut run_loop = RunLoop::new(Duration::from_millis(1), 0);

        let result = run_loop.run(&mut engine, &mut source, &AtomicBool::new(false));

        assert!(matches!(result, Err(TransitionError::CommitFailed(_))));
        assert!(engine.compositor().closed);
        assert!(engine
            .compositor()
            .ops
            .iter()
            .any(|op| matches!(op, MockOp::Close)));
    }
}
