//! Fixed-rate simulation thread
//!
//! The simulation thread is the only code that touches a running [`Game`].
//! Everyone else talks to it through a [`GameHandle`]: flags and queued
//! commands go in, snapshots come out. A flag raised mid-tick is picked up
//! at the start of the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use glam::Vec2;

use crate::consts::MAX_CATCHUP_TICKS;
use crate::input::Action;
use crate::sim::{Game, Snapshot};

/// Operations queued for the simulation thread
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Shoot(Vec2),
    Reset,
}

/// State shared between the simulation thread and its handles
struct Shared {
    running: AtomicBool,
    generate: AtomicBool,
    shutdown: AtomicBool,
    commands: Mutex<Vec<Command>>,
    frame: Mutex<Snapshot>,
    /// Single-slot change signal: set on publish, cleared by `take_changed`
    dirty: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Fold everything requested since the last tick into the game
    fn apply_pending(&self, game: &mut Game) {
        let running = self.running.load(Ordering::Acquire);
        if running != game.is_running() {
            if running {
                game.start();
            } else {
                game.stop();
            }
        }

        if self.generate.swap(false, Ordering::AcqRel) {
            game.generate();
        }

        let commands = std::mem::take(&mut *lock(&self.commands));
        for command in commands {
            match command {
                Command::Shoot(direction) => {
                    if !game.shoot(direction) {
                        log::debug!("Ignored shot {:?}: ball moving or no shots left", direction);
                    }
                }
                Command::Reset => game.reset(),
            }
        }
    }

    fn publish(&self, game: &Game) {
        *lock(&self.frame) = game.snapshot();
        self.dirty.store(true, Ordering::Release);
    }
}

/// Thread-safe control surface of a running game
#[derive(Clone)]
pub struct GameHandle {
    shared: Arc<Shared>,
}

impl GameHandle {
    /// Resume ticking
    pub fn start(&self) {
        self.shared.running.store(true, Ordering::Release);
    }

    /// Pause ticking
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Request a fresh level on the next tick
    pub fn generate(&self) {
        self.shared.generate.store(true, Ordering::Release);
    }

    /// Queue a shot. Only honored if the ball is at rest when it is applied.
    pub fn shoot(&self, direction: Vec2) {
        lock(&self.shared.commands).push(Command::Shoot(direction));
    }

    /// Queue a reset
    pub fn reset(&self) {
        lock(&self.shared.commands).push(Command::Reset);
    }

    /// Dispatch an input action
    pub fn apply(&self, action: Action) {
        match action {
            Action::Shoot(direction) => self.shoot(direction),
            Action::Reset => self.reset(),
            Action::Generate => self.generate(),
        }
    }

    /// Latest published state
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.shared.frame).clone()
    }

    /// Latest state if anything changed since the previous call
    pub fn take_changed(&self) -> Option<Snapshot> {
        if self.shared.dirty.swap(false, Ordering::AcqRel) {
            Some(self.snapshot())
        } else {
            None
        }
    }
}

/// Owns the simulation thread. Dropping it stops and joins the thread.
pub struct Runner {
    handle: GameHandle,
    worker: Option<JoinHandle<()>>,
}

impl Runner {
    /// Move `game` onto a dedicated thread ticking at the tuned rate
    pub fn spawn(game: Game) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(game.is_running()),
            generate: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
            frame: Mutex::new(game.snapshot()),
            dirty: AtomicBool::new(true),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("bounze-sim".into())
                .spawn(move || run(game, shared))?
        };
        log::info!("Simulation thread started");

        Ok(Self {
            handle: GameHandle { shared },
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> GameHandle {
        self.handle.clone()
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.handle.shared.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Simulation thread panicked");
            }
        }
    }
}

/// Tick at a fixed rate until shutdown, catching up a bounded number of
/// ticks when the thread falls behind
fn run(mut game: Game, shared: Arc<Shared>) {
    let period = Duration::from_secs_f32(game.tuning().dt());
    let mut next = Instant::now();

    while !shared.shutdown.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next {
            thread::sleep(next - now);
            continue;
        }

        shared.apply_pending(&mut game);
        game.tick();
        if game.take_changed() {
            shared.publish(&game);
        }

        next += period;
        if now.saturating_duration_since(next) > period * MAX_CATCHUP_TICKS {
            log::warn!("Simulation fell behind, skipping ahead");
            next = now;
        }
    }
    log::info!("Simulation thread stopped at tick {}", game.tick_count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::EdgeId;
    use crate::tuning::Tuning;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn wait_for(handle: &GameHandle, done: impl Fn(&Snapshot) -> bool) -> Option<Snapshot> {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            let snapshot = handle.snapshot();
            if done(&snapshot) {
                return Some(snapshot);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn spawn(seed: u64) -> Runner {
        Runner::spawn(Game::new(Tuning::default(), seed)).unwrap()
    }

    #[test]
    fn test_runner_ticks_and_publishes() {
        let runner = spawn(1);
        let handle = runner.handle();
        let snapshot = wait_for(&handle, |s| s.tick >= 3).expect("ticks should advance");
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.shots, 10);
        assert!(snapshot.running);
    }

    #[test]
    fn test_change_signal_is_single_slot() {
        let runner = spawn(2);
        let handle = runner.handle();
        wait_for(&handle, |s| s.tick >= 1).unwrap();
        handle.stop();
        thread::sleep(Duration::from_millis(150));

        // Drain whatever was published while stopping, then nothing new arrives
        let _ = handle.take_changed();
        thread::sleep(Duration::from_millis(100));
        assert!(handle.take_changed().is_none());
    }

    #[test]
    fn test_stop_and_start() {
        let runner = spawn(3);
        let handle = runner.handle();
        wait_for(&handle, |s| s.tick >= 2).unwrap();

        handle.stop();
        assert!(!handle.is_running());
        let paused = wait_for(&handle, |s| !s.running).expect("pause should be published");
        thread::sleep(Duration::from_millis(200));
        assert_eq!(handle.snapshot().tick, paused.tick);

        handle.start();
        wait_for(&handle, |s| s.tick > paused.tick).expect("ticks should resume");
    }

    #[test]
    fn test_shoot_command() {
        let runner = spawn(4);
        let handle = runner.handle();
        wait_for(&handle, |s| s.can_shoot()).unwrap();

        handle.shoot(Vec2::new(0.0, -1.0));
        let after = wait_for(&handle, |s| s.shots == 9).expect("shot should be applied");
        assert_eq!(after.level, 1);
    }

    #[test]
    fn test_reset_command() {
        let runner = spawn(5);
        let handle = runner.handle();
        let before = wait_for(&handle, |s| s.level == 1).unwrap();

        handle.apply(Action::Reset);
        let after = wait_for(&handle, |s| s.tick > before.tick + 2).unwrap();
        assert_eq!(after.level, 1);
        assert_eq!(after.score, 0);
        assert_eq!(after.shots, 10);
        assert!(!after.game_over);
    }

    #[test]
    fn test_generate_flag() {
        let runner = spawn(6);
        let handle = runner.handle();
        let before = wait_for(&handle, |s| s.level == 1 && !s.live_edges.is_empty()).unwrap();
        let old: Vec<EdgeId> = before.live_edges.iter().map(|e| e.id).collect();

        handle.apply(Action::Generate);
        let after = wait_for(&handle, |s| {
            !s.live_edges.is_empty() && s.live_edges.iter().all(|e| !old.contains(&e.id))
        })
        .expect("a new level should replace the old one");
        assert_eq!(after.level, 1);
    }
}
