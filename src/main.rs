//! Bounze entry point
//!
//! Headless launcher: loads tuning, runs the simulation thread and plays it
//! with an autopilot that aims at the nearest live edge. Prints a JSON
//! summary when the game ends.
//!
//! Usage: `bounze [--seed N] [TUNING_JSON]`

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use bounze::consts::SCALE;
use bounze::input::field_to_screen;
use bounze::{Game, InputEvent, Runner, Snapshot, Tuning, map_input};

/// Final result printed on game over
#[derive(Debug, Serialize)]
struct Summary {
    seed: u64,
    level: u32,
    score: u64,
    ticks: u64,
    edges_left: usize,
}

struct Args {
    seed: u64,
    tuning: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        seed: rand::random(),
        tuning: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().ok_or("--seed needs a value")?;
                args.seed = value
                    .parse()
                    .map_err(|e| format!("bad seed `{}`: {}", value, e))?;
            }
            _ if args.tuning.is_none() && !arg.starts_with('-') => args.tuning = Some(arg),
            _ => return Err(format!("unexpected argument `{}`", arg)),
        }
    }
    Ok(args)
}

/// Press where the nearest live edge's midpoint is drawn
fn autopilot_press(snapshot: &Snapshot) -> Option<InputEvent> {
    let target = snapshot.nearest_live_edge(snapshot.ball.position)?;
    let (x, y) = field_to_screen(target.segment().midpoint(), SCALE);
    Some(InputEvent::PointerPressed { x, y })
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("usage: bounze [--seed N] [TUNING_JSON]");
            return ExitCode::FAILURE;
        }
    };

    let tuning = match &args.tuning {
        Some(path) => match Tuning::load(path) {
            Ok(tuning) => tuning,
            Err(e) => {
                log::error!("Could not load tuning from {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => Tuning::default(),
    };
    let poll = Duration::from_secs_f32(tuning.dt());

    log::info!("Bounze starting (seed {})", args.seed);
    let runner = match Runner::spawn(Game::new(tuning, args.seed)) {
        Ok(runner) => runner,
        Err(e) => {
            log::error!("Could not start simulation thread: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let handle = runner.handle();

    let mut level = 0;
    let mut last_shot_tick = None;
    loop {
        thread::sleep(poll);
        let Some(snapshot) = handle.take_changed() else {
            continue;
        };

        if snapshot.level != level {
            level = snapshot.level;
            log::info!(
                "Level {} ({} edges, {} shots, score {})",
                level,
                snapshot.live_edges.len(),
                snapshot.shots,
                snapshot.score
            );
        }

        if snapshot.game_over {
            let summary = Summary {
                seed: args.seed,
                level: snapshot.level,
                score: snapshot.score,
                ticks: snapshot.tick,
                edges_left: snapshot.live_edges.len(),
            };
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => log::error!("Could not serialize summary: {}", e),
            }
            break;
        }

        // One shot per resting period: the queued command lands next tick
        if !snapshot.can_shoot() || last_shot_tick == Some(snapshot.tick) {
            continue;
        }
        let action = autopilot_press(&snapshot).and_then(|event| map_input(&event, &snapshot));
        if let Some(action) = action {
            log::debug!("Autopilot: {:?}", action);
            handle.apply(action);
            last_shot_tick = Some(snapshot.tick);
        }
    }

    drop(runner);
    ExitCode::SUCCESS
}
