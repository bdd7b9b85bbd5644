//! `psyche-console`: drive one instance from stdin.
//!
//! ```text
//! psyche-console [psyche.toml]
//! > input grief 0.95
//! > threads
//! > intervene 1 break_rumination_loop notice the loop and pause it
//! ```
//!
//! The instance ticks in the background at the configured interval while
//! commands are typed. `log` prints the recent system log, `quit` exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use psyche_host::console::{self, ConsoleOutput};
use psyche_host::{settings, telemetry, BufferedSystemLog, NarrativeBridge, Session, TickScheduler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const LOG_TAIL: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = settings::load(path.as_deref()).context("loading settings")?;
    telemetry::init_tracing(&config.general)?;

    let log = Arc::new(BufferedSystemLog::default().quiet());
    let (bridge, mut narrative_events) = NarrativeBridge::with_channel();
    let session = Arc::new(Session::with_collaborators(config, log.clone(), Arc::new(bridge)));
    let id = session.spawn_instance().context("starting instance")?;
    let scheduler = TickScheduler::new(Arc::clone(&session)).spawn();

    tokio::spawn(async move {
        while let Some(event) = narrative_events.recv().await {
            info!(event = %event.name, payload = %event.payload, "Narrative event");
        }
    });

    println!("instance {id} online; type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "log" => {
                for record in log.recent(LOG_TAIL) {
                    println!("[{}] {:?} {:?}: {}", record.timestamp, record.level, record.category, record.message);
                }
                continue;
            }
            _ => {}
        }
        let output = match console::parse_command(line) {
            Ok(command) => {
                let handle = session.get(id)?;
                let mut controller = handle.lock();
                console::execute(&mut controller, command)
            }
            Err(e) => ConsoleOutput {
                success: false,
                lines: vec![e.to_string()],
            },
        };
        for line in output.lines {
            println!("{line}");
        }
    }

    let stats = scheduler.stop().await;
    let snapshot = session.remove(id)?;
    info!(ticks = stats.ticks, uptime_ms = snapshot.core.uptime, "Console closed");
    Ok(())
}
