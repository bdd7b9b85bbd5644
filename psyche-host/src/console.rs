//! Debug-console command language.
//!
//! Players type commands such as `suppress grief denial --force` or
//! `peek 0x001a` into the in-game debugger. [`parse_command`] turns one
//! line into a [`Command`]; [`execute`] runs it against an instance and
//! renders the result as console lines.
//!
//! Positional arguments are interpreted per action:
//!
//! | Action                          | Positionals              |
//! |---------------------------------|--------------------------|
//! | `kill` `suspend` `resume`       | `<pid>`                  |
//! | `nice` `renice`                 | `<pid> [priority]`       |
//! | `free` `peek` `protect` `unprotect` | `<address>`          |
//! | `poke`                          | `<address> [text...]`    |
//! | `dump`                          | `[emotion]`              |
//! | `calm` `intensify`              | `[emotion] [amount]`     |
//! | `suppress`                      | `[emotion] [mechanism]`  |
//!
//! Flags: `--force`, `--amount <f>`, `--pool <name>`, `--bucket <name>`,
//! `--mechanism <name>`, `--strategy <name>`, `--priority <n>`,
//! `--duration <ms>`. Double quotes group words. `calm --strategy s` applies
//! a regulation strategy; adding `--duration` makes it a timed regulation.

use psyche_core::emotional::InputRequest;
use psyche_core::instance::actions::{self, ActionCategory};
use psyche_core::instance::{ActionData, ActionOutcome, ActionParams, InstanceController};
use psyche_core::ledger::{MemoryData, PoolKind};
use psyche_core::types::ThreadId;

use crate::error::{HostError, HostResult};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A whitelisted player action.
    Action {
        /// Canonical action name.
        name: &'static str,
        /// Parameters built from positionals and flags.
        params: ActionParams,
    },
    /// Advance the instance; `None` uses the configured interval.
    Tick {
        /// Simulated milliseconds.
        delta_ms: Option<u64>,
    },
    /// Feed an emotional input.
    Input(InputRequest),
    /// Allocate a memory.
    Remember {
        /// Target pool.
        pool: PoolKind,
        /// Memory content.
        data: MemoryData,
    },
    /// Submit an intervention solution.
    Intervene {
        /// Target thread.
        thread: ThreadId,
        /// Intervention name.
        intervention: String,
        /// Free-text solution.
        solution: String,
    },
    /// List emotional threads.
    Threads,
    /// Instance health summary.
    Status,
    /// Undo the last action.
    Rollback,
    /// Counter export.
    Metrics,
    /// Command reference.
    Help,
}

/// Rendered result of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleOutput {
    /// Whether the command took effect.
    pub success: bool,
    /// Lines to print.
    pub lines: Vec<String>,
}

impl ConsoleOutput {
    fn ok(lines: Vec<String>) -> Self {
        Self { success: true, lines }
    }

    fn fail(line: impl Into<String>) -> Self {
        Self {
            success: false,
            lines: vec![line.into()],
        }
    }
}

const HELP: &[&str] = &[
    "process:   ps | kill <pid> | nice <pid> [delta] | renice <pid> <n> | suspend <pid> | resume <pid>",
    "memory:    dump [emotion] [--pool p] [--bucket low|medium|high] | peek <addr> | poke <addr> [text] | free <addr> | protect <addr> | unprotect <addr>",
    "emotional: calm [emotion] [amount] [--strategy s [--duration ms]] | intensify [emotion] [amount] | balance | suppress [emotion] [mechanism]",
    "system:    reboot | stabilize | defragment | analyze",
    "runtime:   tick [ms] | input <emotion> [intensity] [--duration ms] | remember <pool> <intensity> <emotions> <text>",
    "debugger:  threads | intervene <thread> <intervention> <solution> | status | metrics | rollback",
    "flags:     --force --amount --pool --bucket --mechanism --strategy --priority --duration",
];

const VALUE_FLAGS: &[&str] = &[
    "amount", "pool", "bucket", "mechanism", "strategy", "priority", "duration",
];

#[derive(Default)]
struct Args {
    positional: Vec<String>,
    force: bool,
    amount: Option<String>,
    pool: Option<String>,
    bucket: Option<String>,
    mechanism: Option<String>,
    strategy: Option<String>,
    priority: Option<String>,
    duration: Option<String>,
}

impl Args {
    fn parse(tokens: Vec<String>) -> HostResult<Self> {
        let mut args = Self::default();
        let mut iter = tokens.into_iter();
        while let Some(token) = iter.next() {
            let Some(flag) = token.strip_prefix("--") else {
                args.positional.push(token);
                continue;
            };
            if flag == "force" {
                args.force = true;
                continue;
            }
            if !VALUE_FLAGS.contains(&flag) {
                return Err(HostError::Parse(format!("unknown flag --{flag}")));
            }
            let value = iter
                .next()
                .ok_or_else(|| HostError::Parse(format!("--{flag} needs a value")))?;
            let slot = match flag {
                "amount" => &mut args.amount,
                "pool" => &mut args.pool,
                "bucket" => &mut args.bucket,
                "mechanism" => &mut args.mechanism,
                "strategy" => &mut args.strategy,
                "priority" => &mut args.priority,
                _ => &mut args.duration,
            };
            *slot = Some(value);
        }
        Ok(args)
    }

    fn positional(&self, idx: usize) -> Option<&str> {
        self.positional.get(idx).map(String::as_str)
    }

    fn required(&self, idx: usize, what: &str) -> HostResult<&str> {
        self.positional(idx)
            .ok_or_else(|| HostError::Parse(format!("missing {what}")))
    }

    fn rest(&self, from: usize) -> Option<String> {
        (self.positional.len() > from).then(|| self.positional[from..].join(" "))
    }
}

/// Split a line into tokens, keeping double-quoted text together.
fn tokenize(line: &str) -> HostResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if quoted {
        return Err(HostError::Parse("unterminated quote".into()));
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_num<T: std::str::FromStr>(raw: &str, what: &str) -> HostResult<T> {
    raw.parse()
        .map_err(|_| HostError::Parse(format!("invalid {what}: '{raw}'")))
}

/// Parse a block address: `0x001a` or `26`.
fn parse_address(raw: &str) -> HostResult<u64> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    };
    parsed.ok_or_else(|| HostError::Parse(format!("invalid address: '{raw}'")))
}

/// Parse one console line.
///
/// # Errors
/// `Parse` for malformed input, `Core(UnknownAction)` for a word that is
/// neither a console command nor a whitelisted action.
pub fn parse_command(line: &str) -> HostResult<Command> {
    let mut tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Err(HostError::Parse("empty command".into()));
    }
    let head = tokens.remove(0).to_lowercase();
    let args = Args::parse(tokens)?;

    let command = match head.as_str() {
        "help" | "?" => Command::Help,
        "status" => Command::Status,
        "threads" => Command::Threads,
        "rollback" | "undo" => Command::Rollback,
        "metrics" => Command::Metrics,
        "tick" => Command::Tick {
            delta_ms: args.positional(0).map(|v| parse_num(v, "tick length")).transpose()?,
        },
        "input" => Command::Input(InputRequest {
            emotion: args.required(0, "emotion")?.to_string(),
            intensity: args.positional(1).map(|v| parse_num(v, "intensity")).transpose()?,
            duration_ms: args.duration.as_deref().map(|v| parse_num(v, "duration")).transpose()?,
            source: Some("console".into()),
        }),
        "remember" => {
            let pool_name = args.required(0, "pool")?;
            let pool = PoolKind::from_name(pool_name)
                .ok_or_else(|| HostError::Parse(format!("unknown pool '{pool_name}'")))?;
            let intensity: f32 = parse_num(args.required(1, "intensity")?, "intensity")?;
            let emotions: Vec<&str> = args
                .required(2, "emotions")?
                .split(',')
                .filter(|e| !e.is_empty())
                .collect();
            let description = args
                .rest(3)
                .ok_or_else(|| HostError::Parse("missing description".into()))?;
            Command::Remember {
                pool,
                data: MemoryData::new(description, &emotions, intensity),
            }
        }
        "intervene" => Command::Intervene {
            thread: ThreadId(parse_num(args.required(0, "thread")?.trim_start_matches("thread-"), "thread")?),
            intervention: args.required(1, "intervention")?.to_string(),
            solution: args
                .rest(2)
                .ok_or_else(|| HostError::Parse("missing solution".into()))?,
        },
        other => {
            let (name, category) = actions::lookup(other)?;
            Command::Action {
                name,
                params: action_params(name, category, &args)?,
            }
        }
    };
    Ok(command)
}

fn action_params(name: &str, category: ActionCategory, args: &Args) -> HostResult<ActionParams> {
    let mut params = ActionParams {
        force: args.force,
        pool: args.pool.clone(),
        bucket: args.bucket.clone(),
        mechanism: args.mechanism.clone(),
        strategy: args.strategy.clone(),
        duration_ms: args.duration.as_deref().map(|v| parse_num(v, "duration")).transpose()?,
        amount: args.amount.as_deref().map(|v| parse_num(v, "amount")).transpose()?,
        priority: args.priority.as_deref().map(|v| parse_num(v, "priority")).transpose()?,
        ..ActionParams::default()
    };
    match category {
        ActionCategory::Process => {
            if let Some(pid) = args.positional(0) {
                params.pid = Some(parse_num(pid, "pid")?);
            }
            if let Some(priority) = args.positional(1) {
                params.priority = Some(parse_num(priority, "priority")?);
            }
        }
        ActionCategory::Memory => {
            if name == "dump" {
                params.emotion = args.positional(0).map(str::to_string);
            } else if let Some(address) = args.positional(0) {
                params.address = Some(parse_address(address)?);
            }
            if name == "poke" {
                params.value = args.rest(1);
            }
        }
        ActionCategory::Emotional => {
            params.emotion = args.positional(0).map(str::to_string);
            if let Some(second) = args.positional(1) {
                if name == "suppress" {
                    params.mechanism = Some(second.to_string());
                } else {
                    params.amount = Some(parse_num(second, "amount")?);
                }
            }
        }
        ActionCategory::System => {}
    }
    Ok(params)
}

/// Run a command against an instance.
///
/// Failures are rendered into the output rather than returned, matching
/// what the player sees in the debugger.
pub fn execute(controller: &mut InstanceController, command: Command) -> ConsoleOutput {
    match command {
        Command::Help => ConsoleOutput::ok(HELP.iter().map(|l| (*l).to_string()).collect()),
        Command::Action { name, params } => match controller.execute_action(name, &params) {
            Ok(outcome) => render_outcome(&outcome),
            Err(e) => ConsoleOutput::fail(format!("{name}: {e}")),
        },
        Command::Tick { delta_ms } => {
            let result = match delta_ms {
                Some(ms) => controller.tick(ms),
                None => controller.step(),
            };
            match result {
                Ok(report) => {
                    let mut lines = vec![format!(
                        "{} stability {:.3} ({:+.4}) corruption {:.3} ({:+.4})",
                        report.now,
                        controller.stability(),
                        report.stability_delta,
                        controller.corruption(),
                        report.corruption_spread,
                    )];
                    if report.held {
                        lines.push("maintenance in progress".into());
                    }
                    lines.extend(report.health.iter().map(|e| format!("health: {e:?}")));
                    lines.extend(report.emotional.iter().map(|e| format!("emotional: {e:?}")));
                    ConsoleOutput::ok(lines)
                }
                Err(e) => ConsoleOutput::fail(format!("tick: {e}")),
            }
        }
        Command::Input(request) => match controller.process_emotional_input(request) {
            Ok(receipt) => {
                let mut lines = vec![format!("queued input #{}", receipt.input_id)];
                if let Some(thread) = receipt.thread {
                    lines.push(format!("spawned {thread}"));
                }
                if receipt.immediate {
                    lines.push("applied immediately".into());
                }
                ConsoleOutput::ok(lines)
            }
            Err(e) => ConsoleOutput::fail(format!("input: {e}")),
        },
        Command::Remember { pool, data } => match controller.allocate_memory(data, pool) {
            Ok(id) => {
                let size = controller.ledger().get(id).map_or(0, |b| b.size);
                ConsoleOutput::ok(vec![format!("allocated {id} in {pool} ({size} units)")])
            }
            Err(e) => ConsoleOutput::fail(format!("remember: {e}")),
        },
        Command::Intervene {
            thread,
            intervention,
            solution,
        } => {
            let advisory = controller.intervene(thread, &intervention, &solution);
            let mut lines = vec![advisory.message];
            lines.extend(advisory.hints.into_iter().map(|h| format!("hint: {h}")));
            ConsoleOutput {
                success: advisory.success,
                lines,
            }
        }
        Command::Threads => {
            let lines: Vec<String> = controller
                .emotional()
                .threads()
                .map(|t| {
                    let issues: Vec<&str> = t.issues.iter().map(|i| i.kind.name()).collect();
                    let fixes: Vec<&str> = t
                        .intervention_points
                        .iter()
                        .map(|p| p.intervention.name())
                        .collect();
                    format!(
                        "{} {} {:?} {:.0}% stability {:.2} efficiency {:.2} issues [{}] fixes [{}]",
                        t.id,
                        t.emotion,
                        t.stage,
                        t.current_stage_progress * 100.0,
                        t.stability,
                        t.processing_efficiency,
                        issues.join(", "),
                        fixes.join(", "),
                    )
                })
                .collect();
            if lines.is_empty() {
                ConsoleOutput::ok(vec!["no threads".into()])
            } else {
                ConsoleOutput::ok(lines)
            }
        }
        Command::Status => {
            let capacity = controller.ledger().capacity();
            let state = controller.emotional().state();
            ConsoleOutput::ok(vec![
                format!(
                    "{} status {} stability {:.3} corruption {:.3} uptime {}ms",
                    controller.id(),
                    controller.status(),
                    controller.stability(),
                    controller.corruption(),
                    controller.uptime_ms(),
                ),
                format!(
                    "memory {}/{} units ({:.1}%), {} block(s), {} error(s)",
                    capacity.allocated,
                    capacity.total,
                    capacity.usage_ratio() * 100.0,
                    controller.ledger().len(),
                    controller.errors().len(),
                ),
                format!(
                    "dominant {} coherence {:.2} regulation {:.2}",
                    state.dominant, state.coherence, state.regulation
                ),
            ])
        }
        Command::Rollback => match controller.rollback() {
            Ok(()) => ConsoleOutput::ok(vec!["rolled back".into()]),
            Err(e) => ConsoleOutput::fail(format!("rollback: {e}")),
        },
        Command::Metrics => {
            let prefix = controller.config().telemetry.metrics_prefix.clone();
            let budget = controller.budget();
            let mut lines: Vec<String> = controller
                .counters()
                .snapshot()
                .to_prometheus(&prefix)
                .lines()
                .map(str::to_string)
                .collect();
            lines.push(budget.percentiles().summary(budget.budget_ms()));
            ConsoleOutput::ok(lines)
        }
    }
}

fn render_outcome(outcome: &ActionOutcome) -> ConsoleOutput {
    let mut lines = vec![outcome.message.clone()];
    lines.extend(outcome.hints.iter().map(|h| format!("hint: {h}")));
    match &outcome.data {
        ActionData::None => {}
        ActionData::Processes(list) => {
            lines.extend(list.iter().map(|p| {
                format!(
                    "{:>4} {:<20} cpu {:>5.1}% mem {:>6} nice {:>3} stability {:.2} {:?}",
                    p.pid,
                    p.name,
                    p.cpu(),
                    p.memory,
                    p.priority,
                    p.stability,
                    p.state
                )
            }));
        }
        ActionData::Blocks(blocks) => {
            lines.extend(blocks.iter().map(|b| {
                format!(
                    "{} {:<10} {:>5}u charge {:.2} integrity {:.2} [{}] {}",
                    b.id,
                    b.pool,
                    b.size,
                    b.emotional_charge,
                    b.integrity_score,
                    b.associated_emotions.join(","),
                    b.content.description,
                )
            }));
        }
        ActionData::Block(block) => {
            lines.push(format!(
                "pool {} size {} charge {:.2} integrity {:.2} accesses {}{}{}",
                block.pool,
                block.size,
                block.emotional_charge,
                block.integrity_score,
                block.access_count,
                if block.protected { " protected" } else { "" },
                if block.fragmented { " fragmented" } else { "" },
            ));
        }
        ActionData::Priority(priority) => lines.push(format!("nice {priority}")),
        ActionData::Report(report) => {
            lines.push(format!(
                "cpu {:.1}% memory {} threads {} errors {} corrupted blocks {}",
                report.resources.cpu,
                report.resources.memory,
                report.resources.threads,
                report.error_count,
                report.corrupted_blocks,
            ));
            lines.extend(
                report
                    .leaks
                    .iter()
                    .map(|l| format!("leak {} score {:.3} ({} units)", l.block, l.score, l.size)),
            );
            lines.extend(report.debuggable_threads.iter().map(|t| {
                let issues: Vec<&str> = t.issues.iter().map(|i| i.name()).collect();
                format!("debuggable {} {} [{}]", t.id, t.emotion, issues.join(", "))
            }));
            let top: Vec<String> = report
                .top_emotions
                .iter()
                .map(|(name, value)| format!("{name}={value:.2}"))
                .collect();
            lines.push(format!("top emotions: {}", top.join(" ")));
        }
    }
    ConsoleOutput {
        success: outcome.success,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psyche_core::config::PsycheConfig;
    use psyche_core::error::PsycheError;

    fn running() -> InstanceController {
        let mut controller = InstanceController::new(PsycheConfig::default());
        controller.initialize().expect("fresh");
        controller
    }

    fn run(controller: &mut InstanceController, line: &str) -> ConsoleOutput {
        execute(controller, parse_command(line).expect("parses"))
    }

    #[test]
    fn suppress_with_force() {
        let command = parse_command("suppress grief denial --force").expect("parses");
        let Command::Action { name, params } = command else {
            panic!("expected action");
        };
        assert_eq!(name, "suppress");
        assert_eq!(params.emotion.as_deref(), Some("grief"));
        assert_eq!(params.mechanism.as_deref(), Some("denial"));
        assert!(params.force);
    }

    #[test]
    fn positional_mapping_per_category() {
        let Ok(Command::Action { params, .. }) = parse_command("renice 3 -5") else {
            panic!("expected renice");
        };
        assert_eq!((params.pid, params.priority), (Some(3), Some(-5)));

        let Ok(Command::Action { params, .. }) = parse_command("peek 0x001a") else {
            panic!("expected peek");
        };
        assert_eq!(params.address, Some(26));

        let Ok(Command::Action { params, .. }) = parse_command(r#"poke 7 "a quiet room""#) else {
            panic!("expected poke");
        };
        assert_eq!(params.address, Some(7));
        assert_eq!(params.value.as_deref(), Some("a quiet room"));

        let Ok(Command::Action { params, .. }) = parse_command("calm fear 0.4") else {
            panic!("expected calm");
        };
        assert_eq!(params.amount, Some(0.4));

        let Ok(Command::Action { params, .. }) = parse_command("dump --pool traumatic") else {
            panic!("expected dump");
        };
        assert_eq!(params.pool.as_deref(), Some("traumatic"));
        assert!(params.emotion.is_none());
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_command("   "), Err(HostError::Parse(_))));
        assert!(matches!(parse_command("kill abc"), Err(HostError::Parse(_))));
        assert!(matches!(parse_command("calm --amount"), Err(HostError::Parse(_))));
        assert!(matches!(parse_command("calm --loud"), Err(HostError::Parse(_))));
        assert!(matches!(parse_command("poke 1 \"open"), Err(HostError::Parse(_))));
        assert!(matches!(
            parse_command("sudo"),
            Err(HostError::Core(PsycheError::UnknownAction(_)))
        ));
    }

    #[test]
    fn builtins_parse() {
        assert_eq!(parse_command("tick 250").ok(), Some(Command::Tick { delta_ms: Some(250) }));
        assert_eq!(parse_command("TICK").ok(), Some(Command::Tick { delta_ms: None }));
        let Ok(Command::Intervene { thread, intervention, solution }) =
            parse_command("intervene thread-4 break_rumination_loop notice the loop and let go")
        else {
            panic!("expected intervene");
        };
        assert_eq!(thread, ThreadId(4));
        assert_eq!(intervention, "break_rumination_loop");
        assert_eq!(solution, "notice the loop and let go");
    }

    #[test]
    fn remember_then_peek() {
        let mut controller = running();
        let out = run(&mut controller, r#"remember longTerm 0.9 grief "grief memory""#);
        assert!(out.success, "{:?}", out.lines);
        assert!(out.lines[0].contains("262 units"));

        let id = controller.ledger().blocks().next().map(|b| b.id).expect("stored");
        let out = run(&mut controller, &format!("peek {id}"));
        assert!(out.success);
        assert!(out.lines[0].contains("grief memory"));
    }

    #[test]
    fn input_spawns_thread_and_lists_it() {
        let mut controller = running();
        let out = run(&mut controller, "input grief 0.95");
        assert!(out.lines.iter().any(|l| l.starts_with("spawned")));
        assert!(out.lines.iter().any(|l| l == "applied immediately"));

        run(&mut controller, "tick");
        let out = run(&mut controller, "threads");
        assert!(out.lines[0].contains("grief"));
    }

    #[test]
    fn failures_render_instead_of_erroring() {
        let mut controller = running();
        let out = run(&mut controller, "kill 99");
        assert!(!out.success);
        assert!(out.lines[0].starts_with("kill:"));

        let out = run(&mut controller, "rollback");
        assert!(out.success, "kill snapshotted before failing");
        let out = run(&mut controller, "rollback");
        assert!(!out.success);
    }

    #[test]
    fn calm_strategies_reach_regulation() {
        let Ok(Command::Action { params, .. }) =
            parse_command("calm fear --strategy acceptance --duration 1500")
        else {
            panic!("expected calm");
        };
        assert_eq!(params.strategy.as_deref(), Some("acceptance"));
        assert_eq!(params.duration_ms, Some(1_500));

        let mut controller = running();
        assert!(run(&mut controller, "calm anger --strategy suppression").success);
        let again = run(&mut controller, "calm anger --strategy suppression");
        assert!(!again.success, "{:?}", again.lines);

        assert!(run(&mut controller, "calm fear --strategy acceptance --duration 1500").success);
        assert_eq!(controller.emotional().active_regulations().len(), 1);
    }

    #[test]
    fn dump_by_bucket() {
        let mut controller = running();
        run(&mut controller, r#"remember longTerm 0.9 fear "the storm""#);
        run(&mut controller, r#"remember longTerm 0.1 joy "tea""#);
        let out = run(&mut controller, "dump --bucket high");
        assert!(out.success);
        assert!(out.lines.iter().any(|l| l.contains("the storm")));
        assert!(!out.lines.iter().any(|l| l.contains("tea")));
    }

    #[test]
    fn status_metrics_and_help() {
        let mut controller = running();
        run(&mut controller, "ps");
        let status = run(&mut controller, "status");
        assert!(status.lines[0].contains("status running"));
        assert!(status.lines[1].contains("(0.0%)"));
        let metrics = run(&mut controller, "metrics");
        assert!(metrics.lines.iter().any(|l| l == "psyche_actions_executed_total 1"));
        assert!(run(&mut controller, "help").lines.len() > 5);
    }
}
