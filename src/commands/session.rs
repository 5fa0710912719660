use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::SessionArgs;
use crate::commands::inventory;
use crate::engine::{Judgment, PairSelector, PersistenceStore, RandomPairSelector, Session};

const TOP_LIMIT: usize = 10;
const SNAPSHOT_LEADERS: usize = 3;
const HELP: &str = "l = left more degraded, r = right more degraded, s = similar, \
n = next, p = previous, t = top ranking, w = save, q = quit";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SessionCommand {
    Judge(Judgment),
    Next,
    Previous,
    Top,
    Save,
    Help,
    Quit,
}

pub fn run(args: SessionArgs) -> Result<()> {
    let candidates = inventory::load_candidates(&args.source)?;
    let store = PersistenceStore::new(args.source.results_dir());
    let selector = match args.seed {
        Some(seed) => RandomPairSelector::seeded(seed),
        None => RandomPairSelector::from_os_rng(),
    };

    let mut session = Session::open(candidates, store, selector, args.cadence)?;
    info!(
        results_dir = %session.store().results_dir().display(),
        items = session.candidates().len(),
        "judging session started"
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    drive(&mut session, stdin.lock(), &mut stdout.lock())
}

/// Reads one command per line until `quit` or end of input, then saves.
fn drive<S, R, W>(session: &mut Session<S>, input: R, output: &mut W) -> Result<()>
where
    S: PairSelector,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{HELP}")?;
    render_current(session, output)?;

    for line in input.lines() {
        let line = line.context("failed to read session input")?;
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                writeln!(output, "unrecognised command: {}", line.trim())?;
            }
            continue;
        };

        match command {
            SessionCommand::Judge(decision) => {
                let outcome = session.judge(decision)?;
                if let Some(snapshot) = outcome.snapshot {
                    match snapshot.variability {
                        Some(value) => writeln!(
                            output,
                            "snapshot at {} judgments, variability {value:.4}",
                            snapshot.sequence
                        )?,
                        None => writeln!(output, "snapshot at {} judgments", snapshot.sequence)?,
                    }
                    render_snapshot_leaders(session, output)?;
                }
                if let Some(err) = outcome.save_error {
                    writeln!(output, "save failed ({err:#}); use w to retry")?;
                }
            }
            SessionCommand::Next => {
                if session.can_advance() {
                    session.advance()?;
                } else {
                    writeln!(output, "judge the current pair before moving on")?;
                }
            }
            SessionCommand::Previous => {
                if !session.retreat() {
                    writeln!(output, "already at the first comparison")?;
                }
            }
            SessionCommand::Top => {
                render_top(session, output)?;
                continue;
            }
            SessionCommand::Save => match session.save() {
                Ok(()) => writeln!(output, "saved")?,
                Err(err) => {
                    warn!(error = %err, "manual save failed");
                    writeln!(output, "save failed ({err:#})")?;
                }
            },
            SessionCommand::Help => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            SessionCommand::Quit => break,
        }

        render_current(session, output)?;
    }

    session
        .save()
        .context("failed to save session state on exit")?;
    info!(
        total_judgments = session.total_judgments(),
        comparisons = session.ledger().len(),
        "judging session closed"
    );
    Ok(())
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let command = match line.trim().to_ascii_lowercase().as_str() {
        "l" | "left" => SessionCommand::Judge(Judgment::AMore),
        "r" | "right" => SessionCommand::Judge(Judgment::BMore),
        "s" | "same" => SessionCommand::Judge(Judgment::Equal),
        "n" | "next" => SessionCommand::Next,
        "p" | "prev" | "previous" => SessionCommand::Previous,
        "t" | "top" => SessionCommand::Top,
        "w" | "save" => SessionCommand::Save,
        "h" | "help" | "?" => SessionCommand::Help,
        "q" | "quit" | "exit" => SessionCommand::Quit,
        _ => return None,
    };
    Some(command)
}

fn render_current<S: PairSelector, W: Write>(session: &Session<S>, output: &mut W) -> Result<()> {
    let ledger = session.ledger();
    let (Some(index), Some((left, right))) = (ledger.cursor(), session.current_pair()) else {
        return Ok(());
    };

    let judged = session
        .current_entry()
        .and_then(|entry| entry.judgment())
        .map(|value| format!(" (judged: {})", value.as_str()))
        .unwrap_or_default();
    writeln!(
        output,
        "[{}/{}] left: {left} | right: {right}{judged}",
        index + 1,
        ledger.len()
    )?;
    Ok(())
}

fn render_snapshot_leaders<S: PairSelector, W: Write>(
    session: &Session<S>,
    output: &mut W,
) -> Result<()> {
    let Some(snapshot) = session.latest_snapshot() else {
        return Ok(());
    };
    let leaders = snapshot
        .ranking
        .iter()
        .take(SNAPSHOT_LEADERS)
        .map(|entry| format!("{} ({})", entry.item, entry.score))
        .collect::<Vec<_>>();
    writeln!(output, "  leaders: {}", leaders.join(", "))?;
    Ok(())
}

fn render_top<S: PairSelector, W: Write>(session: &Session<S>, output: &mut W) -> Result<()> {
    writeln!(output, "total judgments: {}", session.total_judgments())?;
    for (rank, (item, stats)) in session
        .stats()
        .ranking()
        .into_iter()
        .take(TOP_LIMIT)
        .enumerate()
    {
        writeln!(
            output,
            "{:>3}. {item} score={} samples={} w/l/d={}/{}/{}",
            rank + 1,
            stats.score,
            stats.samples,
            stats.wins,
            stats.losses,
            stats.draws
        )?;
    }
    if let Some(point) = session.series().last() {
        writeln!(
            output,
            "variability at {} judgments: {:.4}",
            point.judgments, point.variability
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::{SessionCommand, drive, parse_command};
    use crate::engine::{Judgment, PersistenceStore, RandomPairSelector, Session};

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn run_script(dir: &TempDir, script: &str) -> String {
        let store = PersistenceStore::new(dir.path());
        let mut session = Session::open(
            items(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]),
            store,
            RandomPairSelector::seeded(11),
            3,
        )
        .expect("open session");

        let mut output = Vec::new();
        drive(&mut session, Cursor::new(script.to_string()), &mut output).expect("drive session");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[test]
    fn parse_command_accepts_short_and_long_forms() {
        assert_eq!(
            parse_command(" L "),
            Some(SessionCommand::Judge(Judgment::AMore))
        );
        assert_eq!(
            parse_command("right"),
            Some(SessionCommand::Judge(Judgment::BMore))
        );
        assert_eq!(
            parse_command("same"),
            Some(SessionCommand::Judge(Judgment::Equal))
        );
        assert_eq!(parse_command("prev"), Some(SessionCommand::Previous));
        assert_eq!(parse_command("q"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("maybe"), None);
    }

    #[test]
    fn next_is_refused_on_an_unjudged_newest_pair() {
        let dir = TempDir::new().expect("create temp dir");
        let output = run_script(&dir, "n\nq\n");
        assert!(output.contains("judge the current pair before moving on"));
        assert!(output.contains("[1/1]"));
    }

    #[test]
    fn previous_is_refused_at_the_first_pair() {
        let dir = TempDir::new().expect("create temp dir");
        let output = run_script(&dir, "p\n");
        assert!(output.contains("already at the first comparison"));
    }

    #[test]
    fn judging_reports_snapshots_and_persists_on_exit() {
        let dir = TempDir::new().expect("create temp dir");
        let output = run_script(&dir, "l\nr\ns\nl\nr\ns\nt\nq\n");

        assert!(output.contains("snapshot at 3 judgments"));
        assert!(output.contains("snapshot at 6 judgments, variability"));
        assert_eq!(output.matches("  leaders: ").count(), 2);
        assert!(output.contains("total judgments: 6"));

        let store = PersistenceStore::new(dir.path());
        let raw = std::fs::read_to_string(store.stats_path()).expect("stats file written");
        assert!(raw.starts_with("Total Button Presses: 6\n\n"));
        assert!(store.snapshot_path(3).exists());
        assert!(store.snapshot_path(6).exists());
        assert!(store.stability_path().exists());
    }

    #[test]
    fn rejudging_after_navigation_keeps_the_judgment_count() {
        let dir = TempDir::new().expect("create temp dir");
        let output = run_script(&dir, "l\np\nr\nt\n");

        assert!(output.contains("(judged: a_more)"));
        assert!(output.contains("total judgments: 1"));
    }
}
