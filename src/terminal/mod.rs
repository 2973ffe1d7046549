//! Live quote table and user confirmation.
//!
//! Renders the evolving candidate set in place (no scrolling), stars the
//! current winner, and races the quote stream against the keyboard. Enter
//! executes the winner, Ctrl+C cancels; both cancel the stream before
//! returning. When stdout is not a TTY the in-place updates are skipped
//! and a single summary line is printed at the end.

use std::io::{IsTerminal, Write};

use futures_util::{Stream, StreamExt};
use rust_decimal::prelude::*;

use crate::error::SwapError;
use crate::quotes::{Quote, QuoteStream};
use crate::shared::fmt::{display_amount, display_rate};
use crate::shared::scaling::from_base_units;

/// Decimals and labels for the two sides of the table.
#[derive(Debug, Clone)]
pub struct QuoteDisplayConfig {
    pub symbol_in: String,
    pub symbol_out: String,
    pub decimals_in: u8,
    pub decimals_out: u8,
}

/// A keyboard event the display reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Enter,
    Interrupt,
    Other,
}

const STAR: &str = "★";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Consume the stream until the user confirms or cancels.
///
/// Returns the confirmed winning quote, or `None` on cancellation. The
/// stream is cancelled on every exit path, so no further batches are
/// observable once this returns.
pub async fn confirm_quotes<K>(
    stream: &mut QuoteStream,
    cfg: &QuoteDisplayConfig,
    mut keys: K,
) -> Result<Option<Quote>, SwapError>
where
    K: Stream<Item = KeyPress> + Unpin,
{
    let interactive = std::io::stdout().is_terminal();
    let mut drawn_lines = 0usize;
    let mut stream_done = false;

    if interactive {
        drawn_lines = draw(stream, cfg, drawn_lines);
    }

    // Resolve which side woke us before touching the stream again, so the
    // select arms hold no borrows into the handling code.
    enum Step {
        Batch(Result<Option<()>, SwapError>),
        Key(Option<KeyPress>),
    }

    loop {
        let step = if stream_done {
            Step::Key(keys.next().await)
        } else {
            tokio::select! {
                batch = stream.next_batch() => Step::Batch(batch.map(|b| b.map(|_| ()))),
                key = keys.next() => Step::Key(key),
            }
        };

        match step {
            Step::Batch(Ok(Some(()))) => {
                if interactive {
                    drawn_lines = draw(stream, cfg, drawn_lines);
                }
            }
            Step::Batch(Ok(None)) => {
                // Server ended the stream; the last winner stays valid
                // for confirmation.
                stream_done = true;
                if stream.winning().is_none() {
                    clear(drawn_lines);
                    return Err(SwapError::NoQuotes);
                }
            }
            Step::Batch(Err(e)) => {
                clear(drawn_lines);
                stream.cancel().await;
                return Err(e);
            }
            Step::Key(Some(KeyPress::Enter)) => {
                if let Some(winner) = stream.winning().cloned() {
                    stream.cancel().await;
                    clear(drawn_lines);
                    print_summary(&winner, cfg);
                    return Ok(Some(winner));
                }
                // Nothing to confirm yet; keep streaming.
            }
            Step::Key(Some(KeyPress::Interrupt)) | Step::Key(None) => {
                stream.cancel().await;
                clear(drawn_lines);
                println!("{DIM}swap cancelled{RESET}");
                return Ok(None);
            }
            Step::Key(Some(KeyPress::Other)) => {}
        }
    }
}

fn render_route(route: &[String]) -> String {
    if route.is_empty() {
        return "Direct".to_string();
    }
    let shown: Vec<&str> = route
        .iter()
        .take(3)
        .map(|venue| venue.split_whitespace().next().unwrap_or(venue))
        .collect();
    let mut rendered = shown.join(" > ");
    if route.len() > 3 {
        rendered.push_str(&format!(" +{}", route.len() - 3));
    }
    rendered
}

fn render_rows(stream: &QuoteStream, cfg: &QuoteDisplayConfig) -> Vec<String> {
    let winner = stream.winning().map(|q| q.provider_id.clone());
    let mut quotes: Vec<&Quote> = stream.latest().quotes.iter().collect();
    quotes.sort_by(|a, b| b.out_amount.cmp(&a.out_amount));

    let mut lines = Vec::with_capacity(quotes.len() + 4);
    lines.push(format!("{BOLD}Live quotes{RESET}"));
    lines.push(format!(
        "{DIM}{:<2}{:<16}{:<22}{:>14}{:>14}{:>12}{RESET}",
        "",
        "Provider",
        "Route",
        format!("In {}", cfg.symbol_in),
        format!("Out {}", cfg.symbol_out),
        "Rate"
    ));

    for quote in quotes {
        let is_winner = winner.as_deref() == Some(quote.provider_id.as_str());
        let marker = if is_winner { STAR } else { " " };
        let color = if is_winner { GREEN } else { "" };
        let in_human = from_base_units(quote.in_amount, cfg.decimals_in);
        let out_human = from_base_units(quote.out_amount, cfg.decimals_out);
        let rate = if in_human.is_zero() {
            0.0
        } else {
            (out_human / in_human).to_f64().unwrap_or(0.0)
        };
        lines.push(format!(
            "{color}{:<2}{:<16}{:<22}{:>14}{:>14}{:>12}{RESET}",
            marker,
            truncate(&quote.provider_id, 15),
            truncate(&render_route(&quote.route), 21),
            display_amount(&in_human),
            display_amount(&out_human),
            display_rate(rate),
        ));
    }

    if lines.len() == 2 {
        lines.push(format!("{DIM}waiting for quotes...{RESET}"));
    }
    lines.push(format!(
        "{DIM}press {BOLD}Enter{RESET}{DIM} to execute the starred quote, Ctrl+C to cancel{RESET}"
    ));
    lines
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        text.chars().take(width.saturating_sub(1)).collect::<String>() + "…"
    }
}

fn draw(stream: &QuoteStream, cfg: &QuoteDisplayConfig, previous_lines: usize) -> usize {
    clear(previous_lines);
    let lines = render_rows(stream, cfg);
    let mut stdout = std::io::stdout().lock();
    for line in &lines {
        let _ = writeln!(stdout, "{line}");
    }
    let _ = stdout.flush();
    lines.len()
}

fn clear(lines: usize) {
    if lines == 0 {
        return;
    }
    let mut stdout = std::io::stdout().lock();
    for _ in 0..lines {
        // Cursor up one line, then erase it.
        let _ = write!(stdout, "\x1b[F\x1b[K");
    }
    let _ = stdout.flush();
}

fn print_summary(quote: &Quote, cfg: &QuoteDisplayConfig) {
    let in_human = from_base_units(quote.in_amount, cfg.decimals_in);
    let out_human = from_base_units(quote.out_amount, cfg.decimals_out);
    println!(
        "{GREEN}selected{RESET} {BOLD}{}{RESET}: {} {} -> {} {}",
        quote.provider_id,
        display_amount(&in_human),
        cfg.symbol_in,
        display_amount(&out_human),
        cfg.symbol_out,
    );
}

// ─── Real keyboard input ─────────────────────────────────────────────────────

/// Puts the terminal in raw mode for the lifetime of the guard.
pub struct RawModeGuard {
    active: bool,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}

/// Keyboard events from the controlling terminal.
///
/// Raw mode is required for unbuffered keys; it is released when the
/// returned guard drops.
pub fn interactive_keys() -> std::io::Result<(RawModeGuard, impl Stream<Item = KeyPress> + Unpin)> {
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

    crossterm::terminal::enable_raw_mode()?;
    let guard = RawModeGuard { active: true };

    let events = crossterm::event::EventStream::new().filter_map(|event| async move {
        match event {
            Ok(Event::Key(KeyEvent {
                code: KeyCode::Enter,
                ..
            })) => Some(KeyPress::Enter),
            Ok(Event::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers,
                ..
            })) if modifiers.contains(KeyModifiers::CONTROL) => Some(KeyPress::Interrupt),
            Ok(Event::Key(_)) => Some(KeyPress::Other),
            _ => None,
        }
    });

    Ok((guard, Box::pin(events)))
}

/// Line-buffered fallback for a piped stdin: any line confirms, EOF
/// cancels.
pub fn piped_keys() -> impl Stream<Item = KeyPress> + Unpin {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(KeyPress::Enter).is_err() {
                        break;
                    }
                }
            }
        }
    });
    Box::pin(tokio_stream_from(rx))
}

fn tokio_stream_from<T>(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<T>,
) -> impl Stream<Item = T> + Unpin {
    Box::pin(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_route_direct() {
        assert_eq!(render_route(&[]), "Direct");
    }

    #[test]
    fn test_render_route_truncates_long_paths() {
        let route: Vec<String> = ["Orca Whirlpool", "Raydium CLMM", "Meteora", "Phoenix", "Lifinity"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rendered = render_route(&route);
        assert_eq!(rendered, "Orca > Raydium > Meteora +2");
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-much-longer-name", 8), "a-much-…");
    }

    #[test]
    fn test_key_press_equality() {
        assert_eq!(KeyPress::Enter, KeyPress::Enter);
        assert_ne!(KeyPress::Enter, KeyPress::Interrupt);
    }
}
