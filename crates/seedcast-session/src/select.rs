//! File selection for multi-file torrents.
//!
//! Runs at most once per session, only after the engine signals readiness.
//! The interactive prompt suspends all other rendering (the dashboard is
//! not started until selection has resolved) and treats an interrupt as a
//! clean cancellation, not an error.

use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, read};
use crossterm::terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode};
use crossterm::{QueueableCommand, cursor};
use seedcast_engine::FileDescriptor;

use crate::error::{SessionError, SessionResult};
use crate::fmt::human_bytes;

/// Outcome of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Act on this file index.
    Index(usize),
    /// Stop the session cleanly (listing printed, or prompt interrupted).
    Terminate,
}

/// Index of the first file achieving the maximum length, or `None` for an
/// empty list.
#[must_use]
pub fn default_index(files: &[FileDescriptor]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (position, file) in files.iter().enumerate() {
        match best {
            Some((_, length)) if file.length <= length => {}
            _ => best = Some((position, file.length)),
        }
    }
    best.map(|(position, _)| position)
}

/// Pick which file the session acts on.
///
/// - An explicit index is used verbatim; the engine performs its own
///   bounds handling.
/// - Interactive request on a real terminal: one-shot single-choice
///   prompt, default pre-selected.
/// - Interactive request without a terminal: enumerate every file once and
///   terminate cleanly; nothing is played or served afterwards.
/// - Otherwise the computed default is returned directly.
///
/// # Errors
///
/// Returns [`SessionError::EngineReported`] for an empty file list and
/// [`SessionError::Terminal`] when prompt IO fails.
pub async fn select(
    files: &[FileDescriptor],
    explicit_index: Option<usize>,
    interactive_requested: bool,
    is_tty: bool,
) -> SessionResult<Selection> {
    if let Some(index) = explicit_index {
        return Ok(Selection::Index(index));
    }

    if files.is_empty() {
        return Err(SessionError::EngineReported {
            message: "no files in the torrent".to_owned(),
        });
    }

    let default = default_index(files).unwrap_or(0);

    if !interactive_requested {
        return Ok(Selection::Index(default));
    }

    if !is_tty {
        let mut stdout = io::stdout();
        for line in listing_lines(files) {
            writeln!(stdout, "{line}")
                .map_err(|source| SessionError::terminal("select.listing", source))?;
        }
        return Ok(Selection::Terminate);
    }

    let rows: Vec<String> = files.iter().map(choice_label).collect();
    tokio::task::spawn_blocking(move || prompt(&rows, default))
        .await
        .map_err(|join_error| {
            SessionError::terminal("select.prompt_task", io::Error::other(join_error))
        })?
        .map_err(|source| SessionError::terminal("select.prompt", source))
}

/// Non-interactive listing, one row per file in index order.
#[must_use]
pub fn listing_lines(files: &[FileDescriptor]) -> Vec<String> {
    files.iter().map(choice_label).collect()
}

fn choice_label(file: &FileDescriptor) -> String {
    format!(
        "{index:>3}: {name} ({size})",
        index = file.index,
        name = file.name,
        size = human_bytes(file.length)
    )
}

/// One-shot single-choice prompt on the controlling terminal. An interrupt
/// (Esc, `q`, or ctrl-c) resolves to [`Selection::Terminate`].
fn prompt(rows: &[String], default: usize) -> io::Result<Selection> {
    let mut stdout = io::stdout();
    writeln!(stdout, "Choose a file to stream:")?;

    enable_raw_mode()?;
    let result = prompt_loop(&mut stdout, rows, default);
    disable_raw_mode()?;

    // Leave the cursor on a fresh line regardless of how the prompt ended.
    writeln!(stdout)?;
    result
}

fn prompt_loop(stdout: &mut io::Stdout, rows: &[String], default: usize) -> io::Result<Selection> {
    let mut cursor_at = default.min(rows.len().saturating_sub(1));
    draw_rows(stdout, rows, cursor_at, true)?;

    loop {
        let Event::Key(key) = read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key {
            KeyEvent {
                code: KeyCode::Up | KeyCode::Char('k'),
                ..
            } => {
                cursor_at = cursor_at.saturating_sub(1);
            }
            KeyEvent {
                code: KeyCode::Down | KeyCode::Char('j'),
                ..
            } => {
                cursor_at = (cursor_at + 1).min(rows.len() - 1);
            }
            KeyEvent {
                code: KeyCode::Enter,
                ..
            } => return Ok(Selection::Index(cursor_at)),
            KeyEvent {
                code: KeyCode::Esc | KeyCode::Char('q'),
                ..
            } => return Ok(Selection::Terminate),
            KeyEvent {
                code: KeyCode::Char('c'),
                modifiers: KeyModifiers::CONTROL,
                ..
            } => return Ok(Selection::Terminate),
            _ => continue,
        }
        draw_rows(stdout, rows, cursor_at, false)?;
    }
}

fn draw_rows(
    stdout: &mut io::Stdout,
    rows: &[String],
    cursor_at: usize,
    first_draw: bool,
) -> io::Result<()> {
    if !first_draw {
        let height = u16::try_from(rows.len()).unwrap_or(u16::MAX);
        stdout.queue(cursor::MoveUp(height))?;
    }
    for (position, row) in rows.iter().enumerate() {
        let marker = if position == cursor_at { '>' } else { ' ' };
        stdout
            .queue(MoveToColumn(0))?
            .queue(Clear(ClearType::CurrentLine))?;
        write!(stdout, "{marker} {row}")?;
        stdout.write_all(b"\r\n")?;
    }
    stdout.flush()
}
