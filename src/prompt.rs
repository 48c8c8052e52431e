// icinga2ctl - CLI for the Icinga 2 HTTP API
// Copyright (C) 2024 The icinga2ctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Interactive fallback for values not given on the command line.

use crate::methods::Comment;
use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

/// Builds a [`Comment`], asking on the terminal for whatever was not passed
/// on the command line.
pub fn comment(operator: Option<String>, text: Option<String>) -> Result<Comment> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stderr();
    comment_from(&mut input, &mut output, operator, text, current_user())
}

/// Asks one question on the terminal; an empty answer takes `default`.
pub fn value(question: &str, default: Option<&str>) -> Result<String> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    ask(&mut input, &mut io::stderr(), question, default)
}

/// Asks for a secret without echoing it. Falls back to a plain line read
/// when stdin is not a terminal.
pub fn secret(question: &str) -> Result<String> {
    let mut output = io::stderr();
    write!(output, "{question}: ").context("writing prompt")?;
    output.flush().context("flushing prompt")?;

    let stdin = io::stdin();
    if !stdin.is_terminal() || enable_raw_mode().is_err() {
        let mut line = String::new();
        stdin.lock().read_line(&mut line).context("reading answer")?;
        return required_answer(question, line.trim_end_matches(['\r', '\n']));
    }
    let keys = std::iter::from_fn(|| match event::read() {
        Ok(Event::Key(key)) => Some(Ok(key)),
        Ok(_) => Some(Ok(KeyEvent::new(KeyCode::Null, KeyModifiers::NONE))),
        Err(e) => Some(Err(e)),
    });
    let answer = read_secret(keys);
    let _ = disable_raw_mode();
    writeln!(output).context("writing prompt")?;
    required_answer(question, &answer?)
}

/// Collects key presses up to Enter. Ctrl-C aborts.
fn read_secret<I>(keys: I) -> Result<String>
where
    I: IntoIterator<Item = io::Result<KeyEvent>>,
{
    let mut secret = String::new();
    for key in keys {
        let key = key.context("reading key")?;
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                bail!("interrupted")
            }
            KeyCode::Char(ch) => secret.push(ch),
            KeyCode::Backspace => {
                secret.pop();
            }
            _ => {}
        }
    }
    bail!("input ended before the secret was entered")
}

fn required_answer(question: &str, answer: &str) -> Result<String> {
    if answer.is_empty() {
        bail!("{question} is required");
    }
    Ok(answer.to_string())
}

fn comment_from<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    operator: Option<String>,
    text: Option<String>,
    default_operator: Option<String>,
) -> Result<Comment> {
    let author = match operator.filter(|o| !o.trim().is_empty()) {
        Some(author) => author,
        None => ask(input, output, "Operator name", default_operator.as_deref())?,
    };
    let text = match text.filter(|t| !t.trim().is_empty()) {
        Some(text) => text,
        None => ask(input, output, "Comment", None)?,
    };
    Ok(Comment::new(author, text))
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: Option<&str>,
) -> Result<String> {
    let written = match default {
        Some(default) => write!(output, "{question} [{default}]: "),
        None => write!(output, "{question}: "),
    };
    written.context("writing prompt")?;
    output.flush().context("flushing prompt")?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("reading answer")?;
    let answer = line.trim();

    if !answer.is_empty() {
        return Ok(answer.to_string());
    }
    match default {
        Some(default) => Ok(default.to_string()),
        None if read == 0 => bail!("{question} is required but input ended"),
        None => bail!("{question} is required"),
    }
}

fn current_user() -> Option<String> {
    ["USER", "USERNAME"]
        .into_iter()
        .find_map(|key| env::var(key).ok())
        .filter(|name| !name.is_empty())
}
