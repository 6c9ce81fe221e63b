use crate::error::SessionError;

use std::sync::mpsc as std_mpsc;
use std::thread;

use ansi_term::Colour;
use async_trait::async_trait;
use log::{debug, error};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

/// One answer from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompted {
    Line(String),
    /// Ctrl-C while the prompt had the terminal
    Interrupted,
    /// Ctrl-D, closed stdin or a broken terminal
    Closed,
}

#[async_trait]
pub trait CommandSource: Send {
    async fn next_line(&mut self) -> Prompted;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    Off,
    On,
    Quit,
}

impl RelayCommand {
    /// Bytes written to the device, `None` for commands that write nothing.
    pub fn payload(self) -> Option<&'static [u8]> {
        match self {
            RelayCommand::Off => Some(b"0".as_slice()),
            RelayCommand::On => Some(b"1".as_slice()),
            RelayCommand::Quit => None,
        }
    }
}

pub fn parse_command(input: &str) -> Result<RelayCommand, SessionError> {
    match input.trim() {
        "0" => Ok(RelayCommand::Off),
        "1" => Ok(RelayCommand::On),
        "q" | "Q" => Ok(RelayCommand::Quit),
        other => Err(SessionError::InvalidInput(other.to_string())),
    }
}

fn prompt_loop(prompt: String, requests: std_mpsc::Receiver<()>, lines: mpsc::Sender<Prompted>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            error!("Unable to open terminal for input: {}", err);
            let _ = lines.blocking_send(Prompted::Closed);
            return;
        }
    };
    while requests.recv().is_ok() {
        let answer = match editor.readline(&prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                Prompted::Line(line)
            }
            Err(ReadlineError::Interrupted) => Prompted::Interrupted,
            Err(ReadlineError::Eof) => Prompted::Closed,
            Err(err) => {
                error!("Terminal read failed: {}", err);
                Prompted::Closed
            }
        };
        let done = !matches!(answer, Prompted::Line(_));
        if lines.blocking_send(answer).is_err() || done {
            break;
        }
    }
    debug!("prompt thread exiting");
}

/// Reads commands from the terminal on a dedicated thread.
///
/// The thread is started on the first request and only shows a prompt when
/// the controller asks for the next line, so log output from the previous
/// command lands before the next prompt. A plain OS thread is used because a
/// blocked stdin read would otherwise hold up runtime shutdown.
pub struct TerminalInput {
    prompt: String,
    channels: Option<(std_mpsc::Sender<()>, mpsc::Receiver<Prompted>)>,
}

impl TerminalInput {
    pub fn new(label: &str) -> Self {
        let prompt = format!("{} ", Colour::Purple.bold().paint(label));
        TerminalInput { prompt, channels: None }
    }
}

#[async_trait]
impl CommandSource for TerminalInput {
    async fn next_line(&mut self) -> Prompted {
        let prompt = &self.prompt;
        let (requests, lines) = self.channels.get_or_insert_with(|| {
            let (req_tx, req_rx) = std_mpsc::channel();
            let (line_tx, line_rx) = mpsc::channel(1);
            let prompt = prompt.clone();
            thread::spawn(move || prompt_loop(prompt, req_rx, line_tx));
            (req_tx, line_rx)
        });
        if requests.send(()).is_err() {
            return Prompted::Closed;
        }
        lines.recv().await.unwrap_or(Prompted::Closed)
    }
}
