//! Terminal rendering of session events.
//!
//! Assistant replies arrive as accumulate-and-replace updates. The renderer
//! prints only the new suffix when the text grows, and starts a fresh line
//! if an update ever rewrites what was already shown.

use std::io::{self, Write};

use uuid::Uuid;

use sentinel_core::events::ChatEvent;
use sentinel_core::types::{Profile, Role};

const ASSISTANT_LABEL: &str = "sentinel> ";

/// Writes the transcript to a terminal-like sink.
pub struct TranscriptRenderer<W: Write> {
    out: W,
    /// The assistant turn currently streaming.
    reply: Option<Uuid>,
    /// Text of `reply` already written.
    shown: String,
    label_written: bool,
}

impl<W: Write> TranscriptRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            reply: None,
            shown: String::new(),
            label_written: false,
        }
    }

    pub fn handle(&mut self, event: &ChatEvent) -> io::Result<()> {
        match event {
            ChatEvent::TurnAppended { turn } if turn.role == Role::Assistant => {
                self.reply = Some(turn.id);
                self.shown.clear();
                self.label_written = false;
            }
            ChatEvent::TurnUpdated { id, text } if Some(*id) == self.reply => {
                self.write_reply(text)?;
            }
            ChatEvent::StatusChanged { text } if !text.is_empty() => {
                writeln!(self.out, "  \u{b7} {text}")?;
            }
            ChatEvent::ErrorRaised { message } => {
                self.end_reply_line()?;
                writeln!(self.out, "  ! {message}")?;
            }
            ChatEvent::InFlightChanged { in_flight: false } => {
                self.end_reply_line()?;
                self.reply = None;
            }
            ChatEvent::SessionReset => {
                self.end_reply_line()?;
                self.reply = None;
                writeln!(self.out, "-- session cleared --")?;
            }
            _ => {}
        }
        self.out.flush()
    }

    fn write_reply(&mut self, text: &str) -> io::Result<()> {
        if !self.label_written {
            write!(self.out, "{ASSISTANT_LABEL}")?;
            self.label_written = true;
        }
        match text.strip_prefix(self.shown.as_str()) {
            Some(suffix) => write!(self.out, "{suffix}")?,
            None => write!(self.out, "\n{ASSISTANT_LABEL}{text}")?,
        }
        self.shown.clear();
        self.shown.push_str(text);
        Ok(())
    }

    fn end_reply_line(&mut self) -> io::Result<()> {
        if self.label_written {
            writeln!(self.out)?;
            self.label_written = false;
        }
        Ok(())
    }

    /// Print a line outside the event stream (banners, prompts' context).
    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Overwrite the current line, for live countdowns.
    pub fn status_line(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "\r\x1b[2K{text}")?;
        self.out.flush()
    }

    pub fn clear_status_line(&mut self) -> io::Result<()> {
        self.status_line("")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// The dossier record as shown by `sentinel profile`.
pub fn dossier_record(profile: Option<&Profile>) -> String {
    match profile {
        Some(p) => format!(
            "Dossier Record\n  Identity:   {}\n  Objective:  {}\n  Constraint: {}",
            p.name, p.primary_goal, p.main_blocker
        ),
        None => "Dossier Record\n  Calibration Incomplete.".to_string(),
    }
}

/// Header shown when the session opens on the home view.
pub fn home_banner(profile: Option<&Profile>) -> String {
    let name = profile.map(|p| p.name.as_str()).unwrap_or("unknown");
    format!("Aura Command\nStatus: Synchronized with {name}")
}
