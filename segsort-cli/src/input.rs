//! Operator command parsing for the interactive loop.

use segsort_core::OperatorAction;

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Accept/reject, through a key or a word.
    Action(OperatorAction),
    /// Rerun the pipeline on a stalled file.
    Retry,
    /// Leave a stalled file in place and move on.
    Skip,
    Help,
    Quit,
    /// Blank line; redraw the status.
    Status,
    /// Anything else.
    Unknown,
}

/// Map a trimmed input line onto a [`Command`].
///
/// Single characters are forwarded as key presses; `accept`/`reject` are the control
/// equivalents of `v`/`i`.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (None, _) => return Command::Status,
        (Some(key), None) => {
            return match key.to_ascii_lowercase() {
                'r' => Command::Retry,
                's' => Command::Skip,
                'q' => Command::Quit,
                'h' | '?' => Command::Help,
                _ => Command::Action(OperatorAction::Key(key)),
            };
        }
        _ => {}
    }

    match line.to_ascii_lowercase().as_str() {
        "accept" | "valid" => Command::Action(OperatorAction::Accept),
        "reject" | "invalid" => Command::Action(OperatorAction::Reject),
        "retry" => Command::Retry,
        "skip" => Command::Skip,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown,
    }
}

pub const HELP: &str = "\
  v, accept   accept the current file
  i, reject   reject the current file
  r, retry    rerun segmentation on a file that failed
  s, skip     leave a failed file in place and move on
  q, quit     stop (remaining files stay in the input directory)";
