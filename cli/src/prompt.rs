//! Interactive conflict resolution and plan confirmation.

use crate::cli::OnConflict;
use marksync_engine::{Conflict, ConflictKind, ConflictPolicy, FixedPolicy, Resolution};
use std::io::{self, BufRead, Write};
use tracing::warn;

const CELL_WIDTH: usize = 48;

/// Asks the user about each conflict.
pub struct InteractivePolicy<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractivePolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, conflict: &Conflict) -> io::Result<Resolution> {
        write!(self.output, "{}", render_conflict(conflict))?;
        loop {
            write!(self.output, "Keep [l]ocal, keep [r]emote, or [a]bort? ")?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Ok(Resolution::Abort);
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "l" | "local" => return Ok(Resolution::KeepLocal),
                "r" | "remote" => return Ok(Resolution::KeepRemote),
                "a" | "abort" => return Ok(Resolution::Abort),
                _ => continue,
            }
        }
    }
}

impl<R: BufRead, W: Write> ConflictPolicy for InteractivePolicy<R, W> {
    fn resolve(&mut self, conflict: &Conflict) -> Resolution {
        self.ask(conflict).unwrap_or_else(|err| {
            warn!(identity = %conflict.identity, error = %err, "could not ask, aborting");
            Resolution::Abort
        })
    }
}

/// Where questions go: stderr when stdout is reserved for JSON.
pub fn prompt_output(json: bool) -> Box<dyn Write> {
    if json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    }
}

/// The policy selected on the command line.
pub fn policy_for(on_conflict: OnConflict, json: bool) -> Box<dyn ConflictPolicy> {
    match on_conflict {
        OnConflict::Ask => Box::new(InteractivePolicy::new(io::stdin().lock(), prompt_output(json))),
        OnConflict::Local => Box::new(FixedPolicy::keep_local()),
        OnConflict::Remote => Box::new(FixedPolicy::keep_remote()),
        OnConflict::Abort => Box::new(FixedPolicy::new(Resolution::Abort)),
    }
}

/// A side-by-side table of the differing fields.
pub fn render_conflict(conflict: &Conflict) -> String {
    let why = match conflict.kind {
        ConflictKind::BothChanged => "changed on both sides",
        ConflictKind::Unexplained => "differs, but neither side recorded a change",
    };
    let mut out = format!("\n{} ({}) {why}\n", conflict.title, conflict.identity);
    out.push_str(&format!(
        "  {:<12} {:<w$} {}\n",
        "field",
        "local",
        "remote",
        w = CELL_WIDTH
    ));
    for diff in &conflict.diffs {
        out.push_str(&format!(
            "  {:<12} {:<w$} {}\n",
            diff.field.name(),
            cell(&diff.local),
            cell(&diff.remote),
            w = CELL_WIDTH
        ));
    }
    out
}

fn cell(value: &str) -> String {
    let flat = value.replace('\n', "\\n");
    if flat.chars().count() <= CELL_WIDTH {
        return flat;
    }
    let mut cut: String = flat.chars().take(CELL_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}

/// Ask a yes/no question; anything but yes is no.
pub fn confirm<R: BufRead, W: Write>(mut input: R, mut output: W, question: &str) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marksync_engine::{diff, Bookmark, Field};
    use std::io::Cursor;

    fn conflict() -> Conflict {
        let local = Bookmark::new("http://a", "Local title");
        let remote = Bookmark::new("http://a", "Remote title");
        Conflict {
            identity: "0123456789".into(),
            kind: ConflictKind::BothChanged,
            title: "Local title".into(),
            diffs: diff(&local, &remote, &[Field::Title]),
        }
    }

    #[test]
    fn reprompts_until_valid() {
        let mut output = Vec::new();
        let mut policy = InteractivePolicy::new(Cursor::new("x\n\nR\n"), &mut output);
        assert_eq!(policy.resolve(&conflict()), Resolution::KeepRemote);

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("[a]bort?").count(), 3);
        assert!(shown.contains("Remote title"));
    }

    #[test]
    fn end_of_input_aborts() {
        let mut policy = InteractivePolicy::new(Cursor::new(""), Vec::new());
        assert_eq!(policy.resolve(&conflict()), Resolution::Abort);
    }

    #[test]
    fn table_lists_each_field() {
        let table = render_conflict(&conflict());
        assert!(table.contains("changed on both sides"));
        let row = table.lines().find(|line| line.trim_start().starts_with("title")).unwrap();
        assert!(row.contains("Local title") && row.contains("Remote title"));
    }

    #[test]
    fn long_values_are_cut() {
        let value = "x".repeat(100);
        assert_eq!(cell(&value).chars().count(), CELL_WIDTH);
        assert_eq!(cell("a\nb"), "a\\nb");
    }

    #[test]
    fn confirm_accepts_yes_only() {
        assert!(confirm(Cursor::new("y\n"), Vec::new(), "Apply?").unwrap());
        assert!(confirm(Cursor::new("YES\n"), Vec::new(), "Apply?").unwrap());
        assert!(!confirm(Cursor::new("\n"), Vec::new(), "Apply?").unwrap());
        assert!(!confirm(Cursor::new(""), Vec::new(), "Apply?").unwrap());
    }
}
