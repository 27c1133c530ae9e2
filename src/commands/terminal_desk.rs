use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::thread;

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::placement::{DestinationDecision, NameProposal};
use crate::services::folder_service::{create_folder, is_within, list_dirs, relative_display};
use crate::services::operator_service::{DecisionRequest, DuplicateDecision, NameDecision};

/// Answers operator questions on a terminal. End of input counts as skip or
/// cancel for whatever is being asked.
pub struct TerminalDesk<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalDesk<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Serves requests until every sender is gone.
    pub fn serve(mut self, mut requests: mpsc::Receiver<DecisionRequest>) {
        while let Some(request) = requests.blocking_recv() {
            self.answer(request);
        }
    }

    pub fn answer(&mut self, request: DecisionRequest) {
        // A dropped receiver means the flow already gave up on this question.
        match request {
            DecisionRequest::ReviewName { proposal, reply } => {
                let _ = reply.send(self.review_name(&proposal));
            }
            DecisionRequest::ReviewDuplicate {
                filename,
                matches,
                reply,
            } => {
                let _ = reply.send(self.review_duplicate(&filename, &matches));
            }
            DecisionRequest::ChooseDestination {
                root,
                filename,
                reply,
            } => {
                let _ = reply.send(self.choose_destination(&root, &filename));
            }
            DecisionRequest::ConfirmMove { decision, reply } => {
                let _ = reply.send(self.confirm_move(&decision));
            }
        }
    }

    fn say(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.output, "{}", text.as_ref());
    }

    fn prompt(&mut self, text: &str) -> Option<String> {
        let _ = write!(self.output, "{text}");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    pub fn review_name(&mut self, proposal: &NameProposal) -> NameDecision {
        self.say("");
        self.say(format!("Original file: {}", proposal.original_name));
        self.say(format!("Title:         {}", proposal.title));
        self.say(format!("Proposed name: {}", proposal.proposed_name));
        match self.prompt("New name [Enter = accept, s = skip]: ") {
            None => NameDecision::Skip,
            Some(answer) if answer.eq_ignore_ascii_case("s") => NameDecision::Skip,
            Some(answer) if answer.is_empty() => {
                NameDecision::Accept(proposal.proposed_name.clone())
            }
            Some(answer) => NameDecision::Accept(answer),
        }
    }

    pub fn review_duplicate(&mut self, filename: &str, matches: &[PathBuf]) -> DuplicateDecision {
        self.say(format!("Possible duplicates of '{filename}':"));
        for path in matches {
            self.say(format!("  {}", path.display()));
        }
        match self.prompt("Add anyway? [y/N]: ") {
            Some(answer) if answer.eq_ignore_ascii_case("y") => DuplicateDecision::Proceed,
            _ => DuplicateDecision::Skip,
        }
    }

    /// Folder picker: a number descends, `n <name>` creates a folder here,
    /// `u` goes up, `r` returns to the root, `.` or Enter picks the current
    /// folder, `c` cancels.
    pub fn choose_destination(&mut self, root: &Path, filename: &str) -> Option<PathBuf> {
        let mut current = root.to_path_buf();
        loop {
            let dirs = list_dirs(&current);
            let here = if current == root {
                "(top level)".to_string()
            } else {
                relative_display(&current, root)
            };
            self.say(format!("Destination for '{filename}': {here}"));
            for (idx, dir) in dirs.iter().enumerate() {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.say(format!("  {}) {name}", idx + 1));
            }

            let answer = self.prompt("[number] open, n <name> new, u up, r root, Enter choose, c cancel: ")?;
            match answer.as_str() {
                "" | "." => return Some(current),
                "c" | "C" => return None,
                "r" | "R" => current = root.to_path_buf(),
                "u" | "U" => {
                    if let Some(parent) = current.parent() {
                        if current != root && is_within(parent, root) {
                            current = parent.to_path_buf();
                        }
                    }
                }
                other => {
                    if let Some(name) = other.strip_prefix("n ") {
                        match create_folder(&current, name) {
                            Ok(created) => current = created,
                            Err(e) => self.say(format!("Could not create folder: {e}")),
                        }
                    } else if let Some(dir) = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|idx| dirs.get(idx))
                    {
                        current = dir.clone();
                    } else {
                        self.say(format!("Unrecognized choice: {other}"));
                    }
                }
            }
        }
    }

    pub fn confirm_move(&mut self, decision: &DestinationDecision) -> bool {
        self.say(format!("Move to {}?", decision.target().display()));
        match self.prompt("[Y/n]: ") {
            Some(answer) => answer.is_empty() || answer.eq_ignore_ascii_case("y"),
            None => false,
        }
    }
}

/// Runs a desk on stdin/stdout on its own thread.
/// Refuses input that cannot reach a person. Reading prompts from a pipe or
/// `/dev/null` would turn every question into a skip.
pub fn ensure_interactive(input: &impl IsTerminal) -> Result<(), AppError> {
    if input.is_terminal() {
        Ok(())
    } else {
        Err(AppError::NotInteractive)
    }
}

pub fn spawn_terminal_desk(
    requests: mpsc::Receiver<DecisionRequest>,
) -> Result<thread::JoinHandle<()>, AppError> {
    ensure_interactive(&io::stdin())?;
    let handle = thread::Builder::new()
        .name("operator-desk".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            TerminalDesk::new(stdin.lock(), io::stdout()).serve(requests);
        })?;
    Ok(handle)
}
