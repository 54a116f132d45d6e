use std::path::PathBuf;

/// One line typed into the terminal client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Upload(Vec<PathBuf>),
    Delete(String),
    Documents,
    Help,
    Quit,
    Empty,
}

pub const HELP_TEXT: &str = "\
commands:
  /upload <path>...   attach documents
  /delete <id>        remove an attached document
  /docs               list attached documents
  /help               show this help
  /quit               exit
anything else is sent as a chat message";

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arguments: Vec<&str> = parts.collect();
        match (name, arguments.as_slice()) {
            ("upload", paths) if !paths.is_empty() => {
                Self::Upload(paths.iter().map(PathBuf::from).collect())
            }
            ("delete", [document_id]) => Self::Delete((*document_id).to_string()),
            ("docs", []) => Self::Documents,
            ("quit" | "exit", []) => Self::Quit,
            ("help", _) => Self::Help,
            // Unknown commands are chat text that happens to start with a slash.
            _ => Self::Message(line.to_string()),
        }
    }
}
