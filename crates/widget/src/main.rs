use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;

use chatpane::ChatWidget;
use chatpane::chat::{InputEvent, Key};
use chatpane::command::{Command, HELP_TEXT};
use chatpane::settings::SettingsStore;
use chatpane::surface::TerminalSurface;
use chatpane_client::{UploadFile, create_backend};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Terminal front end: one prompt per line, replies streamed in place.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatpane=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SettingsStore::load();
    let settings = store.settings();
    tracing::info!(path = ?store.config_path(), base_url = %settings.base_url, "loaded settings");

    let backend = match create_backend(settings.to_backend_config()) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(error = %error, "failed to create chat backend");
            return ExitCode::FAILURE;
        }
    };

    let surface = Rc::new(RefCell::new(TerminalSurface::new(std::io::stdout())));
    let widget = ChatWidget::new(backend, surface, &settings);

    println!("{HELP_TEXT}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(error = %error, "failed to read stdin");
                return ExitCode::FAILURE;
            }
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{HELP_TEXT}"),
            Command::Documents => {
                let documents = widget.documents();
                if documents.is_empty() {
                    println!("no documents attached");
                }
                for document in documents {
                    println!("{}  {}", document.id, document.filename);
                }
            }
            Command::Upload(paths) => {
                let mut files = Vec::with_capacity(paths.len());
                for path in &paths {
                    match read_upload(path).await {
                        Ok(file) => files.push(file),
                        Err(error) => {
                            tracing::warn!(path = ?path, error = %error, "skipping unreadable file");
                        }
                    }
                }
                if let Err(error) = widget.upload(files).await {
                    tracing::debug!(error = %error, "upload reported to the user");
                }
            }
            Command::Delete(document_id) => match widget.delete_document(&document_id).await {
                Ok(true) => {}
                Ok(false) => println!("no attached document with id {document_id}"),
                Err(error) => tracing::debug!(error = %error, "delete reported to the user"),
            },
            Command::Message(text) => {
                let result = async {
                    widget.handle_input(InputEvent::Edit(text)).await?;
                    widget
                        .handle_input(InputEvent::KeyPress {
                            key: Key::Enter,
                            shift: false,
                        })
                        .await
                }
                .await;
                if let Err(error) = result {
                    tracing::warn!(error = %error, "message not sent");
                }
            }
        }
    }

    ExitCode::SUCCESS
}

async fn read_upload(path: &Path) -> std::io::Result<UploadFile> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadFile::new(filename, bytes))
}
