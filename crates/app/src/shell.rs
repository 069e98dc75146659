use std::path::PathBuf;
use std::sync::Arc;

use atelier_core::{
    Artifact, ConversationSession, HistorySnapshot, ImageEditor, ImageGenerator, Locale,
    StreamApplied, StreamPayload, SuiteError,
};
use atelier_llm::{AspectRatio, ChatSessionConfig, GenerativeProvider};
use snafu::{ResultExt, Snafu, ensure};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::settings::{ProviderSettings, SettingsStore};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Image(String),
    Ratio(AspectRatio),
    Load(PathBuf),
    Adopt,
    Edit(String),
    /// Zero-based version index; typed one-based.
    Select(usize),
    History,
    Save(PathBuf),
    Clear,
    Reset,
    Lang(Locale),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum CommandError {
    #[snafu(display("unknown command '/{name}'"))]
    Unknown { name: String },
    #[snafu(display("/{command} needs an argument"))]
    MissingArgument { command: &'static str },
    #[snafu(display("invalid value '{value}' for /{command}"))]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

impl CommandError {
    fn message_key(&self) -> &'static str {
        match self {
            CommandError::Unknown { .. } => "error_unknown_command",
            CommandError::MissingArgument { .. } => "error_empty_input",
            CommandError::InvalidArgument { .. } => "error_invalid_argument",
        }
    }
}

/// Parses one input line. Blank lines yield `None`; anything not starting
/// with `/` is a chat message.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Chat(line.to_string())));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "image" => Command::Image(required("image", argument)?.to_string()),
        "ratio" => {
            let raw = required("ratio", argument)?;
            Command::Ratio(raw.parse().map_err(|_| CommandError::InvalidArgument {
                command: "ratio",
                value: raw.to_string(),
            })?)
        }
        "load" => Command::Load(PathBuf::from(required("load", argument)?)),
        "adopt" => Command::Adopt,
        "edit" => Command::Edit(required("edit", argument)?.to_string()),
        "select" => {
            let raw = required("select", argument)?;
            let number = raw
                .parse::<usize>()
                .ok()
                .filter(|number| *number > 0)
                .ok_or_else(|| CommandError::InvalidArgument {
                    command: "select",
                    value: raw.to_string(),
                })?;
            Command::Select(number - 1)
        }
        "history" => Command::History,
        "save" => Command::Save(PathBuf::from(required("save", argument)?)),
        "clear" => Command::Clear,
        "reset" | "new" => Command::Reset,
        "lang" => {
            let raw = required("lang", argument)?;
            Command::Lang(raw.parse().map_err(|_| CommandError::InvalidArgument {
                command: "lang",
                value: raw.to_string(),
            })?)
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return UnknownSnafu {
                name: other.to_string(),
            }
            .fail();
        }
    };

    Ok(Some(command))
}

fn required<'a>(command: &'static str, argument: &'a str) -> Result<&'a str, CommandError> {
    ensure!(!argument.is_empty(), MissingArgumentSnafu { command });
    Ok(argument)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ShellError {
    #[snafu(display("failed to read input on `{stage}`, {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`, {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Line-oriented front end over the chat, generator and editor workflows.
pub struct Shell<W> {
    settings: SettingsStore,
    conversation: ConversationSession,
    generator: ImageGenerator,
    editor: ImageEditor,
    out: W,
}

impl<W> Shell<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(provider: Arc<dyn GenerativeProvider>, settings: SettingsStore, out: W) -> Self {
        let current = settings.settings();
        let chat_config = ChatSessionConfig {
            model: current.chat_model.clone(),
            grounding_enabled: current.grounding_enabled,
        };

        let conversation = ConversationSession::start(provider.clone(), chat_config);
        let mut generator = ImageGenerator::new(provider.clone());
        generator.set_aspect_ratio(current.aspect_ratio);
        let editor = ImageEditor::new(provider);

        Self {
            settings,
            conversation,
            generator,
            editor,
            out,
        }
    }

    /// Reads commands until `/quit` or end of input.
    pub async fn run<R>(&mut self, input: R) -> ShellResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        self.say("chatbot_initial_message").await?;

        loop {
            self.write("> ").await?;
            let Some(line) = lines.next_line().await.context(ReadInputSnafu {
                stage: "read-command",
            })?
            else {
                break;
            };

            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Err(error) => {
                    tracing::debug!(error = %error, "rejected command");
                    self.say(error.message_key()).await?;
                }
            }
        }

        self.conversation.close();
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> ShellResult<()> {
        match command {
            Command::Chat(text) => self.chat(&text).await,
            Command::Image(prompt) => {
                let outcome = self.generator.generate(&prompt).await.map(describe_artifact);
                match outcome {
                    Ok(description) => {
                        let ready = self.locale().message("shell_image_ready");
                        self.write_line(&format!("{ready} {description}")).await
                    }
                    Err(error) => self.report(&error).await,
                }
            }
            Command::Ratio(aspect_ratio) => {
                self.generator.set_aspect_ratio(aspect_ratio);
                self.update_settings(|settings| settings.aspect_ratio = aspect_ratio);
                self.write_line(aspect_ratio.as_str()).await
            }
            Command::Load(path) => {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        tracing::warn!(path = ?path, error = %error, "failed to read image file");
                        return self.say("error_read_file").await;
                    }
                };
                let content_type = mime_guess::from_path(&path)
                    .first()
                    .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();

                self.editor.load(Artifact::new(bytes, content_type));
                self.show_history().await
            }
            Command::Adopt => match self.generator.take() {
                Some(artifact) => {
                    self.editor.load(artifact);
                    self.show_history().await
                }
                None => self.say("error_no_image_generated").await,
            },
            Command::Edit(prompt) => match self.editor.edit(&prompt).await {
                Ok(snapshot) => self.show_snapshot(&snapshot).await,
                Err(error) => self.report(&error).await,
            },
            Command::Select(index) => match self.editor.select(index) {
                Ok(()) => self.show_history().await,
                Err(error) => self.report(&error).await,
            },
            Command::History => self.show_history().await,
            Command::Save(path) => self.save(path).await,
            Command::Clear => {
                self.editor.clear();
                self.say("shell_editor_cleared").await
            }
            Command::Reset => {
                self.conversation.reset();
                self.say("shell_conversation_reset").await
            }
            Command::Lang(locale) => {
                self.update_settings(|settings| settings.locale = locale);
                self.write_line(locale.as_str()).await
            }
            Command::Help => self.say("shell_help").await,
            Command::Quit => Ok(()),
        }
    }

    async fn chat(&mut self, text: &str) -> ShellResult<()> {
        let mut stream = match self.conversation.submit(text) {
            Ok(stream) => stream,
            Err(error) => return self.report(&error).await,
        };

        while let Some(event) = stream.next().await {
            let delta = match &event.payload {
                StreamPayload::Partial(partial) => partial.text.clone(),
                StreamPayload::Done | StreamPayload::Failed(_) => None,
            };

            match self.conversation.apply(event) {
                StreamApplied::Updated => {
                    if let Some(delta) = delta {
                        self.write(&delta).await?;
                    }
                }
                StreamApplied::Completed => {
                    self.write("\n").await?;
                    return self.show_sources().await;
                }
                StreamApplied::Failed(error) => {
                    self.write("\n").await?;
                    return self.report(&error).await;
                }
                StreamApplied::Ignored => {}
            }
        }

        Ok(())
    }

    async fn show_sources(&mut self) -> ShellResult<()> {
        let Some(sources) = self.conversation.current_sources().map(<[_]>::to_vec) else {
            return Ok(());
        };

        self.say("shell_sources").await?;
        for (number, source) in sources.iter().enumerate() {
            self.write_line(&format!("  [{}] {} <{}>", number + 1, source.title, source.uri))
                .await?;
        }
        Ok(())
    }

    async fn show_history(&mut self) -> ShellResult<()> {
        let Some(snapshot) = self.editor.history() else {
            return self.say("image_editor_upload_prompt").await;
        };
        let lines = self
            .editor
            .store()
            .versions()
            .iter()
            .enumerate()
            .map(|(index, artifact)| {
                let marker = if index == snapshot.active_index { '*' } else { ' ' };
                format!("{marker} {}  {}", index + 1, describe_artifact(artifact))
            })
            .collect::<Vec<_>>();

        for line in lines {
            self.write_line(&line).await?;
        }
        Ok(())
    }

    async fn show_snapshot(&mut self, snapshot: &HistorySnapshot) -> ShellResult<()> {
        let version = self.locale().message("shell_version");
        self.write_line(&format!(
            "{version} {}/{}  {}",
            snapshot.active_index + 1,
            snapshot.total,
            describe_artifact(&snapshot.current)
        ))
        .await
    }

    /// Writes the editor's active version, or the generated image when the
    /// editor is empty.
    async fn save(&mut self, path: PathBuf) -> ShellResult<()> {
        let artifact = self
            .editor
            .store()
            .current()
            .or_else(|| self.generator.current())
            .cloned();
        let Some(artifact) = artifact else {
            return self.say("error_nothing_to_save").await;
        };

        match tokio::fs::write(&path, artifact.bytes()).await {
            Ok(()) => {
                tracing::info!(path = ?path, bytes = artifact.bytes().len(), "image saved");
                self.say("shell_saved").await
            }
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to save image");
                self.say("error_write_file").await
            }
        }
    }

    fn locale(&self) -> Locale {
        self.settings.settings().locale
    }

    fn update_settings(&self, change: impl FnOnce(&mut ProviderSettings)) {
        let mut settings = ProviderSettings::clone(&self.settings.settings());
        change(&mut settings);
        self.settings.update(settings);
    }

    async fn report(&mut self, error: &SuiteError) -> ShellResult<()> {
        tracing::warn!(error = %error, kind = ?error.kind(), "operation failed");
        let message = self.locale().describe(error);
        self.write_line(message).await
    }

    async fn say(&mut self, key: &str) -> ShellResult<()> {
        let message = self.locale().message(key).to_string();
        self.write_line(&message).await
    }

    async fn write_line(&mut self, text: &str) -> ShellResult<()> {
        self.write(text).await?;
        self.write("\n").await
    }

    async fn write(&mut self, text: &str) -> ShellResult<()> {
        self.out
            .write_all(text.as_bytes())
            .await
            .context(WriteOutputSnafu {
                stage: "write-output",
            })?;
        self.out.flush().await.context(WriteOutputSnafu {
            stage: "flush-output",
        })
    }
}

fn describe_artifact(artifact: &Artifact) -> String {
    match artifact.dimensions() {
        Some((width, height)) => format!(
            "{} {width}x{height} ({})",
            artifact.content_type(),
            artifact.aspect_ratio()
        ),
        None => format!("{} {} bytes", artifact.content_type(), artifact.bytes().len()),
    }
}
