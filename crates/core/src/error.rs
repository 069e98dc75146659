use atelier_llm::ProviderError;
use snafu::Snafu;

/// User action an error belongs to; selects the message shown for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Chat,
    GenerateImage,
    EditImage,
    History,
}

/// Stable error classification, independent of the transport's wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    NoImageProduced,
    OutOfRange,
    NoBaseArtifact,
    EmptyInput,
    SessionInactive,
    SubmissionInFlight,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SuiteError {
    #[snafu(display("remote call for {operation:?} failed on `{stage}`, {source}"))]
    Transport {
        stage: &'static str,
        operation: Operation,
        source: ProviderError,
    },
    #[snafu(display("reply stream failed on `{stage}`: {message}"))]
    StreamFailed {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("no image was produced for {operation:?} on `{stage}`"))]
    NoImageProduced {
        stage: &'static str,
        operation: Operation,
    },
    #[snafu(display("version index {index} is out of range for {len} versions"))]
    OutOfRange {
        stage: &'static str,
        index: usize,
        len: usize,
    },
    #[snafu(display("no base artifact is loaded on `{stage}`"))]
    NoBaseArtifact { stage: &'static str },
    #[snafu(display("input for {operation:?} is blank"))]
    EmptyInput {
        stage: &'static str,
        operation: Operation,
    },
    #[snafu(display("conversation is no longer active on `{stage}`"))]
    SessionInactive { stage: &'static str },
    #[snafu(display("a reply is already streaming on `{stage}`"))]
    SubmissionInFlight { stage: &'static str },
}

pub type SuiteResult<T> = Result<T, SuiteError>;

impl SuiteError {
    /// Classifies a provider failure for the given user action.
    pub fn from_provider(stage: &'static str, operation: Operation, error: ProviderError) -> Self {
        match error {
            ProviderError::NoImageProduced { .. } => SuiteError::NoImageProduced { stage, operation },
            ProviderError::EmptyPrompt { .. } => SuiteError::EmptyInput { stage, operation },
            source => SuiteError::Transport {
                stage,
                operation,
                source,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SuiteError::Transport { .. } | SuiteError::StreamFailed { .. } => ErrorKind::Transport,
            SuiteError::NoImageProduced { .. } => ErrorKind::NoImageProduced,
            SuiteError::OutOfRange { .. } => ErrorKind::OutOfRange,
            SuiteError::NoBaseArtifact { .. } => ErrorKind::NoBaseArtifact,
            SuiteError::EmptyInput { .. } => ErrorKind::EmptyInput,
            SuiteError::SessionInactive { .. } => ErrorKind::SessionInactive,
            SuiteError::SubmissionInFlight { .. } => ErrorKind::SubmissionInFlight,
        }
    }

    /// Key into the locale catalog for the message shown to the user.
    pub fn message_key(&self) -> &'static str {
        match self {
            SuiteError::Transport { operation, .. } => match operation {
                Operation::Chat => "error_generate_text_stream",
                Operation::GenerateImage => "error_generate_image",
                Operation::EditImage | Operation::History => "error_edit_image",
            },
            SuiteError::StreamFailed { .. } => "error_generate_text_stream",
            SuiteError::NoImageProduced { operation, .. } => match operation {
                Operation::GenerateImage => "error_no_image_generated",
                _ => "error_no_edited_image",
            },
            SuiteError::OutOfRange { .. } => "error_history_index",
            SuiteError::NoBaseArtifact { .. } => "error_upload_first",
            SuiteError::EmptyInput { .. } => "error_empty_input",
            SuiteError::SessionInactive { .. } => "error_session_closed",
            SuiteError::SubmissionInFlight { .. } => "error_session_busy",
        }
    }
}
