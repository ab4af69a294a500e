use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} {value:?}, expected one of: {expected}")]
pub struct ParseOptionError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    AutoDetect,
    /// ISO 639-1 code such as `en` or `si`.
    Code(String),
}

impl Language {
    /// Empty input and the `auto` sentinel both mean auto-detect.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            Language::AutoDetect
        } else {
            Language::Code(trimmed.to_string())
        }
    }

    /// The code sent to the server; `None` for auto-detect, which is sent by omission.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::AutoDetect => None,
            Language::Code(code) => Some(code),
        }
    }
}

/// Quality/speed tiers, ordered fastest to most accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Model {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl Model {
    pub const ALL: [Model; 5] = [
        Model::Tiny,
        Model::Base,
        Model::Small,
        Model::Medium,
        Model::Large,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Tiny => "tiny",
            Model::Base => "base",
            Model::Small => "small",
            Model::Medium => "medium",
            Model::Large => "large",
        }
    }
}

impl FromStr for Model {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseOptionError {
                field: "model",
                value: value.to_string(),
                expected: "tiny, base, small, medium, large",
            })
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Task {
    /// Transcribe in the spoken language.
    #[default]
    Transcribe,
    /// Translate to English.
    Translate,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl FromStr for Task {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            _ => Err(ParseOptionError {
                field: "task",
                value: value.to_string(),
                expected: "transcribe, translate",
            }),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionOptions {
    pub language: Language,
    pub model: Model,
    pub task: Task,
}

impl SubmissionOptions {
    /// Request fields in wire order. `language` is omitted for auto-detect.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(3);
        if let Some(code) = self.language.code() {
            fields.push(("language", code.to_string()));
        }
        fields.push(("model", self.model.as_str().to_string()));
        fields.push(("task", self.task.as_str().to_string()));
        fields
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum SubmissionSource {
    Upload { filename: String, bytes: Vec<u8> },
    Link { url: String },
}

impl fmt::Debug for SubmissionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionSource::Upload { filename, bytes } => f
                .debug_struct("Upload")
                .field("filename", filename)
                .field("byte_len", &bytes.len())
                .finish(),
            SubmissionSource::Link { url } => f.debug_struct("Link").field("url", url).finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub source: SubmissionSource,
    pub options: SubmissionOptions,
}

impl SubmissionRequest {
    pub fn upload(
        filename: impl Into<String>,
        bytes: Vec<u8>,
        options: SubmissionOptions,
    ) -> Self {
        Self {
            source: SubmissionSource::Upload {
                filename: filename.into(),
                bytes,
            },
            options,
        }
    }

    pub fn link(url: impl Into<String>, options: SubmissionOptions) -> Self {
        Self {
            source: SubmissionSource::Link { url: url.into() },
            options,
        }
    }
}

/// Server-side export formats reachable through the download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    Subtitle,
    WebSubtitle,
}

impl ExportFormat {
    /// Query value and file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Subtitle => "srt",
            ExportFormat::WebSubtitle => "vtt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "srt" | "subtitle" => Ok(ExportFormat::Subtitle),
            "vtt" | "webvtt" => Ok(ExportFormat::WebSubtitle),
            _ => Err(ParseOptionError {
                field: "format",
                value: value.to_string(),
                expected: "txt, srt, vtt",
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
