use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scribe_core::{ExportFormat, Language, Model, SubmissionOptions, Task};

#[derive(Debug, Parser)]
#[command(name = "scribe")]
#[command(about = "Submit audio or video for transcription and follow the job to its transcript")]
pub(crate) struct Cli {
    /// Config file (defaults to ./scribe.ron).
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// API root, e.g. http://localhost:8080/api.
    #[arg(long, global = true)]
    pub(crate) base_url: Option<String>,

    /// Session cookie sent with every request, e.g. "JSESSIONID=...".
    #[arg(long, global = true)]
    pub(crate) session_cookie: Option<String>,

    /// Poll the status endpoint instead of streaming server-sent events.
    #[arg(long, global = true)]
    pub(crate) poll: bool,

    /// Debug logging, also echoed to stderr.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Upload a media file and wait for the transcript.
    Upload {
        file: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Submit a remote media URL and wait for the transcript.
    Link {
        url: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Follow an existing job until it finishes.
    Watch { job_id: String },
    /// List past jobs.
    History,
    /// Print the download URL of an export.
    Url {
        job_id: String,
        #[arg(long, default_value = "txt")]
        format: ExportFormat,
    },
    /// Save an export as {jobId}.{ext}.
    Download {
        job_id: String,
        #[arg(long, default_value = "txt")]
        format: ExportFormat,
        /// Output directory (defaults to the configured one).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub(crate) struct OptionArgs {
    /// Spoken language code, or "auto".
    #[arg(long, default_value = "auto")]
    pub(crate) language: String,

    /// tiny, base, small, medium or large.
    #[arg(long, default_value = "small")]
    pub(crate) model: Model,

    /// transcribe or translate.
    #[arg(long, default_value = "transcribe")]
    pub(crate) task: Task,
}

impl OptionArgs {
    pub(crate) fn to_options(&self) -> SubmissionOptions {
        SubmissionOptions {
            language: Language::parse(&self.language),
            model: self.model,
            task: self.task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_defaults_match_server_defaults() {
        let cli = Cli::parse_from(["scribe", "link", "https://x/video"]);
        let Command::Link { url, options } = cli.command else {
            panic!("expected link command");
        };
        assert_eq!(url, "https://x/video");
        assert_eq!(options.to_options(), SubmissionOptions::default());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from([
            "scribe",
            "download",
            "abc123",
            "--format",
            "srt",
            "--poll",
            "--base-url",
            "http://h/api",
        ]);
        assert!(cli.poll);
        assert_eq!(cli.base_url.as_deref(), Some("http://h/api"));
        let Command::Download { format, out, .. } = cli.command else {
            panic!("expected download command");
        };
        assert_eq!(format, ExportFormat::Subtitle);
        assert_eq!(out, None);
    }

    #[test]
    fn rejects_unknown_model() {
        let result = Cli::try_parse_from(["scribe", "link", "https://x/v", "--model", "huge"]);
        assert!(result.is_err());
    }

    #[test]
    fn upload_options_are_parsed() {
        let cli = Cli::parse_from([
            "scribe", "upload", "talk.mp3", "--language", "si", "--model", "large", "--task",
            "translate",
        ]);
        let Command::Upload { file, options } = cli.command else {
            panic!("expected upload command");
        };
        assert_eq!(file, PathBuf::from("talk.mp3"));
        assert_eq!(
            options.to_options(),
            SubmissionOptions {
                language: Language::Code("si".to_string()),
                model: Model::Large,
                task: Task::Translate,
            }
        );
    }
}
