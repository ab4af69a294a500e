use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use scribe_core::{
    ExportFormat, JobId, ObservationError, SessionView, SubmissionOptions, SubmissionRequest,
};
use scribe_engine::{save_export, ObservationHandle, SubscriptionManager, Transport};
use scribe_logging::{scribe_info, scribe_warn};

use crate::config::AppConfig;

pub(crate) async fn require_user(transport: &dyn Transport) -> Result<()> {
    match transport
        .current_user()
        .await
        .context("could not reach the transcription server")?
    {
        Some(user) => {
            scribe_info!("Authenticated as {}", user.username);
            Ok(())
        }
        None => bail!("not signed in: pass a valid --session-cookie or set session_cookie in the config"),
    }
}

pub(crate) async fn upload(
    manager: &mut SubscriptionManager,
    file: &Path,
    options: SubmissionOptions,
) -> Result<ExitCode> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file", file.display()))?;
    submit(manager, SubmissionRequest::upload(filename, bytes, options)).await
}

pub(crate) async fn link(
    manager: &mut SubscriptionManager,
    url: &str,
    options: SubmissionOptions,
) -> Result<ExitCode> {
    submit(manager, SubmissionRequest::link(url, options)).await
}

async fn submit(manager: &mut SubscriptionManager, request: SubmissionRequest) -> Result<ExitCode> {
    let handle = manager
        .submit(request)
        .ok_or_else(|| anyhow!("another submission is already in flight"))?;
    follow(manager, handle).await
}

pub(crate) async fn watch(manager: &mut SubscriptionManager, job_id: &str) -> Result<ExitCode> {
    let handle = manager
        .observe(JobId::new(job_id), None)
        .ok_or_else(|| anyhow!("could not start observing job {job_id}"))?;
    follow(manager, handle).await
}

/// Prints progress until the session settles. Ctrl-C cancels the observation.
async fn follow(manager: &mut SubscriptionManager, handle: ObservationHandle) -> Result<ExitCode> {
    let mut progress = Progress::default();
    progress.report(&manager.view());

    while !manager.view().is_settled() {
        tokio::select! {
            update = manager.next_update() => {
                if let Some(view) = update {
                    progress.report(&view);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                scribe_warn!("Interrupted; abandoning observation {}", handle.id());
                manager.cancel(&handle);
            }
        }
    }

    finish(&manager.view())
}

fn finish(view: &SessionView) -> Result<ExitCode> {
    match &view.error {
        Some(ObservationError::JobFailed(reason)) => {
            eprintln!("Transcription failed: {reason}");
            Ok(ExitCode::FAILURE)
        }
        Some(err) => {
            if let Some(job) = &view.job {
                eprintln!("Job {} can be watched again with `scribe watch {}`", job.id, job.id);
            }
            Err(anyhow!(err.clone()))
        }
        None => match view.transcript() {
            Some(transcript) => {
                println!("{transcript}");
                Ok(ExitCode::SUCCESS)
            }
            // Cancelled before an outcome.
            None => Ok(ExitCode::from(130)),
        },
    }
}

/// Deduplicates progress lines across updates that only touched internals.
#[derive(Default)]
struct Progress {
    announced_job: Option<JobId>,
    last_line: Option<String>,
}

impl Progress {
    fn report(&mut self, view: &SessionView) {
        if let Some(job) = &view.job {
            if self.announced_job.as_ref() != Some(&job.id) {
                eprintln!("Job {}", job.id);
                self.announced_job = Some(job.id.clone());
            }
        }

        let Some(status) = view.status() else {
            return;
        };
        let message = view
            .job
            .as_ref()
            .and_then(|job| job.status_message.as_deref());
        let line = match message {
            Some(message) => format!("{status}: {message}"),
            None => status.to_string(),
        };
        if self.last_line.as_deref() != Some(line.as_str()) {
            eprintln!("{line}");
            self.last_line = Some(line);
        }
    }
}

pub(crate) async fn history(transport: &dyn Transport) -> Result<ExitCode> {
    let entries = transport
        .fetch_history()
        .await
        .context("fetching history")?;
    if entries.is_empty() {
        eprintln!("No past jobs.");
    }
    for entry in entries {
        println!("{}\t{}\t{}", entry.id, entry.status, entry.created_at);
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn url(transport: &dyn Transport, job_id: &str, format: ExportFormat) -> ExitCode {
    println!("{}", transport.download_url(&JobId::new(job_id), format));
    ExitCode::SUCCESS
}

pub(crate) async fn download(
    transport: &dyn Transport,
    config: &AppConfig,
    job_id: &str,
    format: ExportFormat,
    out: Option<&Path>,
) -> Result<ExitCode> {
    let job_id = JobId::new(job_id);
    let bytes = transport
        .download_export(&job_id, format)
        .await
        .with_context(|| format!("downloading {} export of job {job_id}", format.as_str()))?;
    let dir = out.unwrap_or(&config.output_dir);
    let saved = save_export(dir, &job_id, format, &bytes)?;
    scribe_info!("Saved {} bytes to {:?}", bytes.len(), saved);
    println!("{}", saved.display());
    Ok(ExitCode::SUCCESS)
}
