use scribe_core::{ExportFormat, JobStatus, Language, Model, SubmissionOptions, Task};

#[test]
fn auto_language_is_omitted_from_fields() {
    let options = SubmissionOptions {
        language: Language::parse("auto"),
        model: Model::Medium,
        task: Task::Translate,
    };

    assert_eq!(
        options.form_fields(),
        vec![
            ("model", "medium".to_string()),
            ("task", "translate".to_string()),
        ]
    );
}

#[test]
fn explicit_language_is_sent_first() {
    let options = SubmissionOptions {
        language: Language::parse(" si "),
        ..SubmissionOptions::default()
    };

    assert_eq!(options.form_fields()[0], ("language", "si".to_string()));
    assert_eq!(options.model, Model::Small);
    assert_eq!(options.task, Task::Transcribe);
}

#[test]
fn models_are_ordered_by_tier() {
    assert!(Model::Tiny < Model::Base);
    assert!(Model::Medium < Model::Large);
    assert_eq!("LARGE".parse::<Model>().unwrap(), Model::Large);
    assert!("huge".parse::<Model>().is_err());
}

#[test]
fn status_parsing_is_case_sensitive() {
    assert_eq!("COMPLETED".parse::<JobStatus>().unwrap(), JobStatus::Completed);
    assert!("completed".parse::<JobStatus>().is_err());
    assert!(JobStatus::Failed.is_terminal());
    assert!(!JobStatus::Processing.is_terminal());
}

#[test]
fn export_formats_map_to_query_values() {
    assert_eq!(ExportFormat::Text.as_str(), "txt");
    assert_eq!(ExportFormat::Subtitle.as_str(), "srt");
    assert_eq!(ExportFormat::WebSubtitle.as_str(), "vtt");
    assert_eq!("vtt".parse::<ExportFormat>().unwrap(), ExportFormat::WebSubtitle);
}
