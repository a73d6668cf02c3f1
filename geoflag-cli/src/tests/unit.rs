//! Focused unit tests covering CLI configuration and command behaviour.

use super::helpers::{LogWorkspace, flag_line, read_json};
use super::*;
use crate::logs::LOG_EXTENSION;
use crate::rebatch::{RebatchArgs, RebatchConfig, rebatch};
use crate::stats::{StatsArgs, StatsConfig, collect_stats, config_from_layers_for_test};
use crate::upload::{UploadConfig, upload_with};
use geoflag_data::upload::test_support::RecordingLoader;
use ortho_config::MergeComposer;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn workspace() -> LogWorkspace {
    let workspace = LogWorkspace::new();
    workspace.write_log(
        "1700000000000-3.log",
        &[
            flag_line("F1", "Gaps", "NZL"),
            flag_line("F2", "Gaps", "NZL"),
            "{not json".to_owned(),
            flag_line("F3", "Loops", "AUS"),
        ],
    );
    workspace.write_log(
        "1700000000001-2.log",
        &[flag_line("F4", "Gaps", "AUS"), flag_line("F5", "Gaps", "NZL")],
    );
    workspace.write_log("notes.txt", &["ignored".to_owned()]);
    workspace
}

#[rstest]
fn converting_stats_without_input_errors() {
    let err = StatsConfig::try_from(StatsArgs::default()).expect_err("missing input should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_INPUT);
            assert_eq!(env, ENV_STATS_INPUT);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case(None, Some("out"), ARG_INPUT, ENV_REBATCH_INPUT)]
#[case(Some("logs"), None, ARG_OUTPUT, ENV_REBATCH_OUTPUT)]
fn converting_rebatch_without_required_fields_errors(
    #[case] input: Option<&str>,
    #[case] output: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let args = RebatchArgs {
        input: input.map(Into::into),
        output: output.map(Into::into),
        batch_size: None,
    };
    let err = RebatchConfig::try_from(args).expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn zero_batch_sizes_are_rejected() {
    let args = RebatchArgs {
        input: Some("logs".into()),
        output: Some("out".into()),
        batch_size: Some(0),
    };
    assert!(matches!(
        RebatchConfig::try_from(args),
        Err(CliError::InvalidBatchSize { value: 0 })
    ));
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "input": 42 }));
    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_prefer_environment_over_file() {
    let mut composer = MergeComposer::new();
    composer.push_file(json!({ "input": "from-file" }), None);
    composer.push_environment(json!({ "input": "from-env" }));
    let config = config_from_layers_for_test(composer.layers()).expect("merged config");
    assert_eq!(config.input, "from-env");
}

#[rstest]
fn stats_count_flags_per_category_and_country(workspace: LogWorkspace) {
    let stats = collect_stats(&workspace.logs()).expect("stats");
    assert_eq!(stats.files, 2);
    assert_eq!(stats.flags, 5);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.objects, 5);
    assert_eq!(stats.categories.get("Gaps"), Some(&4));
    assert_eq!(stats.categories.get("Loops"), Some(&1));
    assert_eq!(stats.countries.get("NZL"), Some(&3));
    assert_eq!(stats.countries.get("AUS"), Some(&2));
}

#[rstest]
fn stats_read_a_single_log_file(workspace: LogWorkspace) {
    let path = workspace.logs().join("1700000000001-2.log");
    let stats = collect_stats(&path).expect("stats");
    assert_eq!((stats.files, stats.flags, stats.skipped), (1, 2, 0));
}

#[rstest]
fn stats_report_missing_inputs(workspace: LogWorkspace) {
    let missing = workspace.logs().join("absent");
    match collect_stats(&missing).expect_err("missing input should error") {
        CliError::MissingInput { field, path } => {
            assert_eq!(field, ARG_INPUT);
            assert_eq!(path, missing);
        }
        other => panic!("expected MissingInput, found {other:?}"),
    }
}

#[rstest]
fn stats_command_writes_json(workspace: LogWorkspace) {
    let mut output = Vec::new();
    let command = Command::Stats(StatsArgs {
        input: Some(workspace.logs()),
    });
    run_command(command, &mut output).expect("stats command");
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value["flags"], 5);
    assert_eq!(value["categories"]["Gaps"], 4);
}

#[rstest]
fn rebatch_writes_one_series_per_category(workspace: LogWorkspace) {
    let config = RebatchConfig {
        input: workspace.logs(),
        output: workspace.output(),
        batch_size: Some(2),
    };
    let summary = rebatch(&config).expect("rebatch");
    assert_eq!(summary.flags, 5);
    assert_eq!(summary.batches_written, 3);
    assert_eq!(summary.categories, vec!["Gaps".to_owned(), "Loops".to_owned()]);

    let files = workspace.output_files("geojson");
    assert_eq!(files.len(), 3);
    let mut sizes: Vec<(String, usize)> = files
        .iter()
        .map(|path| {
            let category = path
                .file_name()
                .and_then(|name| name.split('-').next())
                .expect("category prefix")
                .to_owned();
            let features = read_json(path)["features"].as_array().map_or(0, Vec::len);
            (category, features)
        })
        .collect();
    sizes.sort();
    assert_eq!(
        sizes,
        vec![
            ("Gaps".to_owned(), 2),
            ("Gaps".to_owned(), 2),
            ("Loops".to_owned(), 1),
        ]
    );
    assert!(workspace.output_files(LOG_EXTENSION).is_empty());
}

#[rstest]
fn uploads_group_flags_by_category_and_country(workspace: LogWorkspace) {
    let loader = RecordingLoader::default();
    let config = UploadConfig {
        input: workspace.logs(),
        base_url: "http://unused.example".to_owned(),
        api_key: None,
        project: None,
    };
    let summary = upload_with(&config, &loader).expect("upload");
    assert_eq!(summary.uploaded, 5);
    assert_eq!(summary.failed, 0);

    let mut batches: Vec<(String, String, usize)> = loader
        .uploads()
        .into_iter()
        .map(|(project, challenge, ids)| (project, challenge, ids.len()))
        .collect();
    batches.sort();
    assert_eq!(
        batches,
        vec![
            ("AUS".to_owned(), "Gaps".to_owned(), 1),
            ("AUS".to_owned(), "Loops".to_owned(), 1),
            ("NZL".to_owned(), "Gaps".to_owned(), 3),
        ]
    );
}

#[rstest]
fn uploads_report_rejected_batches(workspace: LogWorkspace) {
    let loader = RecordingLoader::failing();
    let config = UploadConfig {
        input: workspace.logs(),
        base_url: "http://unused.example".to_owned(),
        api_key: None,
        project: Some("Checks".to_owned()),
    };
    let summary = upload_with(&config, &loader).expect("upload runs");
    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.failed, 2);
}
