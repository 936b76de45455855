mod common;

use std::path::Path;
use std::sync::Arc;

use ec_dashboard::export::{self, ExportFormat};
use ec_dashboard::pipeline::{load_environment_dataset, load_growth_dataset};
use ec_dashboard::summary::{self, column_mean};
use ec_dashboard::{
    load_datasets, CellValue, DashboardConfig, DashboardState, DatasetCache,
    EnvironmentDiscovery, GrowthDiscovery, PipelineError, SchoolConfig, SchoolSelection, Tabular,
};

use common::{scenario_dir, ENV_ROWS, FRESH_WEIGHTS, SCHOOLS};

fn config_for(dir: &Path) -> DashboardConfig {
    DashboardConfig {
        data_dir: dir.to_path_buf(),
        ..DashboardConfig::default()
    }
    .normalized()
    .unwrap()
}

fn school_names() -> Vec<String> {
    SCHOOLS.iter().map(|(name, _)| name.to_string()).collect()
}

#[test]
fn four_school_scenario_loads_both_datasets() {
    let dir = scenario_dir();
    let config = config_for(dir.path());

    let datasets = load_datasets(&config).unwrap();

    let env_keys: Vec<String> = datasets.environment.keys().cloned().collect();
    let growth_keys: Vec<String> = datasets.growth.keys().cloned().collect();
    let mut expected = school_names();
    expected.sort();
    assert_eq!(env_keys, expected);
    assert_eq!(growth_keys, expected);

    for table in datasets.environment.values() {
        assert_eq!(table.len(), ENV_ROWS);
    }

    let haneul = &datasets.growth["하늘고"];
    let literal = FRESH_WEIGHTS[1];
    let expected_mean = literal.iter().sum::<f64>() / literal.len() as f64;
    let mean = column_mean(haneul, "생중량(g)").unwrap().unwrap();
    assert!((mean - expected_mean).abs() < 1e-12, "{mean} vs {expected_mean}");
    assert_eq!(haneul.len(), literal.len());
}

#[test]
fn missing_workbook_fails_the_whole_pipeline() {
    let dir = scenario_dir();
    std::fs::remove_file(common::growth_path(dir.path())).unwrap();
    let config = config_for(dir.path());

    let err = load_datasets(&config).unwrap_err();
    assert!(matches!(err, PipelineError::FileNotFound { .. }), "{err}");

    // Nothing downstream can run without datasets.
    let mut state = DashboardState::new(config);
    assert!(state.summary().is_err());
}

#[test]
fn missing_environment_file_fails_fast() {
    let dir = scenario_dir();
    std::fs::remove_file(dir.path().join("ara_env.csv")).unwrap();
    let config = config_for(dir.path());

    match load_environment_dataset(&config) {
        Err(PipelineError::FileNotFound { what, .. }) => assert!(what.contains("아라고")),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[test]
fn n_sheets_give_n_normalized_keys() {
    let dir = tempfile::tempdir().unwrap();
    let decomposed: String =
        unicode_normalization::UnicodeNormalization::nfd("하늘고").collect();
    common::write_growth_workbook(
        &dir.path().join("DATA.XLSX"),
        &[(decomposed.as_str(), &[1.0]), ("extra", &[2.0, 3.0])],
    );
    let config = config_for(dir.path());

    let growth = load_growth_dataset(&config).unwrap();
    assert_eq!(growth.len(), 2);
    assert!(growth.contains_key("하늘고"));
    assert_eq!(growth["extra"].len(), 2);
}

#[test]
fn keyword_growth_rule_requires_keyword_and_extension() {
    let dir = tempfile::tempdir().unwrap();
    common::write_growth_workbook(&dir.path().join("a_생육결과.xlsx"), &[("송도고", &[1.0])]);
    std::fs::write(dir.path().join("생육결과_notes.txt"), "x").unwrap();
    let mut config = config_for(dir.path());
    config.growth = GrowthDiscovery::Keyword {
        keyword: "생육결과".into(),
        extension: "xlsx".into(),
    };

    let path = ec_dashboard::pipeline::locate_growth_workbook(&config).unwrap();
    assert_eq!(path.file_name().unwrap(), "a_생육결과.xlsx");

    config.growth = GrowthDiscovery::Keyword {
        keyword: "없음".into(),
        extension: "xlsx".into(),
    };
    assert!(matches!(
        load_growth_dataset(&config),
        Err(PipelineError::FileNotFound { .. })
    ));
}

#[test]
fn explicit_growth_path_resolves_relative_and_absolute() {
    let dir = scenario_dir();
    let nested = dir.path().join("results");
    std::fs::create_dir(&nested).unwrap();
    common::write_growth_workbook(&nested.join("final.xlsx"), &[("하늘고", &[7.5, 8.5])]);
    let mut config = config_for(dir.path());

    config.growth = GrowthDiscovery::Path {
        path: "results/final.xlsx".into(),
    };
    let relative = load_growth_dataset(&config).unwrap();
    assert_eq!(relative.keys().collect::<Vec<_>>(), ["하늘고"]);
    assert_eq!(relative["하늘고"].len(), 2);

    config.growth = GrowthDiscovery::Path {
        path: nested.join("final.xlsx"),
    };
    let absolute = load_growth_dataset(&config).unwrap();
    assert_eq!(absolute, relative);
}

#[test]
fn missing_explicit_growth_path_is_file_not_found() {
    let dir = scenario_dir();
    let mut config = config_for(dir.path());
    config.growth = GrowthDiscovery::Path {
        path: "results/none.xlsx".into(),
    };

    match load_datasets(&config) {
        Err(PipelineError::FileNotFound { what, .. }) => assert!(what.contains("none.xlsx")),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[test]
fn extension_rule_keys_files_by_leading_token() {
    let dir = scenario_dir();
    std::fs::write(dir.path().join("unknown_env.csv"), common::env_csv(1.0)).unwrap();
    let mut config = config_for(dir.path());
    config.environment = EnvironmentDiscovery::Extension {
        extension: ".CSV".into(),
        separator: '_',
    };

    let env = load_environment_dataset(&config).unwrap();
    let mut expected = school_names();
    expected.sort();
    assert_eq!(env.keys().cloned().collect::<Vec<_>>(), expected);
}

#[test]
fn extension_rule_rejects_two_files_for_one_school() {
    let dir = scenario_dir();
    std::fs::write(dir.path().join("songdo_backup.csv"), common::env_csv(1.0)).unwrap();
    let mut config = config_for(dir.path());
    config.environment = EnvironmentDiscovery::Extension {
        extension: "csv".into(),
        separator: '_',
    };

    assert!(matches!(
        load_environment_dataset(&config),
        Err(PipelineError::DuplicateSource { .. })
    ));
}

#[test]
fn explicit_environment_file_wins_over_discovery() {
    let dir = scenario_dir();
    std::fs::write(
        dir.path().join("custom.csv"),
        "time,temperature,humidity,ph,ec\n2025-06-01,30,50,7,9.9\n",
    )
    .unwrap();
    let mut config = config_for(dir.path());
    config.schools[3].environment_file = Some("custom.csv".into());

    let env = load_environment_dataset(&config).unwrap();
    let dongsan = &env["동산고"];
    assert_eq!(dongsan.len(), 1);
    assert_eq!(dongsan.records[0].values["ec"], CellValue::Float(9.9));
}

#[test]
fn missing_column_surfaces_only_at_aggregation() {
    let dir = scenario_dir();
    let mut config = config_for(dir.path());
    config.columns.shoot_length = "줄기 길이".into();

    let datasets = load_datasets(&config).expect("load does not check growth columns");
    match summary::summarize(&config, &datasets) {
        Err(PipelineError::MissingColumn { column, .. }) => assert_eq!(column, "줄기 길이"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

#[test]
fn summary_picks_best_school() {
    let dir = scenario_dir();
    let config = config_for(dir.path());
    let datasets = load_datasets(&config).unwrap();

    let summary = summary::summarize(&config, &datasets).unwrap();
    let best = summary.best.as_ref().unwrap();
    assert_eq!(best.school, "하늘고");
    assert_eq!(best.target_ec, 2.0);

    let total: usize = FRESH_WEIGHTS.iter().map(|w| w.len()).sum();
    assert_eq!(summary.overview.total_specimens, total);
    assert_eq!(summary.environment.len(), 4);
    assert_eq!(summary.environment[2].school, "아라고");
    assert_eq!(summary.environment[2].ec, Some(4.0));
    let temp = summary.overview.mean_temperature.unwrap();
    assert!((temp - (20.1 + 19.8 + 19.5) / 3.0).abs() < 1e-9);

    let text = summary.to_string();
    assert!(text.contains("Optimal EC: 2.0 (하늘고"));
}

#[test]
fn summary_requires_a_sheet_per_school() {
    let dir = scenario_dir();
    let mut config = config_for(dir.path());
    config.schools.push(SchoolConfig {
        name: "바다고".into(),
        target_ec: 0.5,
        color: None,
        aliases: vec!["bada".into()],
        environment_file: None,
    });
    std::fs::write(dir.path().join("bada_env.csv"), common::env_csv(0.5)).unwrap();

    let datasets = load_datasets(&config).unwrap();
    assert!(matches!(
        summary::growth_comparison(&config, &datasets),
        Err(PipelineError::MissingSchool { .. })
    ));
}

#[test]
fn cache_reuses_until_directory_changes() {
    let dir = scenario_dir();
    let config = config_for(dir.path());
    let mut cache = DatasetCache::new();

    let first = cache.get_or_load(&config).unwrap();
    let again = cache.get_or_load(&config).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    std::fs::write(dir.path().join("readme.txt"), "notes").unwrap();
    let reloaded = cache.get_or_load(&config).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(*first, *reloaded);
}

#[test]
fn exports_round_trip_through_the_loaders() {
    let dir = scenario_dir();
    let out = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let mut state = DashboardState::new(config.clone());
    let datasets = state.datasets().unwrap();

    state.selection = SchoolSelection::School("하늘고".into());
    let written = state.export_environment(ExportFormat::Csv, out.path()).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].file_name().unwrap(), "하늘고_환경데이터.csv");
    let from_csv =
        ec_dashboard::data::loader::load_environment(&written[0], "하늘고", "time", b',').unwrap();
    assert_eq!(from_csv, datasets.environment["하늘고"]);

    state.selection = SchoolSelection::All;
    let parquet = state
        .export_environment(ExportFormat::Parquet, out.path())
        .unwrap();
    assert_eq!(parquet.len(), 4);
    let reread =
        ec_dashboard::data::loader::load_environment(&parquet[1], "하늘고", "time", b',').unwrap();
    assert_eq!(reread, datasets.environment["하늘고"]);

    let growth_path = out.path().join(export::GROWTH_EXPORT_FILE_NAME);
    state.export_growth(Some(&growth_path)).unwrap();
    let regrown = ec_dashboard::data::loader::load_growth_workbook(&growth_path).unwrap();
    assert_eq!(regrown, datasets.growth);
}
