use std::collections::HashSet;

use crate::utils::{Fixture, SOURCES, data_rows, snapshot};
use ddf_datapoints::{EtlError, LocalMetadata, Pipeline};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EMP_FILE: &str = "ddf--datapoints--employment_by_x--by--ref_area--sex--time.csv";

/// A labelled indicator becomes a slugged measure with normalized keys
#[test]
fn test_scenario_row_normalized() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,sex,time,obs_value,source\nUSA,Employment by X,SEX_M,2019,12.3456,BA:1\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(
        fixture.read_output(EMP_FILE),
        "ref_area,sex,time,employment_by_x\nusa,sex_m,2019,12.346\n"
    );
    assert!(fixture.output_dir().join("etl-report.json").is_file());
}

#[test]
fn test_pipeline_rejects_invalid_config() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.split_threshold = 0;
    let metadata = LocalMetadata::new(fixture.metadata_dir());
    assert!(matches!(
        Pipeline::new(config, Box::new(metadata)),
        Err(EtlError::Config(_))
    ));

    let metadata = LocalMetadata::new(fixture.metadata_dir());
    let pipeline = Pipeline::new(fixture.config(), Box::new(metadata)).unwrap();
    assert_eq!(pipeline.config().output_dir, fixture.output_dir());
    assert_eq!(pipeline.config().threads(), 2);
}

/// The row from the better source survives, per area
#[test]
fn test_source_priority_wins() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,sex,time,obs_value,source\n\
         USA,Employment by X,SEX_M,2019,1,BA:2\n\
         USA,Employment by X,SEX_M,2019,2,BA:1\n\
         FRA,Employment by X,SEX_M,2019,3,BA:2\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.processed[0].dedup.removed_by_source, 1);
    assert_eq!(
        fixture.read_output(EMP_FILE),
        "ref_area,sex,time,employment_by_x\nfra,sex_m,2019,3\nusa,sex_m,2019,2\n"
    );
}

#[test]
fn test_missing_classification_and_measure_dropped() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_ECO",
        "ref_area,indicator,classif1,time,obs_value\n\
         USA,Emp eco,ECO_AGR,2019,5\n\
         USA,Emp eco,,2019,6\n\
         USA,Emp eco,ECO_IND,2019,\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    let dedup = &report.processed[0].dedup;
    assert_eq!(dedup.dropped_missing_classification.get("classif1"), Some(&1));
    assert_eq!(dedup.dropped_missing_measure, 1);
    assert_eq!(
        fixture.read_output("ddf--datapoints--emp_eco--by--ref_area--classif1--time.csv"),
        "ref_area,classif1,time,emp_eco\nusa,eco_agr,2019,5\n"
    );
}

/// NaN is a missing value, not an empty measure cell
#[test]
fn test_nan_measure_dropped() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\n\
         USA,Employment by X,2019,NaN\n\
         FRA,Employment by X,2019,1\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    assert!(report.skipped.is_empty());
    assert_eq!(report.processed[0].dedup.dropped_missing_measure, 1);
    assert_eq!(
        fixture.read_output("ddf--datapoints--employment_by_x--by--ref_area--time.csv"),
        "ref_area,time,employment_by_x\nfra,2019,1\n"
    );
}

#[test]
fn test_missing_source_file_is_skipped() {
    let mut fixture = Fixture::new();
    fixture.catalog_entry("GONE", "A");
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\nUSA,Employment by X,2019,1\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.selected, 2);
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "GONE");
    assert_eq!(report.skipped[0].kind, "source_missing");
}

#[test]
fn test_other_frequencies_not_selected() {
    let mut fixture = Fixture::new();
    fixture.catalog_entry("EMP_M", "M");
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\nUSA,Employment by X,2019,1\n",
    );

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.selected, 1);
    assert!(report.skipped.is_empty());
}

#[test]
fn test_unexpected_column_aborts_strict_run() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\nUSA,Employment by X,2019,1\n",
    );
    fixture.add_indicator(
        "ODD",
        "ref_area,indicator,time,obs_value,surprise\nUSA,Odd,2019,1,x\n",
    );

    let err = fixture.run(fixture.config()).unwrap_err();
    assert!(matches!(err, EtlError::SchemaViolation { .. }));
    assert!(!fixture
        .output_dir()
        .join("ddf--datapoints--employment_by_x--by--ref_area--time.csv")
        .exists());
}

/// A corrupt raw file skips its indicator without aborting the strict survey
#[test]
fn test_unreadable_source_skipped_in_strict_run() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\nUSA,Employment by X,2019,1\n",
    );
    fixture.catalog_entry("BROKEN", "A");
    std::fs::write(fixture.source_dir().join("BROKEN.csv.gz"), "not gzip at all").unwrap();

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "BROKEN");
    assert!(["io", "arrow"].contains(&report.skipped[0].kind.as_str()));
}

#[test]
fn test_unexpected_column_skipped_when_lenient() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EMP_X",
        "ref_area,indicator,time,obs_value\nUSA,Employment by X,2019,1\n",
    );
    fixture.add_indicator(
        "ODD",
        "ref_area,indicator,time,obs_value,surprise\nUSA,Odd,2019,1,x\n",
    );

    let mut config = fixture.config();
    config.strict_schema = false;
    let report = fixture.run(config).unwrap();
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped[0].id, "ODD");
    assert_eq!(report.skipped[0].kind, "schema_violation");
}

#[test]
fn test_missing_measure_column_skipped() {
    let mut fixture = Fixture::new();
    fixture.add_indicator("NO_VALUE", "ref_area,indicator,time\nUSA,No value,2019\n");

    let report = fixture.run(fixture.config()).unwrap();
    assert_eq!(report.skipped[0].kind, "missing_required_column");
    assert!(report.skipped[0].reason.contains("obs_value"));
}

fn random_indicator(seed: u64, rows: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let areas = ["USA", "FRA", "DEU", "NOR"];
    let sexes = ["SEX_M", "SEX_F", "SEX_T"];
    let mut text = String::from("ref_area,indicator,sex,time,obs_value,source,note_source\n");
    for _ in 0..rows {
        let area = areas[rng.random_range(0..areas.len())];
        let sex = sexes[rng.random_range(0..sexes.len())];
        let year = rng.random_range(1995..2005);
        let value = if rng.random_bool(0.1) {
            String::new()
        } else {
            format!("{:.4}", rng.random_range(0.0..1000.0))
        };
        let source = if rng.random_bool(0.1) {
            ""
        } else {
            SOURCES[rng.random_range(0..SOURCES.len())]
        };
        let note = if rng.random_bool(0.5) { "R1" } else { "R2" };
        text.push_str(&format!(
            "{area},Employment by X,{sex},{year},{value},{source},{note}\n"
        ));
    }
    text
}

/// Outputs have unique, sorted keys and no empty measures
#[test]
fn test_output_keys_unique_and_sorted() {
    let mut fixture = Fixture::new();
    fixture.add_indicator("EMP_X", &random_indicator(7, 2_000));

    let report = fixture.run(fixture.config()).unwrap();
    assert!(report.processed[0].dedup.duplicate_rows > 0);

    let rows = data_rows(&fixture.read_output(EMP_FILE));
    assert!(!rows.is_empty());
    let keys: Vec<(String, String, i32)> = rows
        .iter()
        .map(|r| (r[0].clone(), r[1].clone(), r[2].parse().unwrap()))
        .collect();

    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(unique.len(), keys.len());
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    assert!(rows.iter().all(|r| r.len() == 4 && !r[3].is_empty()));
}

/// Two runs over the same input leave byte-identical outputs
#[test]
fn test_rerun_is_byte_identical() {
    let mut fixture = Fixture::new();
    fixture.add_indicator("EMP_X", &random_indicator(11, 500));
    fixture.add_indicator(
        "EMP_ECO",
        "ref_area,indicator,classif1,time,obs_value\nUSA,Emp eco,ECO_AGR,2019,5\n",
    );

    fixture.run(fixture.config()).unwrap();
    let first = snapshot(&fixture.output_dir());
    fixture.run(fixture.config()).unwrap();
    let second = snapshot(&fixture.output_dir());

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}
