use std::fs;

use crate::utils::Fixture;
use ddf_datapoints::EtlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const ROWS: usize = 150_001;
const YEARS: usize = 750;
const STEM: &str = "ddf--datapoints--big_table--by--ref_area--time";

/// One row per (area, year), shuffled so the writer has to sort
fn big_indicator() -> String {
    let mut lines: Vec<String> = (0..ROWS)
        .map(|i| {
            format!(
                "AREA{:03},Big table,{},{}\n",
                i / YEARS,
                1000 + i % YEARS,
                i % 1000
            )
        })
        .collect();
    lines.shuffle(&mut StdRng::seed_from_u64(42));

    let mut text = String::from("ref_area,indicator,time,obs_value\n");
    text.extend(lines);
    text
}

#[test]
fn test_oversized_output_is_sharded_by_area() {
    let mut fixture = Fixture::new();
    fixture.add_indicator("BIG", &big_indicator());

    let report = fixture.run(fixture.config()).unwrap();
    let partition = &report.processed[0].partition;
    assert_eq!(partition.rows, ROWS);
    assert!(partition.path.is_dir());
    assert!(partition.shards.len() >= 2);
    assert_eq!(partition.shards.len(), ROWS.div_ceil(YEARS));

    for shard in &partition.shards {
        let name = shard.path.file_name().unwrap().to_str().unwrap();
        assert_eq!(
            name,
            format!(
                "ddf--datapoints--big_table--by--ref_area-{}--time.csv",
                shard.value
            )
        );
        let text = fs::read_to_string(&shard.path).unwrap();
        assert!(text
            .lines()
            .skip(1)
            .all(|line| line.starts_with(&format!("{},", shard.value))));
    }
    assert!(!fixture.output_dir().join(format!("{STEM}.csv")).exists());

    // The shards, in name order, reassemble the unsplit table
    let mut joined = String::from("ref_area,time,big_table\n");
    let mut paths: Vec<_> = partition.shards.iter().map(|s| s.path.clone()).collect();
    paths.sort();
    for path in paths {
        let text = fs::read_to_string(path).unwrap();
        joined.extend(text.lines().skip(1).map(|line| format!("{line}\n")));
    }

    let mut unsplit = fixture.config();
    unsplit.split_threshold = 200_000;
    let report = fixture.run(unsplit).unwrap();
    assert!(report.processed[0].partition.shards.is_empty());
    assert!(!fixture.output_dir().join(STEM).exists());
    assert_eq!(fixture.read_output(&format!("{STEM}.csv")), joined);
}

#[test]
fn test_oversized_output_without_split_dimension_fails() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "SMALL",
        "ref_area,indicator,time,obs_value\nUSA,Small,2019,1\nFRA,Small,2019,2\n",
    );

    let mut config = fixture.config();
    config.split_threshold = 1;
    config.split_dimensions = Vec::new();
    let err = fixture.run(config).unwrap_err();
    assert!(matches!(err, EtlError::UnsupportedSplit(_)));
}
