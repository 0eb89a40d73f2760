use crate::utils::Fixture;
use ddf_datapoints::DerivedRatio;

const HEADER: &str = "ref_area,indicator,sex,classif1,time,obs_value\n";

fn with_default_ratio(fixture: &Fixture) -> ddf_datapoints::EtlConfig {
    let mut config = fixture.config();
    config.derived = vec![DerivedRatio::default()];
    config
}

#[test]
fn test_ratio_written_for_every_sex() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EES_TEES_SEX_ECO_NB",
        &format!(
            "{HEADER}\
             USA,EES_TEES_SEX_ECO_NB,SEX_M,ECO_SECTOR_NAG,2020,50\n\
             USA,EES_TEES_SEX_ECO_NB,SEX_M,ECO_SECTOR_AGR,2020,7\n\
             USA,EES_TEES_SEX_ECO_NB,SEX_T,ECO_SECTOR_NAG,2020,1\n\
             FRA,EES_TEES_SEX_ECO_NB,SEX_M,ECO_SECTOR_NAG,2020,10\n"
        ),
    );
    fixture.add_indicator(
        "EMP_TEMP_SEX_ECO_NB",
        &format!(
            "{HEADER}\
             USA,EMP_TEMP_SEX_ECO_NB,SEX_M,ECO_SECTOR_NAG,2020,100\n\
             USA,EMP_TEMP_SEX_ECO_NB,SEX_T,ECO_SECTOR_NAG,2020,3\n\
             DEU,EMP_TEMP_SEX_ECO_NB,SEX_M,ECO_SECTOR_NAG,2020,40\n"
        ),
    );

    let report = fixture.run(with_default_ratio(&fixture)).unwrap();
    assert_eq!(report.processed.len(), 2);
    assert!(report.derived_failures.is_empty());
    assert_eq!(report.derived.len(), 3);

    assert_eq!(
        fixture.read_output("ddf--datapoints--ees_mnag_noc_rt--by--ref_area--time.csv"),
        "ref_area,time,ees_mnag_noc_rt\nusa,2020,50\n"
    );
    assert_eq!(
        fixture.read_output("ddf--datapoints--ees_tnag_noc_rt--by--ref_area--time.csv"),
        "ref_area,time,ees_tnag_noc_rt\nusa,2020,33.333\n"
    );
    assert_eq!(
        fixture.read_output("ddf--datapoints--ees_fnag_noc_rt--by--ref_area--time.csv"),
        "ref_area,time,ees_fnag_noc_rt\n"
    );
}

#[test]
fn test_missing_input_reported_not_fatal() {
    let mut fixture = Fixture::new();
    fixture.add_indicator(
        "EES_TEES_SEX_ECO_NB",
        &format!("{HEADER}USA,EES_TEES_SEX_ECO_NB,SEX_M,ECO_SECTOR_NAG,2020,50\n"),
    );

    let report = fixture.run(with_default_ratio(&fixture)).unwrap();
    assert_eq!(report.processed.len(), 1);
    assert!(report.derived.is_empty());
    assert_eq!(report.derived_failures.len(), 1);
    assert_eq!(report.derived_failures[0].kind, "missing_dependency");
    assert!(
        report.derived_failures[0]
            .reason
            .contains("emp_temp_sex_eco_nb")
    );
}
