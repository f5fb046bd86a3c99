use std::path::PathBuf;

use outbreak_engine::case_definition::{Classification, Tier};
use outbreak_engine::lab::RepeatOrders;
use outbreak_engine::prelude::*;

fn scenario_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/lepto_rivergate")
}

fn rate(assignment: &InfectionAssignment, population: &PopulationSnapshot, village: &str) -> f64 {
    assignment.attack_rates(population)[&VillageId::from(village)].rate()
}

#[test]
fn epicenter_carries_the_outbreak() {
    let (config, seed_data) = load_scenario(&scenario_dir()).unwrap();
    let (mut v1, mut v2, mut v3) = (0.0, 0.0, 0.0);
    for seed in 0..5 {
        let outbreak = Outbreak::generate(&seed_data, &config, seed).unwrap();
        let population = &outbreak.population;
        let assignment = &outbreak.assignment;
        assert_eq!(assignment.len(), 34);
        assert_eq!(rate(assignment, population, "V4"), 0.0);
        v1 += rate(assignment, population, "V1");
        v2 += rate(assignment, population, "V2");
        v3 += rate(assignment, population, "V3");
    }
    assert!(v1 >= v2, "V1 {v1} < V2 {v2}");
    assert!(v1 >= v3, "V1 {v1} < V3 {v3}");
}

#[test]
fn line_list_keeps_the_clinical_invariants() {
    let session = OutbreakSession::from_scenario_dir(&scenario_dir(), 2024).unwrap();
    let line_list = session.line_list();
    assert_eq!(line_list.len(), 1460);
    let infected = line_list
        .rows()
        .iter()
        .filter(|row| row.truth.true_infection)
        .count();
    assert_eq!(infected, 34);
    for row in line_list.rows() {
        if !row.truth.symptomatic {
            assert!(!row.symptoms.any_present(), "{}", row.person_id);
        }
        if row.is_severe() {
            assert!(row.truth.symptomatic && row.truth.true_infection);
        }
        if row.truth.symptomatic {
            assert!(row.truth.true_infection);
        }
    }
}

#[test]
fn mat_finds_a_severe_case_at_its_configured_sensitivity() {
    let (mut config, seed_data) = load_scenario(&scenario_dir()).unwrap();
    config.lab.repeat_orders = RepeatOrders::Redraw;
    let mut session = OutbreakSession::new(&seed_data, config, 7).unwrap();
    let index_case = PersonId::from("P0001");
    assert!(session.outbreak().state_of(&index_case).is_severe());

    let orders = 2000;
    let positives = (0..orders)
        .filter(|_| {
            session
                .order_test(&index_case, "MAT", 10)
                .unwrap()
                .is_positive()
        })
        .count();
    #[allow(clippy::cast_precision_loss)]
    let positive_rate = positives as f64 / f64::from(orders);
    assert!(positive_rate >= 0.85, "MAT positive rate {positive_rate}");
    assert_eq!(session.lab_history(&index_case).len(), 2000);
}

#[test]
fn a_positive_mat_confirms_the_index_case() {
    let mut session = OutbreakSession::from_scenario_dir(&scenario_dir(), 7).unwrap();
    let index_case = PersonId::from("P0001");
    let definition = session.default_case_definition().unwrap();

    let before = session.classify(&definition).get(&index_case).unwrap();
    assert!(before.meets(Tier::Suspected));

    // Each day since onset is a separate order, so keep ordering until one comes back positive.
    let positive = (8..40).any(|day| {
        session
            .order_test(&index_case, "LEPTO_MAT", day)
            .unwrap()
            .is_positive()
    });
    assert!(positive);
    let after = session.classify(&definition).get(&index_case).unwrap();
    assert_eq!(after, Classification::Confirmed);

    let summary = session.case_finding(&definition, Tier::Confirmed);
    assert!(summary.true_positives >= 1);
    assert_eq!(summary.false_positives, 0);
}

#[test]
fn a_positive_rule_out_test_excludes() {
    let mut session = OutbreakSession::from_scenario_dir(&scenario_dir(), 7).unwrap();
    let definition = session.default_case_definition().unwrap();
    let people: Vec<PersonId> = session
        .outbreak()
        .population
        .individuals()
        .iter()
        .map(|individual| individual.id.clone())
        .collect();
    let excluded = people.into_iter().find(|person| {
        session
            .order_test(person, "MALARIA_RDT", 1)
            .unwrap()
            .is_positive()
    });
    let excluded = excluded.unwrap();
    let classifications = session.classify(&definition);
    let row = session.line_list().get(&excluded).cloned().unwrap();
    let expected = if definition.in_scope(&row) {
        Classification::Excluded
    } else {
        Classification::NotACase
    };
    assert_eq!(classifications.get(&excluded), Some(expected));
}
