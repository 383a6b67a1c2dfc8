use neural_owl::harness::{synthetic_series, Harness, HarnessOptions, Scenario};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn harness(plots: bool) -> Harness {
    let data = synthetic_series(600, 3).unwrap();
    Harness::new(
        data,
        HarnessOptions::default().with_epochs(2).with_plots(plots),
    )
}

#[test]
fn test_every_scenario_runs() {
    let harness = harness(false);
    for scenario in Scenario::All.expand() {
        let outcome = harness.run(scenario).unwrap();
        assert_eq!(outcome.scenario, scenario);
        assert!(outcome.figures.is_empty());
    }
}

#[test]
fn test_train_eval_test_reports_both_tables() {
    let outcome = harness(false).run(Scenario::TrainEvalTest).unwrap();
    let labels: Vec<&str> = outcome.metrics.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["train/eval", "test"]);
    assert!(outcome.metrics[0].1.has_validation());
    assert_eq!(outcome.metrics[1].1.len(), 1);
}

#[test]
fn test_trend_forecast_extends_sixty_days() {
    let outcome = harness(false).run(Scenario::Trend).unwrap();
    let forecast = outcome.forecast.unwrap();
    assert_eq!(forecast.len(), 600 + 60);
    assert!(forecast.yhat(1).unwrap().iter().all(|v| v.is_some()));
}

#[test]
fn test_holidays_report_event_coefficients() {
    let outcome = harness(false).run(Scenario::Holidays).unwrap();
    assert!(outcome.notes.iter().any(|n| n.starts_with("playoff:")));
    assert!(outcome.notes.iter().any(|n| n.starts_with("superbowl:")));
    assert_eq!(outcome.forecast.unwrap().len(), 21);
}

#[test]
fn test_figures_serialize() {
    let outcome = harness(true).run(Scenario::Predict).unwrap();
    assert!(!outcome.figures.is_empty());

    let dir = tempdir().unwrap();
    for (i, figure) in outcome.figures.iter().enumerate() {
        figure
            .write_json(dir.path().join(format!("{}.json", i)))
            .unwrap();
    }
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        outcome.figures.len()
    );
}
