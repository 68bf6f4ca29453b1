use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use takeout_game::{
    ConditionBoard, CustomerInformation, GameEngine, MemoryPlayerStore, MenuSection, NameCheck,
    Order, RecordingAnnouncer, ScoringConfig, ScoringEngine, SubmissionOutcome,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 18, 0, 0).unwrap()
}

fn pizzaria_ground_truth() -> Order {
    let mut order = Order::for_restaurant("Pizzaria", t0())
        .with_customer_information(
            CustomerInformation::new("Test123", "Customer Name", "Customer Address")
                .with_delivery_time("9 o'clock.")
                .with_extra_wish("Dont ring the bell."),
        )
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::MainCourses, "Veggie Pizza")
        .with_penalty_seconds(300);
    order.fill_sections();
    order
}

fn player_submission() -> Order {
    Order::for_restaurant("Pizzaria", t0())
        .with_customer_information(
            CustomerInformation::new("Test123", "Customer Name", "Customer Address")
                .with_delivery_time("9 o'clock.")
                .with_extra_wish("Dont ring the bell."),
        )
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::MainCourses, "Veggie Pizza")
}

#[test]
fn identical_pizzaria_submission_scores_full_marks() {
    let truth = pizzaria_ground_truth();
    let expected = ConditionBoard::new().adjust(&truth);
    let engine = ScoringEngine::default();

    let score = engine.score(&player_submission(), &expected);
    assert!((score - 1.0).abs() < f64::EPSILON, "score {score}");

    let slow = engine.reward(score, &expected, t0() + TimeDelta::seconds(120));
    assert_eq!(slow, 10);
    let fast = engine.reward(score, &expected, t0() + TimeDelta::seconds(30));
    assert_eq!(fast, 15);
    let late = engine.reward(score, &expected, t0() + TimeDelta::seconds(301));
    assert_eq!(late, 5);
}

#[test]
fn missing_an_item_costs_one_unit() {
    let truth = pizzaria_ground_truth();
    let engine = ScoringEngine::default();
    let mut submitted = player_submission();
    assert!(submitted.remove_item(MenuSection::Starters, "Garlic Knots"));

    let breakdown = engine.score_breakdown(&submitted, &truth);
    assert_eq!(breakdown.item_differences, 1);
    assert!((breakdown.score - (1.0 - breakdown.unit)).abs() < 1e-12);
}

#[test]
fn name_check_mode_decides_whether_names_count() {
    let truth = pizzaria_ground_truth();
    let mut submitted = player_submission();
    if let Some(info) = submitted.customer_information.as_mut() {
        info.name = "Someone Else Entirely".into();
    }

    let by_name = ScoringEngine::default().score(&submitted, &truth);
    assert!(by_name < 1.0);

    let quirk = ScoringEngine::new(ScoringConfig {
        name_check: NameCheck::AddressQuirk,
        ..ScoringConfig::default()
    })
    .score(&submitted, &truth);
    assert!((quirk - 1.0).abs() < f64::EPSILON);
}

#[test]
fn session_pays_out_for_a_perfect_submission() {
    let engine = GameEngine::embedded(MemoryPlayerStore::new()).unwrap();
    let mut session = engine.create_session("chef", RecordingAnnouncer::new(), 2024);
    session.start(t0()).unwrap();

    let order_id = session
        .active_orders()
        .next()
        .unwrap()
        .order_id()
        .to_string();
    let expected = session.expected_order(&order_id).unwrap();
    let outcome = session
        .submit(&order_id, &expected, t0() + TimeDelta::seconds(20))
        .unwrap();

    let SubmissionOutcome::Scored(report) = outcome else {
        panic!("expected a scored submission, got {outcome:?}");
    };
    assert!((report.score - 1.0).abs() < f64::EPSILON);
    assert_eq!(report.reward, 15);
    assert_eq!(report.coins, 15);
    assert_eq!(report.restaurant, "Pizzaria");
    assert!((report.elapsed_seconds - 20.0).abs() < 1e-9);

    assert!(session.get_order_by_id(&order_id).is_none());
    let state = engine.player_state("chef").unwrap();
    assert_eq!(state.coins, 15);
    assert_eq!(state.completed_for("Pizzaria"), 1);
}

#[test]
fn submitting_the_same_order_twice_is_rejected() {
    let engine = GameEngine::embedded(MemoryPlayerStore::new()).unwrap();
    let mut session = engine.create_session("chef", RecordingAnnouncer::new(), 5);
    session.start(t0()).unwrap();
    let order_id = session
        .active_orders()
        .next()
        .unwrap()
        .order_id()
        .to_string();
    let expected = session.expected_order(&order_id).unwrap();

    let first = session.submit(&order_id, &expected, t0()).unwrap();
    assert!(matches!(first, SubmissionOutcome::Scored(_)));
    let second = session.submit(&order_id, &expected, t0()).unwrap();
    assert!(matches!(second, SubmissionOutcome::Rejected { .. }));
    assert_eq!(engine.player_state("chef").unwrap().coins, 15);
}
