use chrono::{TimeZone, Utc};
use takeout_game::constants::NO_DELIVERY_ADDRESS;
use takeout_game::{
    Condition, ConditionBoard, ConditionKind, CustomerInformation, GameError, MenuSection, Order,
    ScoringEngine,
};

fn ground_truth() -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    let mut order = Order::for_restaurant("Pizzaria", ts)
        .with_customer_information(
            CustomerInformation::new("ab12", "Ada Lovelace", "12 Elm Street")
                .with_delivery_time("19:30")
                .with_extra_wish("Knock loudly."),
        )
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::Starters, "Garlic Knots")
        .with_item(MenuSection::Starters, "Bruschetta")
        .with_item(MenuSection::Drinks, "Cola");
    order.fill_sections();
    order
}

fn address(order: &Order) -> &str {
    order
        .customer_information
        .as_ref()
        .map_or("", |info| info.address.as_str())
}

#[test]
fn no_delivery_rewrites_address_until_it_expires() {
    let mut board = ConditionBoard::new();
    let truth = ground_truth();
    let condition = Condition::NoDelivery {
        restaurant: "Pizzaria".into(),
    };

    let message = board.apply(&condition);
    assert!(message.contains("doesn't do delivery anymore"));
    let adjusted = board.adjust(&truth);
    assert_eq!(address(&adjusted), NO_DELIVERY_ADDRESS);
    assert_eq!(address(&truth), "12 Elm Street", "ground truth is untouched");

    assert!(board.expire(&condition));
    assert_eq!(address(&board.adjust(&truth)), "12 Elm Street");
    assert!(board.is_clear());
}

#[test]
fn information_conditions_blank_their_fields() {
    let mut board = ConditionBoard::new();
    for kind in [
        ConditionKind::NoFirstname,
        ConditionKind::NoDeliveryTime,
        ConditionKind::NoExtraWish,
    ] {
        board.apply_parts(kind, "Pizzaria", None, None).unwrap();
    }
    let adjusted = board.adjust(&ground_truth());
    let info = adjusted.customer_information.unwrap();
    assert_eq!(info.name, "Lovelace");
    assert_eq!(info.delivery_time, "");
    assert_eq!(info.extra_wish, "");
    assert_eq!(info.address, "12 Elm Street");
}

#[test]
fn out_of_stock_item_removes_a_single_instance() {
    let mut board = ConditionBoard::new();
    board
        .apply_parts(
            ConditionKind::OutOfStockItem,
            "Pizzaria",
            Some(MenuSection::Starters),
            Some("Garlic Knots"),
        )
        .unwrap();
    let adjusted = board.adjust(&ground_truth());
    assert_eq!(
        adjusted.items(MenuSection::Starters),
        ["Garlic Knots".to_string(), "Bruschetta".to_string()]
    );
    assert_eq!(board.adjust(&ground_truth()), adjusted, "adjust is idempotent");
}

#[test]
fn out_of_stock_section_changes_the_score_unit() {
    let mut board = ConditionBoard::new();
    board
        .apply_parts(
            ConditionKind::OutOfStockSection,
            "Pizzaria",
            Some(MenuSection::Drinks),
            None,
        )
        .unwrap();
    let adjusted = board.adjust(&ground_truth());
    assert!(!adjusted.foods.contains_key(&MenuSection::Drinks));

    let breakdown = ScoringEngine::default().score_breakdown(&adjusted, &adjusted);
    assert!((breakdown.unit - 1.0 / 8.0).abs() < 1e-12);
    assert!((breakdown.score - 1.0).abs() < f64::EPSILON);

    let raw = ScoringEngine::default().score(&ground_truth(), &adjusted);
    assert!(raw < 1.0, "keeping the dropped drink costs points");
}

#[test]
fn stock_conditions_require_their_parameters() {
    let mut board = ConditionBoard::new();
    let err = board
        .apply_parts(ConditionKind::OutOfStockItem, "Pizzaria", Some(MenuSection::Starters), None)
        .unwrap_err();
    assert!(matches!(err, GameError::MissingParameter { .. }));
    assert!(board.is_clear());
}

#[test]
fn conditions_for_other_restaurants_do_not_apply() {
    let mut board = ConditionBoard::new();
    board.apply(&Condition::NoDelivery {
        restaurant: "Burger Barn".into(),
    });
    assert_eq!(board.adjust(&ground_truth()), ground_truth());
}
