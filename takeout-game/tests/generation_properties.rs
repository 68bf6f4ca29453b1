use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use takeout_game::generator::item_list;
use takeout_game::{
    Difficulty, GameContent, GenerationConfig, MenuSection, OrderGenerator, OrderRequest,
};
use twox_hash::XxHash64;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 18, 0, 0).unwrap()
}

fn generator() -> OrderGenerator {
    let content = Arc::new(GameContent::embedded().unwrap());
    OrderGenerator::new(content, GenerationConfig::default())
}

fn digest(generator: &OrderGenerator, seed: u64, count: usize) -> u64 {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let request = OrderRequest::new("Golden Dragon", Difficulty::Medium, now());
    let orders: Vec<_> = (0..count)
        .map(|_| generator.generate(&request, &mut rng).unwrap())
        .collect();
    XxHash64::oneshot(0, &serde_json::to_vec(&orders).unwrap())
}

#[test]
fn hard_orders_almost_always_have_starters_and_always_mains() {
    let generator = generator();
    let mut rng = ChaCha20Rng::seed_from_u64(0xC0FFEE);
    let request = OrderRequest::new("Pizzaria", Difficulty::Hard, now());
    let trials = 1000;
    let mut with_starters = 0;
    let mut with_mains = 0;
    for _ in 0..trials {
        let order = generator.generate(&request, &mut rng).unwrap().order;
        if !order.items(MenuSection::Starters).is_empty() {
            with_starters += 1;
        }
        if !order.items(MenuSection::MainCourses).is_empty() {
            with_mains += 1;
        }
    }
    assert!(with_starters * 100 >= trials * 99, "{with_starters}/{trials}");
    assert_eq!(with_mains, trials);
}

#[test]
fn easy_orders_skip_sections_sometimes() {
    let generator = generator();
    let mut rng = ChaCha20Rng::seed_from_u64(17);
    let request = OrderRequest::new("Pizzaria", Difficulty::Easy, now());
    let without_drinks = (0..500)
        .filter(|_| {
            generator
                .generate(&request, &mut rng)
                .unwrap()
                .order
                .items(MenuSection::Drinks)
                .is_empty()
        })
        .count();
    // Drinks are included with probability 0.4 on EASY.
    assert!((200..=400).contains(&without_drinks), "{without_drinks}");
}

#[test]
fn descriptions_mention_the_id_and_every_item() {
    let generator = generator();
    let mut rng = ChaCha20Rng::seed_from_u64(99);
    for difficulty in Difficulty::ALL {
        let request = OrderRequest::new("Sakura Sushi", difficulty, now());
        for _ in 0..40 {
            let generated = generator.generate(&request, &mut rng).unwrap();
            let order = &generated.order;
            let info = order.customer_information.as_ref().unwrap();
            let text = &generated.description;
            assert!(text.contains(&format!("`{}`", info.order_id)));
            assert!(text.contains(&info.address), "{text}");
            assert!(text.contains("Sakura Sushi"));
            if info.has_delivery_time() {
                assert!(text.contains(&info.delivery_time), "{text}");
            }
            if info.has_extra_wish() {
                assert!(text.contains("Customer Added:"));
            }
            for section in MenuSection::ALL {
                let items = order.items(section);
                if !items.is_empty() {
                    assert!(text.contains(&item_list(items)), "{section} missing in {text}");
                }
            }
        }
    }
}

#[test]
fn generation_is_reproducible_per_seed() {
    let generator = generator();
    assert_eq!(digest(&generator, 42, 25), digest(&generator, 42, 25));
    assert_ne!(digest(&generator, 42, 25), digest(&generator, 43, 25));
}
