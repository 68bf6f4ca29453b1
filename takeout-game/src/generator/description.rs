//! Noisy natural-language rendering of a ground-truth order.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::Window;
use crate::constants::{
    EXTRA_WISH_PREFIX, PLACEHOLDER_ADDRESS, PLACEHOLDER_NAME, PLACEHOLDER_RESTAURANT,
    PLACEHOLDER_TIME,
};
use crate::data::ContentCorpus;
use crate::difficulty::Difficulty;
use crate::order::{CustomerInformation, MenuSection, Order};

/// Inputs for one description.
pub struct DescriptionInput<'a> {
    pub restaurant: &'a str,
    pub customer: &'a CustomerInformation,
    pub order: &'a Order,
    pub difficulty: Difficulty,
    pub noise: Window,
}

fn choose<'a, R: Rng + ?Sized>(pool: &'a [String], rng: &mut R) -> &'a str {
    pool.choose(rng).map_or("", String::as_str)
}

/// `"2 Garlic Knots and 1 Bruschetta"` over distinct items in first-appearance order.
#[must_use]
pub fn item_list(items: &[String]) -> String {
    let mut distinct: Vec<(&str, usize)> = Vec::new();
    for item in items {
        match distinct.iter_mut().find(|(name, _)| *name == item.as_str()) {
            Some((_, count)) => *count += 1,
            None => distinct.push((item.as_str(), 1)),
        }
    }
    distinct
        .iter()
        .map(|(name, count)| format!("{count} {name}"))
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Join template sentences with difficulty-dependent filler into one line.
fn paragraph<R: Rng + ?Sized>(
    mut sentences: Vec<String>,
    corpus: &ContentCorpus,
    difficulty: Difficulty,
    noise: Window,
    rng: &mut R,
) -> String {
    let filler = rng.gen_range(noise.min..=noise.max);
    for index in 0..filler {
        let pool = if index == 0 {
            &corpus.noise
        } else {
            &corpus.relevant_noise
        };
        sentences.push(choose(pool, rng).to_string());
    }
    if difficulty != Difficulty::Easy {
        sentences.shuffle(rng);
    }
    sentences.retain(|sentence| !sentence.is_empty());
    let mut line = sentences.join(" ");
    line.push('\n');
    line
}

/// Render the description for `input`.
pub fn describe<R: Rng + ?Sized>(
    input: &DescriptionInput<'_>,
    corpus: &ContentCorpus,
    rng: &mut R,
) -> String {
    let customer = input.customer;
    let templates = &corpus.templates;
    let mut text = format!(":id: **Customer ID:** `{}`\n\n", customer.order_id);

    let name_in_intro = rng.gen_bool(0.5);
    text.push_str(choose(corpus.intros.pool(name_in_intro), rng));
    text.push(' ');

    let mut context = vec![choose(&templates.restaurants, rng).to_string()];
    if customer.has_delivery_time() {
        context.push(choose(&templates.times, rng).to_string());
    }
    context.push(choose(&templates.addresses, rng).to_string());
    text.push_str(&paragraph(
        context,
        corpus,
        input.difficulty,
        input.noise,
        rng,
    ));
    text.push('\n');

    let menu: Vec<String> = MenuSection::ALL
        .into_iter()
        .filter(|section| !input.order.items(*section).is_empty())
        .map(|section| choose(templates.for_section(section), rng).to_string())
        .collect();
    text.push_str(&paragraph(menu, corpus, input.difficulty, input.noise, rng));

    // The outro names the customer only when the intro did not.
    text.push_str(choose(corpus.outros.pool(!name_in_intro), rng));

    text = text
        .replace(PLACEHOLDER_RESTAURANT, input.restaurant)
        .replace(PLACEHOLDER_NAME, &customer.name)
        .replace(PLACEHOLDER_ADDRESS, &customer.address);
    if customer.has_delivery_time() {
        text = text.replace(PLACEHOLDER_TIME, &customer.delivery_time);
    }
    for section in MenuSection::ALL {
        text = text.replace(section.placeholder(), &item_list(input.order.items(section)));
    }

    if customer.has_extra_wish() {
        let addition = corpus.wish_addition(&customer.extra_wish);
        text.push_str(&format!(
            "\n:information_source: {EXTRA_WISH_PREFIX} `{addition}`"
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EmbeddableTemplates, ExtraWish, GreetingPool, NameVocabulary};
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::BTreeMap;

    fn one(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    fn corpus() -> ContentCorpus {
        let mut foods = BTreeMap::new();
        foods.insert(MenuSection::Starters, one("Starters: <STARTERS>."));
        foods.insert(MenuSection::MainCourses, one("Main: <MAIN>."));
        foods.insert(MenuSection::Desserts, one("Desserts: <DESSERTS>."));
        foods.insert(MenuSection::Drinks, one("Drinks: <DRINKS>."));
        ContentCorpus {
            noise: one("NOISE."),
            relevant_noise: one("RELEVANT."),
            templates: EmbeddableTemplates {
                restaurants: one("From <RESTAURANT>."),
                times: one("By <TIME>."),
                addresses: one("To <ADDRESS>."),
                foods,
            },
            intros: GreetingPool {
                with_name: one("I am <NAME>."),
                without_name: one("Hello."),
            },
            outros: GreetingPool {
                with_name: one("Bye, <NAME>."),
                without_name: one("Bye."),
            },
            extra_wishes: vec![ExtraWish {
                wish: "Knock loudly.".into(),
                addition: "Please knock loudly, the bell is broken.".into(),
            }],
            names: NameVocabulary::default(),
        }
    }

    fn order() -> Order {
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        Order::for_restaurant("Pizzaria", ts)
            .with_item(MenuSection::Starters, "Garlic Knots")
            .with_item(MenuSection::Starters, "Bruschetta")
            .with_item(MenuSection::Starters, "Garlic Knots")
            .with_item(MenuSection::Drinks, "Cola")
    }

    #[test]
    fn item_list_counts_in_first_appearance_order() {
        let items = ["B", "A", "B", "B"].map(String::from);
        assert_eq!(item_list(&items), "3 B and 1 A");
        assert_eq!(item_list(&[]), "");
    }

    #[test]
    fn easy_description_substitutes_everything() {
        let customer = CustomerInformation::new("ab12", "Ada Lovelace", "12 Elm Street")
            .with_delivery_time("7 o'clock")
            .with_extra_wish("Knock loudly.");
        let order = order();
        let input = DescriptionInput {
            restaurant: "Pizzaria",
            customer: &customer,
            order: &order,
            difficulty: Difficulty::Easy,
            noise: Window::new(0, 0),
        };
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let text = describe(&input, &corpus(), &mut rng);

        assert!(text.starts_with(":id: **Customer ID:** `ab12`\n\n"));
        assert!(text.contains("From Pizzaria. By 7 o'clock. To 12 Elm Street.\n\n"));
        assert!(text.contains("Starters: 2 Garlic Knots and 1 Bruschetta. Drinks: 1 Cola.\n"));
        assert!(!text.contains("Main:"));
        assert!(text.contains("Ada Lovelace"));
        assert!(!text.contains('<'), "unsubstituted placeholder in {text}");
        assert!(text.ends_with(
            "\n:information_source: Customer Added: `Please knock loudly, the bell is broken.`"
        ));
        assert!(!text.contains("NOISE."));
    }

    #[test]
    fn name_appears_exactly_once_between_intro_and_outro() {
        let customer = CustomerInformation::new("ab12", "Ada Lovelace", "12 Elm Street");
        let order = order();
        for seed in 0..20 {
            let input = DescriptionInput {
                restaurant: "Pizzaria",
                customer: &customer,
                order: &order,
                difficulty: Difficulty::Easy,
                noise: Window::new(0, 0),
            };
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let text = describe(&input, &corpus(), &mut rng);
            assert_eq!(text.matches("Ada Lovelace").count(), 1, "{text}");
            assert!(!text.contains("By "), "time template without a time");
        }
    }

    #[test]
    fn hard_descriptions_carry_noise() {
        let customer = CustomerInformation::new("zz99", "Ada Lovelace", "12 Elm Street");
        let order = order();
        let input = DescriptionInput {
            restaurant: "Pizzaria",
            customer: &customer,
            order: &order,
            difficulty: Difficulty::Hard,
            noise: Window::new(1, 5),
        };
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let text = describe(&input, &corpus(), &mut rng);
        assert_eq!(text.matches("NOISE.").count(), 2, "one general filler per paragraph");
    }
}
