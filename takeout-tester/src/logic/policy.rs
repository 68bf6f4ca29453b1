use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use takeout_game::constants::{
    EXTRA_WISH_PREFIX, PLACEHOLDER_ADDRESS, PLACEHOLDER_NAME, PLACEHOLDER_TIME,
};
use takeout_game::{ActiveOrder, CustomerInformation, GameContent, MenuSection, Order};

static ORDER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":id: \*\*Customer ID:\*\* `([^`]+)`").expect("order id pattern"));
static CUSTOMER_ADDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("{} `([^`]+)`", regex::escape(EXTRA_WISH_PREFIX)))
        .expect("extra wish pattern")
});

/// An order handed in by a [`PlayerPolicy`].
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub order: Order,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub fn new(order: Order, rationale: Option<String>) -> Self {
        Self { order, rationale }
    }
}

/// Policy interface for simulated players.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Seconds between an order appearing and the player handing it in.
    fn think_seconds(&mut self, active: &ActiveOrder) -> i64;

    /// Fill in the order form. `expected` is what the restaurant currently wants.
    fn fill_order(&mut self, active: &ActiveOrder, expected: &Order) -> PolicyDecision;
}

/// Built-in player behaviours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayStrategy {
    /// Submits exactly what the restaurant wants, quickly.
    Perfect,
    /// Submits the generated order, ignoring conditions.
    Raw,
    /// Gets everything right except one typo in the name.
    Typo,
    /// Correct, but only after the penalty deadline.
    Slow,
    /// Reconstructs the order from the description text alone.
    Reader,
}

impl PlayStrategy {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::Raw => "Raw",
            Self::Typo => "Typo",
            Self::Slow => "Slow",
            Self::Reader => "Reader",
        }
    }

    #[must_use]
    pub fn create_policy(
        self,
        seed: u64,
        content: &Arc<GameContent>,
    ) -> Box<dyn PlayerPolicy + Send> {
        match self {
            Self::Perfect => Box::new(PerfectPolicy),
            Self::Raw => Box::new(RawPolicy),
            Self::Typo => Box::new(TypoPolicy::new(seed)),
            Self::Slow => Box::new(SlowPolicy),
            Self::Reader => Box::new(ReaderPolicy::new(Arc::clone(content), seed)),
        }
    }
}

impl fmt::Display for PlayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const QUICK_SECONDS: i64 = 5;

struct PerfectPolicy;
struct RawPolicy;
struct SlowPolicy;

struct TypoPolicy {
    rng: ChaCha20Rng,
}

impl TypoPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for PerfectPolicy {
    fn name(&self) -> &'static str {
        "Perfect"
    }

    fn think_seconds(&mut self, _active: &ActiveOrder) -> i64 {
        QUICK_SECONDS
    }

    fn fill_order(&mut self, _active: &ActiveOrder, expected: &Order) -> PolicyDecision {
        PolicyDecision::new(expected.clone(), None)
    }
}

impl PlayerPolicy for RawPolicy {
    fn name(&self) -> &'static str {
        "Raw"
    }

    fn think_seconds(&mut self, _active: &ActiveOrder) -> i64 {
        QUICK_SECONDS
    }

    fn fill_order(&mut self, active: &ActiveOrder, expected: &Order) -> PolicyDecision {
        let rationale = (active.order() != expected).then(|| "ignored conditions".to_string());
        PolicyDecision::new(active.order().clone(), rationale)
    }
}

impl PlayerPolicy for TypoPolicy {
    fn name(&self) -> &'static str {
        "Typo"
    }

    fn think_seconds(&mut self, _active: &ActiveOrder) -> i64 {
        self.rng.gen_range(QUICK_SECONDS..=20)
    }

    fn fill_order(&mut self, _active: &ActiveOrder, expected: &Order) -> PolicyDecision {
        let mut order = expected.clone();
        let mut rationale = None;
        if let Some(info) = order.customer_information.as_mut() {
            let typo = introduce_typo(&info.name, &mut self.rng);
            rationale = Some(format!("typed {typo:?} for {:?}", info.name));
            info.name = typo;
        }
        PolicyDecision::new(order, rationale)
    }
}

impl PlayerPolicy for SlowPolicy {
    fn name(&self) -> &'static str {
        "Slow"
    }

    fn think_seconds(&mut self, active: &ActiveOrder) -> i64 {
        i64::from(active.order().penalty_seconds) + 1
    }

    fn fill_order(&mut self, _active: &ActiveOrder, expected: &Order) -> PolicyDecision {
        PolicyDecision::new(expected.clone(), Some("past the deadline".into()))
    }
}

/// Shift one ASCII letter to its neighbour so the text always changes.
fn introduce_typo<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let letters: Vec<usize> = text
        .char_indices()
        .filter(|(_, c)| c.is_ascii_alphabetic())
        .map(|(index, _)| index)
        .collect();
    let Some(&at) = letters.choose(rng) else {
        return format!("{text}x");
    };
    let original = text[at..].chars().next().unwrap_or('a');
    let replacement = match original {
        'z' => 'a',
        'Z' => 'A',
        c => char::from_u32(u32::from(c) + 1).unwrap_or('a'),
    };
    let mut typo = text.to_string();
    typo.replace_range(at..=at, replacement.encode_utf8(&mut [0; 4]));
    typo
}

/// Turn `"Good day, <NAME> here."` into a pattern capturing the placeholder.
fn template_patterns(templates: &[String], placeholder: &str) -> Vec<Regex> {
    templates
        .iter()
        .filter_map(|template| {
            let (before, after) = template.split_once(placeholder)?;
            let tail = if after.is_empty() {
                "$".to_string()
            } else {
                regex::escape(after)
            };
            Regex::new(&format!("(?m){}(.+?){tail}", regex::escape(before))).ok()
        })
        .collect()
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

struct ItemPattern {
    restaurant: String,
    section: MenuSection,
    item: String,
    pattern: Regex,
}

/// Reads descriptions the way a player would: inverting the known sentence shapes.
struct ReaderPolicy {
    content: Arc<GameContent>,
    rng: ChaCha20Rng,
    names: Vec<Regex>,
    addresses: Vec<Regex>,
    times: Vec<Regex>,
    items: Vec<ItemPattern>,
}

impl ReaderPolicy {
    fn new(content: Arc<GameContent>, seed: u64) -> Self {
        let corpus = &content.corpus;
        let mut greetings = corpus.intros.with_name.clone();
        greetings.extend(corpus.outros.with_name.iter().cloned());
        let names = template_patterns(&greetings, PLACEHOLDER_NAME);
        let addresses = template_patterns(&corpus.templates.addresses, PLACEHOLDER_ADDRESS);
        let times = template_patterns(&corpus.templates.times, PLACEHOLDER_TIME);

        let mut items = Vec::new();
        for restaurant in content.catalog.iter() {
            for section in MenuSection::ALL {
                for item in restaurant.items(section) {
                    let pattern = format!(r"\b(\d+) {}\b", regex::escape(item));
                    if let Ok(pattern) = Regex::new(&pattern) {
                        items.push(ItemPattern {
                            restaurant: restaurant.name.clone(),
                            section,
                            item: item.clone(),
                            pattern,
                        });
                    }
                }
            }
        }

        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            names,
            addresses,
            times,
            items,
            content,
        }
    }

    fn wish_for(&self, addition: &str) -> String {
        self.content
            .corpus
            .extra_wishes
            .iter()
            .find(|wish| wish.addition == addition)
            .map_or_else(|| addition.to_string(), |wish| wish.wish.clone())
    }

    fn read(&self, active: &ActiveOrder) -> Order {
        let text = active.description();
        let order_id = ORDER_ID
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let extra_wish = CUSTOMER_ADDED
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| self.wish_for(m.as_str()))
            .unwrap_or_default();
        let info = CustomerInformation::new(
            order_id,
            first_capture(&self.names, text).unwrap_or_default(),
            first_capture(&self.addresses, text).unwrap_or_default(),
        )
        .with_delivery_time(first_capture(&self.times, text).unwrap_or_default())
        .with_extra_wish(extra_wish);

        let mut order = Order::for_restaurant(&active.restaurant, active.order().order_timestamp)
            .with_customer_information(info)
            .with_penalty_seconds(active.order().penalty_seconds);
        for candidate in self
            .items
            .iter()
            .filter(|candidate| candidate.restaurant == active.restaurant)
        {
            let count: usize = candidate
                .pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
                .sum();
            for _ in 0..count {
                order.add_item(candidate.section, candidate.item.clone());
            }
        }
        order.fill_sections();
        order
    }
}

impl PlayerPolicy for ReaderPolicy {
    fn name(&self) -> &'static str {
        "Reader"
    }

    fn think_seconds(&mut self, _active: &ActiveOrder) -> i64 {
        self.rng.gen_range(10..=40)
    }

    fn fill_order(&mut self, active: &ActiveOrder, _expected: &Order) -> PolicyDecision {
        PolicyDecision::new(self.read(active), Some("read from the description".into()))
    }
}
