//! Temporary restaurant conditions (stock-outs, information restrictions) and
//! the transform that reshapes ground truth to honor them.

use rand::Rng;
use rand::seq::{IteratorRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ConditionWeights;
use crate::constants::NO_DELIVERY_ADDRESS;
use crate::data::Restaurant;
use crate::error::GameError;
use crate::order::{MenuSection, Order};

/// Condition discriminant, used for weighting and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    OutOfStockSection,
    OutOfStockItem,
    NoFirstname,
    NoDelivery,
    NoDeliveryTime,
    NoExtraWish,
}

impl ConditionKind {
    pub const ALL: [Self; 6] = [
        Self::OutOfStockSection,
        Self::OutOfStockItem,
        Self::NoFirstname,
        Self::NoDelivery,
        Self::NoDeliveryTime,
        Self::NoExtraWish,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OutOfStockSection => "out_of_stock_section",
            Self::OutOfStockItem => "out_of_stock_item",
            Self::NoFirstname => "no_firstname",
            Self::NoDelivery => "no_delivery",
            Self::NoDeliveryTime => "no_delivery_time",
            Self::NoExtraWish => "no_extra_wish",
        }
    }

    #[must_use]
    pub const fn is_stock(self) -> bool {
        matches!(self, Self::OutOfStockSection | Self::OutOfStockItem)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single condition instance with the parameters its kind requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    OutOfStockSection {
        restaurant: String,
        section: MenuSection,
    },
    OutOfStockItem {
        restaurant: String,
        section: MenuSection,
        item: String,
    },
    NoFirstname {
        restaurant: String,
    },
    NoDelivery {
        restaurant: String,
    },
    NoDeliveryTime {
        restaurant: String,
    },
    NoExtraWish {
        restaurant: String,
    },
}

impl Condition {
    /// Build a condition from loose parts.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MissingParameter`] when a stock condition lacks
    /// its section or item.
    pub fn from_parts(
        kind: ConditionKind,
        restaurant: impl Into<String>,
        section: Option<MenuSection>,
        item: Option<&str>,
    ) -> Result<Self, GameError> {
        let restaurant = restaurant.into();
        let missing = |parameter| GameError::MissingParameter {
            condition: kind.label(),
            parameter,
        };
        Ok(match kind {
            ConditionKind::OutOfStockSection => Self::OutOfStockSection {
                restaurant,
                section: section.ok_or_else(|| missing("menu section"))?,
            },
            ConditionKind::OutOfStockItem => Self::OutOfStockItem {
                restaurant,
                section: section.ok_or_else(|| missing("menu section"))?,
                item: item
                    .filter(|item| !item.is_empty())
                    .ok_or_else(|| missing("menu item"))?
                    .to_string(),
            },
            ConditionKind::NoFirstname => Self::NoFirstname { restaurant },
            ConditionKind::NoDelivery => Self::NoDelivery { restaurant },
            ConditionKind::NoDeliveryTime => Self::NoDeliveryTime { restaurant },
            ConditionKind::NoExtraWish => Self::NoExtraWish { restaurant },
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ConditionKind {
        match self {
            Self::OutOfStockSection { .. } => ConditionKind::OutOfStockSection,
            Self::OutOfStockItem { .. } => ConditionKind::OutOfStockItem,
            Self::NoFirstname { .. } => ConditionKind::NoFirstname,
            Self::NoDelivery { .. } => ConditionKind::NoDelivery,
            Self::NoDeliveryTime { .. } => ConditionKind::NoDeliveryTime,
            Self::NoExtraWish { .. } => ConditionKind::NoExtraWish,
        }
    }

    #[must_use]
    pub fn restaurant(&self) -> &str {
        match self {
            Self::OutOfStockSection { restaurant, .. }
            | Self::OutOfStockItem { restaurant, .. }
            | Self::NoFirstname { restaurant }
            | Self::NoDelivery { restaurant }
            | Self::NoDeliveryTime { restaurant }
            | Self::NoExtraWish { restaurant } => restaurant,
        }
    }

    /// Announcement text shown while the condition is active.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::OutOfStockSection {
                restaurant,
                section,
            } => format!("{restaurant} is out of stock for {section}!"),
            Self::OutOfStockItem {
                restaurant, item, ..
            } => format!("{restaurant} is out of stock for {item}!"),
            Self::NoFirstname { restaurant } => format!(
                "For {restaurant} orders you shouldn't specify the first name of customers."
            ),
            Self::NoDelivery { restaurant } => format!(
                "{restaurant} doesn't do delivery anymore.\nType in `{NO_DELIVERY_ADDRESS}` for the address field!"
            ),
            Self::NoDeliveryTime { restaurant } => {
                format!("For {restaurant} orders you shouldn't specify delivery time.")
            }
            Self::NoExtraWish { restaurant } => {
                format!("For {restaurant} orders you shouldn't specify extra information.")
            }
        }
    }
}

/// Customer-information restrictions active for one restaurant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantFlags {
    pub no_firstname: bool,
    pub no_delivery: bool,
    pub no_delivery_time: bool,
    pub no_extra_wish: bool,
}

impl RestaurantFlags {
    const fn is_clear(self) -> bool {
        !(self.no_firstname || self.no_delivery || self.no_delivery_time || self.no_extra_wish)
    }
}

/// Per-session condition state keyed by restaurant name.
///
/// Stock conditions are layered: applying the same one twice needs two
/// expiries before it is gone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBoard {
    out_of_stock_sections: BTreeMap<String, SmallVec<[MenuSection; 4]>>,
    out_of_stock_items: BTreeMap<String, BTreeMap<MenuSection, Vec<String>>>,
    flags: BTreeMap<String, RestaurantFlags>,
}

impl ConditionBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate a condition and return its announcement.
    pub fn apply(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::OutOfStockSection {
                restaurant,
                section,
            } => {
                self.out_of_stock_sections
                    .entry(restaurant.clone())
                    .or_default()
                    .push(*section);
            }
            Condition::OutOfStockItem {
                restaurant,
                section,
                item,
            } => {
                self.out_of_stock_items
                    .entry(restaurant.clone())
                    .or_default()
                    .entry(*section)
                    .or_default()
                    .push(item.clone());
            }
            Condition::NoFirstname { restaurant } => {
                self.flags_mut(restaurant).no_firstname = true;
            }
            Condition::NoDelivery { restaurant } => {
                self.flags_mut(restaurant).no_delivery = true;
            }
            Condition::NoDeliveryTime { restaurant } => {
                self.flags_mut(restaurant).no_delivery_time = true;
            }
            Condition::NoExtraWish { restaurant } => {
                self.flags_mut(restaurant).no_extra_wish = true;
            }
        }
        log::debug!("condition applied: {condition:?}");
        condition.message()
    }

    /// Apply from loose parts.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MissingParameter`] when a stock condition lacks
    /// its section or item.
    pub fn apply_parts(
        &mut self,
        kind: ConditionKind,
        restaurant: &str,
        section: Option<MenuSection>,
        item: Option<&str>,
    ) -> Result<String, GameError> {
        let condition = Condition::from_parts(kind, restaurant, section, item)?;
        Ok(self.apply(&condition))
    }

    /// Remove one occurrence of a condition, or clear its flag.
    ///
    /// Returns whether anything was still active. Expiring an already
    /// cleared condition is a no-op.
    pub fn expire(&mut self, condition: &Condition) -> bool {
        let removed = match condition {
            Condition::OutOfStockSection {
                restaurant,
                section,
            } => {
                let Some(sections) = self.out_of_stock_sections.get_mut(restaurant) else {
                    return false;
                };
                let removed = remove_one(sections, section)
                    .map(|index| sections.remove(index))
                    .is_some();
                if sections.is_empty() {
                    self.out_of_stock_sections.remove(restaurant);
                }
                removed
            }
            Condition::OutOfStockItem {
                restaurant,
                section,
                item,
            } => {
                let Some(by_section) = self.out_of_stock_items.get_mut(restaurant) else {
                    return false;
                };
                let removed = by_section
                    .get_mut(section)
                    .is_some_and(|items| {
                        remove_one(items, item)
                            .map(|index| items.remove(index))
                            .is_some()
                    });
                by_section.retain(|_, items| !items.is_empty());
                if by_section.is_empty() {
                    self.out_of_stock_items.remove(restaurant);
                }
                removed
            }
            Condition::NoFirstname { restaurant } => {
                self.clear_flag(restaurant, |flags| &mut flags.no_firstname)
            }
            Condition::NoDelivery { restaurant } => {
                self.clear_flag(restaurant, |flags| &mut flags.no_delivery)
            }
            Condition::NoDeliveryTime { restaurant } => {
                self.clear_flag(restaurant, |flags| &mut flags.no_delivery_time)
            }
            Condition::NoExtraWish { restaurant } => {
                self.clear_flag(restaurant, |flags| &mut flags.no_extra_wish)
            }
        };
        log::debug!("condition expired: {condition:?} (was active: {removed})");
        removed
    }

    /// Expire from loose parts.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MissingParameter`] when a stock condition lacks
    /// its section or item.
    pub fn expire_parts(
        &mut self,
        kind: ConditionKind,
        restaurant: &str,
        section: Option<MenuSection>,
        item: Option<&str>,
    ) -> Result<bool, GameError> {
        let condition = Condition::from_parts(kind, restaurant, section, item)?;
        Ok(self.expire(&condition))
    }

    /// Copy of `order` reshaped by every condition active on its restaurant.
    ///
    /// Orders without a restaurant are returned unchanged.
    #[must_use]
    pub fn adjust(&self, order: &Order) -> Order {
        let mut adjusted = order.clone();
        let Some(restaurant) = order.restaurant_name.as_deref() else {
            return adjusted;
        };

        if let Some(sections) = self.out_of_stock_sections.get(restaurant) {
            for section in sections {
                adjusted.foods.remove(section);
            }
        }
        if let Some(by_section) = self.out_of_stock_items.get(restaurant) {
            for (section, items) in by_section {
                for item in items {
                    adjusted.remove_item(*section, item);
                }
            }
        }

        let flags = self.flags(restaurant);
        if let Some(info) = adjusted.customer_information.as_mut() {
            if flags.no_firstname
                && let Some(last) = info.name.split_whitespace().last()
            {
                info.name = last.to_string();
            }
            if flags.no_delivery {
                info.address = NO_DELIVERY_ADDRESS.to_string();
            }
            if flags.no_delivery_time {
                info.delivery_time.clear();
            }
            if flags.no_extra_wish {
                info.extra_wish.clear();
            }
        }
        adjusted
    }

    #[must_use]
    pub fn flags(&self, restaurant: &str) -> RestaurantFlags {
        self.flags.get(restaurant).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn out_of_stock_sections(&self, restaurant: &str) -> &[MenuSection] {
        self.out_of_stock_sections
            .get(restaurant)
            .map(|sections| sections.as_slice())
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn out_of_stock_items(&self, restaurant: &str, section: MenuSection) -> &[String] {
        self.out_of_stock_items
            .get(restaurant)
            .and_then(|by_section| by_section.get(&section))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether no condition is active anywhere.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.out_of_stock_sections.is_empty()
            && self.out_of_stock_items.is_empty()
            && self.flags.values().all(|flags| flags.is_clear())
    }

    pub fn clear(&mut self) {
        self.out_of_stock_sections.clear();
        self.out_of_stock_items.clear();
        self.flags.clear();
    }

    fn flags_mut(&mut self, restaurant: &str) -> &mut RestaurantFlags {
        self.flags.entry(restaurant.to_string()).or_default()
    }

    fn clear_flag(
        &mut self,
        restaurant: &str,
        select: impl FnOnce(&mut RestaurantFlags) -> &mut bool,
    ) -> bool {
        let Some(flags) = self.flags.get_mut(restaurant) else {
            return false;
        };
        let was_set = std::mem::replace(select(flags), false);
        if flags.is_clear() {
            self.flags.remove(restaurant);
        }
        was_set
    }
}

fn remove_one<T: PartialEq>(items: &[T], target: &T) -> Option<usize> {
    items.iter().position(|candidate| candidate == target)
}

impl ConditionWeights {
    /// Draw a condition kind according to the weights.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> ConditionKind {
        let total = self.total();
        if total <= 0.0 {
            return ConditionKind::OutOfStockItem;
        }
        let mut roll = rng.gen_range(0.0..total);
        for kind in ConditionKind::ALL {
            let weight = self.get(kind);
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        ConditionKind::NoExtraWish
    }
}

/// Roll a random condition for `restaurant`.
///
/// Returns `None` when a stock condition was drawn but the menu is empty.
pub fn roll_condition<R: Rng + ?Sized>(
    restaurant: &Restaurant,
    weights: &ConditionWeights,
    rng: &mut R,
) -> Option<Condition> {
    let kind = weights.pick(rng);
    let name = restaurant.name.as_str();
    let condition = match kind {
        ConditionKind::OutOfStockSection => Condition::OutOfStockSection {
            restaurant: name.to_string(),
            section: restaurant.stocked_sections().choose(rng)?,
        },
        ConditionKind::OutOfStockItem => {
            let section = restaurant.stocked_sections().choose(rng)?;
            let item = restaurant.items(section).choose(rng)?;
            Condition::OutOfStockItem {
                restaurant: name.to_string(),
                section,
                item: item.clone(),
            }
        }
        ConditionKind::NoFirstname => Condition::NoFirstname {
            restaurant: name.to_string(),
        },
        ConditionKind::NoDelivery => Condition::NoDelivery {
            restaurant: name.to_string(),
        },
        ConditionKind::NoDeliveryTime => Condition::NoDeliveryTime {
            restaurant: name.to_string(),
        },
        ConditionKind::NoExtraWish => Condition::NoExtraWish {
            restaurant: name.to_string(),
        },
    };
    Some(condition)
}
