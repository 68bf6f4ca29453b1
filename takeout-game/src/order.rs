//! Orders, their customer information, and the fixed menu sections.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Menu sections in the order orders are generated and described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MenuSection {
    Starters,
    #[serde(rename = "Main Courses")]
    MainCourses,
    Desserts,
    Drinks,
}

impl MenuSection {
    pub const ALL: [Self; 4] = [
        Self::Starters,
        Self::MainCourses,
        Self::Desserts,
        Self::Drinks,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Starters => "Starters",
            Self::MainCourses => "Main Courses",
            Self::Desserts => "Desserts",
            Self::Drinks => "Drinks",
        }
    }

    /// Template token replaced by this section's item list.
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Starters => "<STARTERS>",
            Self::MainCourses => "<MAIN>",
            Self::Desserts => "<DESSERTS>",
            Self::Drinks => "<DRINKS>",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|section| section.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl fmt::Display for MenuSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Customer details attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerInformation {
    pub order_id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub delivery_time: String,
    #[serde(default)]
    pub extra_wish: String,
}

impl CustomerInformation {
    pub fn new(
        order_id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            name: name.into(),
            address: address.into(),
            delivery_time: String::new(),
            extra_wish: String::new(),
        }
    }

    #[must_use]
    pub fn with_delivery_time(mut self, delivery_time: impl Into<String>) -> Self {
        self.delivery_time = delivery_time.into();
        self
    }

    #[must_use]
    pub fn with_extra_wish(mut self, extra_wish: impl Into<String>) -> Self {
        self.extra_wish = extra_wish.into();
        self
    }

    #[must_use]
    pub fn has_delivery_time(&self) -> bool {
        !self.delivery_time.is_empty()
    }

    #[must_use]
    pub fn has_extra_wish(&self) -> bool {
        !self.extra_wish.is_empty()
    }
}

/// An order, either generated ground truth or a player's submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub customer_information: Option<CustomerInformation>,
    #[serde(default)]
    pub restaurant_name: Option<String>,
    /// Items per section; repeated names encode quantity.
    #[serde(default)]
    pub foods: BTreeMap<MenuSection, Vec<String>>,
    pub order_timestamp: DateTime<Utc>,
    #[serde(default = "Order::default_penalty_seconds")]
    pub penalty_seconds: u32,
}

impl Order {
    const fn default_penalty_seconds() -> u32 {
        300
    }

    /// Empty order stamped at `order_timestamp`.
    #[must_use]
    pub fn new(order_timestamp: DateTime<Utc>) -> Self {
        Self {
            customer_information: None,
            restaurant_name: None,
            foods: BTreeMap::new(),
            order_timestamp,
            penalty_seconds: Self::default_penalty_seconds(),
        }
    }

    /// Empty submission addressed to a restaurant.
    #[must_use]
    pub fn for_restaurant(restaurant: impl Into<String>, order_timestamp: DateTime<Utc>) -> Self {
        Self {
            restaurant_name: Some(restaurant.into()),
            ..Self::new(order_timestamp)
        }
    }

    #[must_use]
    pub fn with_customer_information(mut self, info: CustomerInformation) -> Self {
        self.customer_information = Some(info);
        self
    }

    #[must_use]
    pub fn with_item(mut self, section: MenuSection, item: impl Into<String>) -> Self {
        self.add_item(section, item);
        self
    }

    #[must_use]
    pub const fn with_penalty_seconds(mut self, penalty_seconds: u32) -> Self {
        self.penalty_seconds = penalty_seconds;
        self
    }

    pub fn set_customer_information(&mut self, info: CustomerInformation) {
        self.customer_information = Some(info);
    }

    pub fn add_item(&mut self, section: MenuSection, item: impl Into<String>) {
        self.foods.entry(section).or_default().push(item.into());
    }

    /// Remove one occurrence of `item`; returns whether anything was removed.
    pub fn remove_item(&mut self, section: MenuSection, item: &str) -> bool {
        let Some(items) = self.foods.get_mut(&section) else {
            return false;
        };
        let Some(position) = items.iter().position(|candidate| candidate == item) else {
            return false;
        };
        items.remove(position);
        true
    }

    /// Ensure every section has an entry, even if empty.
    pub fn fill_sections(&mut self) {
        for section in MenuSection::ALL {
            self.foods.entry(section).or_default();
        }
    }

    #[must_use]
    pub fn items(&self, section: MenuSection) -> &[String] {
        self.foods.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All items across sections in section order.
    pub fn all_items(&self) -> impl Iterator<Item = &str> {
        self.foods.values().flatten().map(String::as_str)
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.foods.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        self.customer_information
            .as_ref()
            .map(|info| info.order_id.as_str())
    }

    /// Instant after which a submission counts as late.
    #[must_use]
    pub fn penalty_timestamp(&self) -> DateTime<Utc> {
        self.order_timestamp + TimeDelta::seconds(i64::from(self.penalty_seconds))
    }
}
