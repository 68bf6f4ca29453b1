// Order identity
pub const ORDER_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const ORDER_ID_LEN: usize = 4;

// Condition side effects
pub const NO_DELIVERY_ADDRESS: &str = "No delivery available";
pub const CONDITION_ALERT_SENDER: &str = "Conditions Alert";

// Presentation-layer form limits
pub const SHORT_FIELD_MAX_CHARS: usize = 64;
pub const LONG_FIELD_MAX_CHARS: usize = 1028;

// Lifecycle defaults
pub const DEFAULT_ACTIVE_ORDERS: usize = 3;
pub const DEFAULT_MEDIUM_THRESHOLD: u32 = 10;
pub const DEFAULT_HARD_THRESHOLD: u32 = 20;

// Scoring: restaurant identity plus name, address, delivery time, extra wish
pub const CUSTOMER_INFO_FIELDS: usize = 4;
pub const RESTAURANT_CHECKS: usize = 1;

// Announcement avatars
pub const AVATAR_BASE_URL: &str = "https://api.dicebear.com/9.x/notionists/png";

// Description markers
pub const EXTRA_WISH_PREFIX: &str = "Customer Added:";
pub const PLACEHOLDER_RESTAURANT: &str = "<RESTAURANT>";
pub const PLACEHOLDER_NAME: &str = "<NAME>";
pub const PLACEHOLDER_ADDRESS: &str = "<ADDRESS>";
pub const PLACEHOLDER_TIME: &str = "<TIME>";
