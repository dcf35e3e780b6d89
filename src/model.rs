//! Data models for the storefront
//!
//! Entities are stored as JSON values in redb tables (see [`crate::database`]).
//! Request payloads live at the bottom of this module; response shapes are
//! built by [`crate::serializer`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Payment method that leaves an order pending until delivery
pub const CASH_ON_DELIVERY: &str = "cod";

/// Shipping method used when the client does not send one
pub const DEFAULT_SHIPPING_METHOD: &str = "sd";

/// A catalog entry
///
/// `product_id` is the primary key. Stock is unsigned so a stored product can
/// never hold a negative quantity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,

    #[serde(default)]
    pub product_name: Option<String>,

    pub price: Decimal,

    #[serde(default = "default_stock")]
    pub stock: u32,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub is_new_release: bool,

    #[serde(default)]
    pub is_trending: bool,

    /// Star rating, 0 to 5
    #[serde(default)]
    pub rating: u8,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub detail: Option<String>,

    #[serde(default)]
    pub eco_point: u32,

    #[serde(default)]
    pub img_url: Option<String>,
}

fn default_stock() -> u32 {
    1
}

impl Product {
    /// Name captured into order lines; unnamed products snapshot as an empty string
    pub fn display_name(&self) -> String {
        self.product_name.clone().unwrap_or_default()
    }
}

/// A registered account
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string, never serialized to clients
    pub password_hash: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

/// A shopping cart owned by a user or addressed by a guest token
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Cart {
    pub id: u64,
    pub user_id: Option<u64>,
    pub guest_token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CartItem {
    pub id: u64,
    pub cart_id: u64,
    pub product_id: String,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item joined with its current product
#[derive(Debug, Clone)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.product.price * Decimal::from(self.item.quantity)
    }
}

/// A cart with its resolved lines
#[derive(Debug, Clone)]
pub struct CartDetail {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
}

impl CartDetail {
    pub fn total_price(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.item.quantity)).sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status may move to `next`
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Processing | Cancelled)
                | (Paid, Processing | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered)
        )
    }
}

/// Flat shipping fee for a shipping method code
///
/// Unknown codes are charged the standard rate.
pub fn shipping_fee(method: &str) -> Decimal {
    match method {
        "fd" => Decimal::new(8000, 2),
        "pd" => Decimal::new(10000, 2),
        _ => Decimal::new(5000, 2),
    }
}

/// Order header
///
/// `subtotal`, `shipping_fee` and `total_amount` are always computed on the
/// server from the order's items.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    pub id: u64,
    pub user_id: Option<u64>,
    #[serde(flatten)]
    pub contact: OrderContact,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order
///
/// `product_name` and `price` are copied from the product when the order is
/// placed and never change afterwards.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderItem {
    pub id: u64,
    pub order_id: u64,
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An order with its items
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Registration form
///
/// Fields default to empty so a missing field is reported by validation
/// rather than by the JSON decoder.
#[derive(Deserialize, Validate, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 150, message = "Username is required"))]
    pub username: String,

    #[serde(default)]
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(default)]
    pub confirm_password: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 10, message = "Phone number has at most 10 characters"))]
    pub phone_number: String,
}

#[derive(Deserialize, Validate, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Contact, shipping and payment details of an order
#[derive(Serialize, Deserialize, Validate, Debug, Clone)]
pub struct OrderContact {
    #[serde(default)]
    #[validate(length(max = 254))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone_number: String,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub address: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub province: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub district: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub sub_district: String,

    #[serde(default)]
    #[validate(length(max = 10))]
    pub postal_code: String,

    #[serde(default)]
    #[validate(length(max = 1000))]
    pub note: String,

    #[serde(default = "default_shipping_method")]
    pub shipping_method: String,

    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

impl Default for OrderContact {
    fn default() -> Self {
        Self {
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            address: String::new(),
            province: String::new(),
            district: String::new(),
            sub_district: String::new(),
            postal_code: String::new(),
            note: String::new(),
            shipping_method: default_shipping_method(),
            payment_method: default_payment_method(),
        }
    }
}

fn default_shipping_method() -> String {
    DEFAULT_SHIPPING_METHOD.to_string()
}

fn default_payment_method() -> String {
    CASH_ON_DELIVERY.to_string()
}

/// Checkout payload: contact details plus the items to buy
///
/// # Example
/// ```json
/// {
///   "items": [{"product_id": "P1", "quantity": 2}],
///   "shipping_method": "fd",
///   "payment_method": "cod"
/// }
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub contact: OrderContact,

    #[serde(default)]
    pub items: Vec<CheckoutItemRequest>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CheckoutItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct AddCartItemRequest {
    pub product_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Deserialize, Debug)]
pub struct RemoveCartItemRequest {
    pub item_id: Option<u64>,
}

#[derive(Deserialize, Debug)]
pub struct UpdateQuantityRequest {
    pub item_id: Option<u64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}
