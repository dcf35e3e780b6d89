//! Database initialization and table definitions
//!
//! This module handles the setup of the embedded redb database. Every entity
//! lives in its own table as a JSON string; secondary indexes use composite
//! string keys so a prefix range returns one owner's rows in id order.

use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::auth::TokenKeys;
use crate::error::AppResult;

/// Products by `product_id`
pub const TABLE_PRODUCTS: TableDefinition<&str, &str> = TableDefinition::new("products_v1");

/// Users by numeric id
pub const TABLE_USERS: TableDefinition<u64, &str> = TableDefinition::new("users_v1");

/// Unique index: username -> user id
pub const TABLE_USERNAMES: TableDefinition<&str, u64> = TableDefinition::new("usernames_v1");

/// Unique index: email -> user id
pub const TABLE_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("emails_v1");

/// Wishlist membership
///
/// Key: "{user_id:020}:{product_id}"
/// Value: product_id
pub const TABLE_WISHLIST: TableDefinition<&str, &str> = TableDefinition::new("wishlist_v1");

/// Carts by numeric id
pub const TABLE_CARTS: TableDefinition<u64, &str> = TableDefinition::new("carts_v1");

/// Active cart per owner
///
/// Key: "user:{user_id}" or "guest:{token}"
/// Value: cart id
pub const TABLE_ACTIVE_CARTS: TableDefinition<&str, u64> = TableDefinition::new("active_carts_v1");

/// Cart items
///
/// Key: "{cart_id:020}:{item_id:020}"
pub const TABLE_CART_ITEMS: TableDefinition<&str, &str> = TableDefinition::new("cart_items_v1");

/// Order headers by numeric id
pub const TABLE_ORDERS: TableDefinition<u64, &str> = TableDefinition::new("orders_v1");

/// Order items
///
/// Key: "{order_id:020}:{item_id:020}"
pub const TABLE_ORDER_ITEMS: TableDefinition<&str, &str> = TableDefinition::new("order_items_v1");

/// Index of orders per user
///
/// Key: "{user_id:020}:{order_id:020}"
/// Value: order id
pub const TABLE_USER_ORDERS: TableDefinition<&str, u64> = TableDefinition::new("user_orders_v1");

/// Last id handed out per sequence name
pub const TABLE_SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,
    /// Signing and verification keys for login tokens
    pub keys: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(db: Database, keys: TokenKeys) -> Self {
        Self {
            db: Arc::new(db),
            keys: Arc::new(keys),
        }
    }
}

/// Creates or opens the database file and makes sure every table exists
///
/// # Example
///
/// ```no_run
/// # use ecommerce::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_PRODUCTS)?;
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_USERNAMES)?;
        write_txn.open_table(TABLE_EMAILS)?;
        write_txn.open_table(TABLE_WISHLIST)?;
        write_txn.open_table(TABLE_CARTS)?;
        write_txn.open_table(TABLE_ACTIVE_CARTS)?;
        write_txn.open_table(TABLE_CART_ITEMS)?;
        write_txn.open_table(TABLE_ORDERS)?;
        write_txn.open_table(TABLE_ORDER_ITEMS)?;
        write_txn.open_table(TABLE_USER_ORDERS)?;
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Hands out the next id of a named sequence inside `txn`
///
/// Ids start at 1. The sequence table must not be open elsewhere in the
/// same transaction.
pub fn next_id(txn: &WriteTransaction, sequence: &str) -> AppResult<u64> {
    let mut table = txn.open_table(TABLE_SEQUENCES)?;
    let current = table.get(sequence)?.map(|guard| guard.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

/// Composite key "{owner:020}:{child}" used by the index tables
pub fn child_key(owner: u64, child: impl std::fmt::Display) -> String {
    format!("{owner:020}:{child}")
}

/// Composite key "{owner:020}:{item:020}" for numeric children, sorted by id
pub fn item_key(owner: u64, item: u64) -> String {
    format!("{owner:020}:{item:020}")
}

/// Key bounds covering every composite key of one owner
///
/// ';' sorts right after ':', so the range holds exactly the keys that start
/// with "{owner:020}:".
pub fn owner_range(owner: u64) -> (String, String) {
    (format!("{owner:020}:"), format!("{owner:020};"))
}
