//! Shopping carts
//!
//! A cart belongs either to a user or to a guest holding an opaque token.
//! Each owner has at most one active cart, tracked in `TABLE_ACTIVE_CARTS`.
//! Every operation resolves (or creates) that cart inside its own write
//! transaction.

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableTable, WriteTransaction};

use crate::catalog::{read_product, require_product};
use crate::database::{
    item_key, next_id, owner_range, TABLE_ACTIVE_CARTS, TABLE_CARTS, TABLE_CART_ITEMS,
    TABLE_PRODUCTS,
};
use crate::error::{AppError, AppResult};
use crate::model::{Cart, CartDetail, CartItem, CartLine};

const GUEST_TOKEN_LEN: usize = 32;

/// Who a cart is resolved for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(u64),
    /// A guest, with the token from a previous response if the client sent one
    Guest(Option<String>),
}

impl CartOwner {
    fn index_key(&self) -> Option<String> {
        match self {
            Self::User(id) => Some(format!("user:{id}")),
            Self::Guest(Some(token)) => Some(format!("guest:{token}")),
            Self::Guest(None) => None,
        }
    }
}

fn read_cart(txn: &WriteTransaction, cart_id: u64) -> AppResult<Option<Cart>> {
    let table = txn.open_table(TABLE_CARTS)?;
    let record = table.get(cart_id)?.map(|guard| guard.value().to_string());
    match record {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

fn save_cart(txn: &WriteTransaction, cart: &Cart) -> AppResult<()> {
    let record_json = serde_json::to_string(cart)?;
    txn.open_table(TABLE_CARTS)?
        .insert(cart.id, record_json.as_str())?;
    Ok(())
}

fn save_item(txn: &WriteTransaction, item: &CartItem) -> AppResult<()> {
    let record_json = serde_json::to_string(item)?;
    let key = item_key(item.cart_id, item.id);
    txn.open_table(TABLE_CART_ITEMS)?
        .insert(key.as_str(), record_json.as_str())?;
    Ok(())
}

/// Returns the owner's active cart, creating one when there is none
///
/// Guests with a missing or stale token get a new cart under a new token.
pub(crate) fn resolve_cart(txn: &WriteTransaction, owner: &CartOwner) -> AppResult<Cart> {
    if let Some(key) = owner.index_key() {
        let cart_id = txn
            .open_table(TABLE_ACTIVE_CARTS)?
            .get(key.as_str())?
            .map(|guard| guard.value());
        if let Some(cart_id) = cart_id {
            if let Some(cart) = read_cart(txn, cart_id)? {
                if cart.is_active {
                    return Ok(cart);
                }
            }
        }
    }

    let (user_id, guest_token) = match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Guest(_) => (
            None,
            Some(
                rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(GUEST_TOKEN_LEN)
                    .map(char::from)
                    .collect::<String>(),
            ),
        ),
    };

    let now = Utc::now();
    let cart = Cart {
        id: next_id(txn, "carts")?,
        user_id,
        guest_token,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    save_cart(txn, &cart)?;

    let index_key = active_key(&cart);
    txn.open_table(TABLE_ACTIVE_CARTS)?
        .insert(index_key.as_str(), cart.id)?;

    tracing::debug!(cart_id = cart.id, user_id = ?cart.user_id, "cart created");
    Ok(cart)
}

/// Key of the cart in `TABLE_ACTIVE_CARTS`, matching [`CartOwner::index_key`]
fn active_key(cart: &Cart) -> String {
    match (&cart.guest_token, cart.user_id) {
        (Some(token), _) => format!("guest:{token}"),
        (None, Some(user_id)) => format!("user:{user_id}"),
        (None, None) => format!("cart:{}", cart.id),
    }
}

fn cart_items(txn: &WriteTransaction, cart_id: u64) -> AppResult<Vec<CartItem>> {
    let table = txn.open_table(TABLE_CART_ITEMS)?;
    let (start, end) = owner_range(cart_id);

    let mut items = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (_, value) = entry?;
        items.push(serde_json::from_str(value.value())?);
    }
    Ok(items)
}

/// Joins the cart's items with their current products
///
/// Items whose product no longer exists are left out.
pub(crate) fn load_detail(txn: &WriteTransaction, cart: Cart) -> AppResult<CartDetail> {
    let items = cart_items(txn, cart.id)?;
    let products = txn.open_table(TABLE_PRODUCTS)?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        if let Some(product) = read_product(&products, &item.product_id)? {
            lines.push(CartLine { item, product });
        }
    }
    Ok(CartDetail { cart, lines })
}

/// Marks the cart inactive so the owner's next request starts a new one
pub(crate) fn deactivate(txn: &WriteTransaction, cart: &mut Cart) -> AppResult<()> {
    cart.is_active = false;
    cart.updated_at = Utc::now();
    save_cart(txn, cart)?;

    let key = active_key(cart);
    txn.open_table(TABLE_ACTIVE_CARTS)?.remove(key.as_str())?;
    Ok(())
}

fn touch(txn: &WriteTransaction, cart: &mut Cart) -> AppResult<()> {
    cart.updated_at = Utc::now();
    save_cart(txn, cart)
}

fn find_item(txn: &WriteTransaction, cart_id: u64, item_id: u64) -> AppResult<CartItem> {
    let key = item_key(cart_id, item_id);
    let record = txn
        .open_table(TABLE_CART_ITEMS)?
        .get(key.as_str())?
        .map(|guard| guard.value().to_string());
    match record {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Err(AppError::not_found("Item not found in cart")),
    }
}

/// Runs `op` against the owner's cart and commits
fn with_cart<F>(db: &Database, owner: &CartOwner, op: F) -> AppResult<CartDetail>
where
    F: FnOnce(&WriteTransaction, &mut Cart) -> AppResult<()>,
{
    let write_txn = db.begin_write()?;
    let mut cart = resolve_cart(&write_txn, owner)?;
    op(&write_txn, &mut cart)?;
    let detail = load_detail(&write_txn, cart)?;
    write_txn.commit()?;
    Ok(detail)
}

/// The owner's current cart, created on first use
pub fn current_cart(db: &Database, owner: &CartOwner) -> AppResult<CartDetail> {
    with_cart(db, owner, |_, _| Ok(()))
}

/// Adds `quantity` of a product, merging with an existing line for it
pub fn add_item(
    db: &Database,
    owner: &CartOwner,
    product_id: &str,
    quantity: i64,
) -> AppResult<CartDetail> {
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::validation("Quantity must be at least 1"))?;

    with_cart(db, owner, |txn, cart| {
        require_product(&txn.open_table(TABLE_PRODUCTS)?, product_id)?;
        let now = Utc::now();

        let existing = cart_items(txn, cart.id)?
            .into_iter()
            .find(|item| item.product_id == product_id);

        let item = match existing {
            Some(mut item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| AppError::validation("Quantity is too large"))?;
                item.updated_at = now;
                item
            }
            None => CartItem {
                id: next_id(txn, "cart_items")?,
                cart_id: cart.id,
                product_id: product_id.to_string(),
                quantity,
                created_at: now,
                updated_at: now,
            },
        };
        save_item(txn, &item)?;
        touch(txn, cart)
    })
}

/// Removes one line from the cart
pub fn remove_item(db: &Database, owner: &CartOwner, item_id: u64) -> AppResult<CartDetail> {
    with_cart(db, owner, |txn, cart| {
        let item = find_item(txn, cart.id, item_id)?;
        let key = item_key(item.cart_id, item.id);
        txn.open_table(TABLE_CART_ITEMS)?.remove(key.as_str())?;
        touch(txn, cart)
    })
}

/// Sets the quantity of one line; quantities below 1 are rejected
pub fn update_quantity(
    db: &Database,
    owner: &CartOwner,
    item_id: u64,
    quantity: i64,
) -> AppResult<CartDetail> {
    let quantity = u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::validation("Quantity must be at least 1"))?;

    with_cart(db, owner, |txn, cart| {
        let mut item = find_item(txn, cart.id, item_id)?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        save_item(txn, &item)?;
        touch(txn, cart)
    })
}
