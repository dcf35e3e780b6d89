//! Orders and checkout
//!
//! Checkout turns a list of `(product, quantity)` pairs into an order inside
//! a single redb write transaction:
//!
//! 1. every product is resolved, unknown ids abort with 404
//! 2. stock is decremented, refusing to go below zero
//! 3. name and price are snapshotted into order items
//! 4. totals are computed from the snapshots plus the shipping fee
//!
//! redb admits one writer at a time, so two checkouts for the same product
//! cannot both pass the stock check.

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use validator::Validate;

use crate::auth::AuthUser;
use crate::cart::{self, CartOwner};
use crate::catalog::{read_product, require_product};
use crate::database::{
    item_key, next_id, owner_range, TABLE_ORDERS, TABLE_ORDER_ITEMS, TABLE_PRODUCTS,
    TABLE_USER_ORDERS,
};
use crate::error::{AppError, AppResult};
use crate::model::{
    shipping_fee, CheckoutItemRequest, CheckoutRequest, Order, OrderContact, OrderDetail,
    OrderItem, OrderStatus, CASH_ON_DELIVERY,
};

/// A validated checkout line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: u32,
}

/// Rejects empty lists and lines missing a product or a positive quantity
pub fn validate_lines(items: &[CheckoutItemRequest]) -> AppResult<Vec<LineRequest>> {
    if items.is_empty() {
        return Err(AppError::validation("No items provided"));
    }

    items
        .iter()
        .map(|item| match (&item.product_id, item.quantity) {
            (Some(product_id), Some(quantity)) if !product_id.is_empty() => {
                if quantity == 0 {
                    return Err(AppError::validation("Quantity must be at least 1"));
                }
                Ok(LineRequest {
                    product_id: product_id.clone(),
                    quantity,
                })
            }
            _ => Err(AppError::validation(
                "Each item requires a product_id and a quantity",
            )),
        })
        .collect()
}

/// Status of a freshly placed order
///
/// There is no payment gateway: anything but cash on delivery counts as paid.
fn initial_status(payment_method: &str) -> OrderStatus {
    if payment_method == CASH_ON_DELIVERY {
        OrderStatus::Pending
    } else {
        OrderStatus::Paid
    }
}

/// Writes the order, its items and the stock changes into `txn`
fn place_order(
    txn: &WriteTransaction,
    user_id: Option<u64>,
    contact: OrderContact,
    lines: &[LineRequest],
) -> AppResult<OrderDetail> {
    let now = Utc::now();
    let order_id = next_id(txn, "orders")?;

    let mut items = Vec::with_capacity(lines.len());
    {
        let mut products = txn.open_table(TABLE_PRODUCTS)?;
        for line in lines {
            let mut product = require_product(&products, &line.product_id)?;
            if product.stock < line.quantity {
                return Err(AppError::validation(format!(
                    "Insufficient stock for product {}: {} available",
                    product.product_id, product.stock
                )));
            }
            product.stock -= line.quantity;
            let record_json = serde_json::to_string(&product)?;
            products.insert(product.product_id.as_str(), record_json.as_str())?;

            items.push(OrderItem {
                id: next_id(txn, "order_items")?,
                order_id,
                product_name: product.display_name(),
                product_id: Some(product.product_id),
                quantity: line.quantity,
                price: product.price,
                created_at: now,
            });
        }
    }

    let subtotal: Decimal = items.iter().map(OrderItem::subtotal).sum();
    let fee = shipping_fee(&contact.shipping_method);
    let order = Order {
        id: order_id,
        user_id,
        status: initial_status(&contact.payment_method),
        contact,
        subtotal,
        shipping_fee: fee,
        total_amount: subtotal + fee,
        created_at: now,
        updated_at: now,
    };

    save_order(txn, &order)?;
    {
        let mut table = txn.open_table(TABLE_ORDER_ITEMS)?;
        for item in &items {
            let record_json = serde_json::to_string(item)?;
            let key = item_key(order_id, item.id);
            table.insert(key.as_str(), record_json.as_str())?;
        }
    }
    if let Some(user_id) = user_id {
        let key = item_key(user_id, order_id);
        txn.open_table(TABLE_USER_ORDERS)?
            .insert(key.as_str(), order_id)?;
    }

    Ok(OrderDetail { order, items })
}

fn save_order(txn: &WriteTransaction, order: &Order) -> AppResult<()> {
    let record_json = serde_json::to_string(order)?;
    txn.open_table(TABLE_ORDERS)?
        .insert(order.id, record_json.as_str())?;
    Ok(())
}

/// Commits `txn` when `result` is Ok, aborts it otherwise
fn finish<T>(txn: WriteTransaction, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = txn.abort() {
                tracing::error!(error = %abort_err, "failed to abort transaction");
            }
            Err(err)
        }
    }
}

/// Places an order from an explicit item list
///
/// `owner` is `None` for guest checkout.
pub fn checkout(
    db: &Database,
    owner: Option<&AuthUser>,
    req: CheckoutRequest,
) -> AppResult<OrderDetail> {
    req.contact.validate()?;
    let lines = validate_lines(&req.items)?;
    let user_id = owner.map(|user| user.id);

    let write_txn = db.begin_write()?;
    let result = place_order(&write_txn, user_id, req.contact, &lines);
    let detail = finish(write_txn, result)?;

    tracing::info!(
        order_id = detail.order.id,
        user_id = ?user_id,
        items = detail.items.len(),
        total = %detail.order.total_amount,
        status = detail.order.status.as_str(),
        "order placed"
    );
    Ok(detail)
}

/// Places an order from the owner's current cart and closes that cart
pub fn checkout_cart(
    db: &Database,
    cart_owner: &CartOwner,
    owner: Option<&AuthUser>,
    contact: OrderContact,
) -> AppResult<OrderDetail> {
    contact.validate()?;
    let user_id = owner.map(|user| user.id);

    let write_txn = db.begin_write()?;
    let result = (|| -> AppResult<OrderDetail> {
        let mut current = cart::resolve_cart(&write_txn, cart_owner)?;
        let detail = cart::load_detail(&write_txn, current.clone())?;
        let items: Vec<CheckoutItemRequest> = detail
            .lines
            .iter()
            .map(|line| CheckoutItemRequest {
                product_id: Some(line.item.product_id.clone()),
                quantity: Some(line.item.quantity),
            })
            .collect();
        let lines = validate_lines(&items)?;

        let placed = place_order(&write_txn, user_id, contact, &lines)?;
        cart::deactivate(&write_txn, &mut current)?;
        Ok(placed)
    })();
    let detail = finish(write_txn, result)?;

    tracing::info!(
        order_id = detail.order.id,
        user_id = ?user_id,
        total = %detail.order.total_amount,
        "cart checked out"
    );
    Ok(detail)
}

fn read_order<T>(table: &T, order_id: u64) -> AppResult<Option<Order>>
where
    T: ReadableTable<u64, &'static str>,
{
    match table.get(order_id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

fn read_items<T>(table: &T, order_id: u64) -> AppResult<Vec<OrderItem>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    let (start, end) = owner_range(order_id);
    let mut items = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (_, value) = entry?;
        items.push(serde_json::from_str(value.value())?);
    }
    Ok(items)
}

/// The user's orders, newest first
pub fn list_orders(db: &Database, user_id: u64) -> AppResult<Vec<OrderDetail>> {
    let read_txn = db.begin_read()?;
    let index = read_txn.open_table(TABLE_USER_ORDERS)?;
    let orders = read_txn.open_table(TABLE_ORDERS)?;
    let order_items = read_txn.open_table(TABLE_ORDER_ITEMS)?;

    let (start, end) = owner_range(user_id);
    let mut result = Vec::new();
    for entry in index.range(start.as_str()..end.as_str())?.rev() {
        let (_, order_id) = entry?;
        let order_id = order_id.value();
        if let Some(order) = read_order(&orders, order_id)? {
            let items = read_items(&order_items, order_id)?;
            result.push(OrderDetail { order, items });
        }
    }
    Ok(result)
}

/// One of the user's orders; other users' orders are reported as missing
pub fn get_order(db: &Database, user_id: u64, order_id: u64) -> AppResult<OrderDetail> {
    let read_txn = db.begin_read()?;
    let orders = read_txn.open_table(TABLE_ORDERS)?;
    let order = read_order(&orders, order_id)?
        .filter(|order| order.user_id == Some(user_id))
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;
    let items = read_items(&read_txn.open_table(TABLE_ORDER_ITEMS)?, order_id)?;
    Ok(OrderDetail { order, items })
}

/// Cancels one of the user's orders and puts its stock back
///
/// Items whose product has been removed from the catalog are not restocked.
pub fn cancel_order(db: &Database, user_id: u64, order_id: u64) -> AppResult<OrderDetail> {
    let write_txn = db.begin_write()?;
    let result = (|| -> AppResult<OrderDetail> {
        let mut order = read_order(&write_txn.open_table(TABLE_ORDERS)?, order_id)?
            .filter(|order| order.user_id == Some(user_id))
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(AppError::validation(format!(
                "Order {order_id} is {} and can no longer be cancelled",
                order.status.as_str()
            )));
        }

        let items = read_items(&write_txn.open_table(TABLE_ORDER_ITEMS)?, order_id)?;
        {
            let mut products = write_txn.open_table(TABLE_PRODUCTS)?;
            for item in &items {
                let Some(product_id) = item.product_id.as_deref() else {
                    continue;
                };
                let Some(mut product) = read_product(&products, product_id)? else {
                    continue;
                };
                product.stock = product.stock.saturating_add(item.quantity);
                let record_json = serde_json::to_string(&product)?;
                products.insert(product_id, record_json.as_str())?;
            }
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        save_order(&write_txn, &order)?;
        Ok(OrderDetail { order, items })
    })();
    let detail = finish(write_txn, result)?;

    tracing::info!(order_id, user_id, "order cancelled");
    Ok(detail)
}

/// Every order line that references `product_id`, oldest first
pub fn items_for_product(db: &Database, product_id: &str) -> AppResult<Vec<OrderItem>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_ORDER_ITEMS)?;

    let mut items = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let item: OrderItem = serde_json::from_str(value.value())?;
        if item.product_id.as_deref() == Some(product_id) {
            items.push(item);
        }
    }
    Ok(items)
}
