//! JSON shapes returned by the API
//!
//! Each entity has one mapping function so the wire format can be checked
//! without going through HTTP. Decimals are rendered as strings.

use serde_json::{json, Value};

use crate::catalog::Summary;
use crate::model::{CartDetail, CartLine, OrderDetail, OrderItem, Product, User};

pub fn product(product: &Product) -> Value {
    json!({
        "product_id": product.product_id,
        "product_name": product.product_name,
        "price": product.price,
        "stock": product.stock,
        "category": product.category,
        "is_new_release": product.is_new_release,
        "is_trending": product.is_trending,
        "rating": product.rating,
        "description": product.description,
        "detail": product.detail,
        "eco_point": product.eco_point,
        "img_url": product.img_url,
    })
}

/// Compact product entry used in wishlists
pub fn wishlist_entry(product: &Product) -> Value {
    json!({
        "product_id": product.product_id,
        "product_name": product.product_name,
        "price": product.price,
        "img_url": product.img_url,
    })
}

/// User block of the login response
pub fn login_user(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
    })
}

/// The caller's own profile; `wishlist` lists product ids
pub fn profile(user: &User, wishlist: &[Product]) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "phone_number": user.phone_number,
        "created_at": user.created_at,
        "wishlist": wishlist.iter().map(|p| p.product_id.as_str()).collect::<Vec<_>>(),
    })
}

/// Public view of a user by username
pub fn user_info(user: &User, wishlist: &[Product]) -> Value {
    json!({
        "username": user.username,
        "email": user.email,
        "created_at": user.created_at.format("%d-%m-%Y").to_string(),
        "wishlist": wishlist
            .iter()
            .map(|p| json!({
                "product_id": p.product_id,
                "product_name": p.product_name,
                "price": p.price,
            }))
            .collect::<Vec<_>>(),
    })
}

fn cart_line(line: &CartLine) -> Value {
    json!({
        "id": line.item.id,
        "cart": line.item.cart_id,
        "product": product(&line.product),
        "quantity": line.item.quantity,
        "subtotal": line.subtotal(),
        "created_at": line.item.created_at,
    })
}

/// A cart with totals; guest carts also carry the token to send back
pub fn cart(detail: &CartDetail) -> Value {
    let mut value = json!({
        "id": detail.cart.id,
        "user": detail.cart.user_id,
        "items": detail.lines.iter().map(cart_line).collect::<Vec<_>>(),
        "total_price": detail.total_price(),
        "total_items": detail.total_items(),
        "created_at": detail.cart.created_at,
        "updated_at": detail.cart.updated_at,
    });
    if let (Some(token), Some(map)) = (&detail.cart.guest_token, value.as_object_mut()) {
        map.insert("cart_token".to_string(), json!(token));
    }
    value
}

pub fn order_item(item: &OrderItem) -> Value {
    json!({
        "id": item.id,
        "order": item.order_id,
        "product_id": item.product_id,
        "product_name": item.product_name,
        "quantity": item.quantity,
        "price": item.price,
        "subtotal": item.subtotal(),
        "created_at": item.created_at,
    })
}

pub fn order(detail: &OrderDetail) -> Value {
    let order = &detail.order;
    let contact = &order.contact;
    json!({
        "id": order.id,
        "user": order.user_id,
        "email": contact.email,
        "first_name": contact.first_name,
        "last_name": contact.last_name,
        "phone_number": contact.phone_number,
        "address": contact.address,
        "province": contact.province,
        "district": contact.district,
        "sub_district": contact.sub_district,
        "postal_code": contact.postal_code,
        "note": contact.note,
        "status": order.status,
        "shipping_method": contact.shipping_method,
        "payment_method": contact.payment_method,
        "subtotal": order.subtotal,
        "shipping_fee": order.shipping_fee,
        "total_amount": order.total_amount,
        "grand_total": order.total_amount,
        "created_at": order.created_at,
        "updated_at": order.updated_at,
        "items": detail.items.iter().map(order_item).collect::<Vec<_>>(),
    })
}

pub fn summary(summary: &Summary) -> Value {
    json!({
        "total_users": summary.total_users,
        "total_products": summary.total_products,
        "total_orders": summary.total_orders,
    })
}
