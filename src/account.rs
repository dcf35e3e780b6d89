//! User accounts and wishlists

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable};
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::catalog::{read_product, require_product};
use crate::database::{
    child_key, next_id, owner_range, TABLE_EMAILS, TABLE_PRODUCTS, TABLE_USERNAMES, TABLE_USERS,
    TABLE_WISHLIST,
};
use crate::error::{AppError, AppResult, AuthError};
use crate::model::{Product, RegisterRequest, User};

fn read_user<T>(table: &T, id: u64) -> AppResult<Option<User>>
where
    T: ReadableTable<u64, &'static str>,
{
    match table.get(id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Creates an account after checking the form and uniqueness
///
/// Username and email are trimmed before validation; emails are compared
/// case-insensitively.
pub fn register(db: &Database, mut req: RegisterRequest) -> AppResult<User> {
    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_lowercase();
    req.validate()?;
    if req.password != req.confirm_password {
        return Err(AppError::validation("Passwords do not match"));
    }

    let username = req.username;
    let email = req.email;
    let password_hash = hash_password(&req.password)?;

    let write_txn = db.begin_write()?;
    let user = {
        let mut usernames = write_txn.open_table(TABLE_USERNAMES)?;
        if usernames.get(username.as_str())?.is_some() {
            return Err(AppError::validation("A user with that username already exists."));
        }
        let mut emails = write_txn.open_table(TABLE_EMAILS)?;
        if emails.get(email.as_str())?.is_some() {
            return Err(AppError::validation("A user with that email already exists."));
        }

        let user = User {
            id: next_id(&write_txn, "users")?,
            username,
            email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            created_at: Utc::now(),
        };
        let record_json = serde_json::to_string(&user)?;

        write_txn
            .open_table(TABLE_USERS)?
            .insert(user.id, record_json.as_str())?;
        usernames.insert(user.username.as_str(), user.id)?;
        emails.insert(user.email.as_str(), user.id)?;
        user
    };
    write_txn.commit()?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Checks a username/password pair
///
/// Unknown usernames and wrong passwords produce the same error.
pub fn authenticate(db: &Database, username: &str, password: &str) -> AppResult<User> {
    let read_txn = db.begin_read()?;
    let usernames = read_txn.open_table(TABLE_USERNAMES)?;
    let Some(id) = usernames.get(username.trim())?.map(|guard| guard.value()) else {
        return Err(AuthError::InvalidCredentials.into());
    };
    let users = read_txn.open_table(TABLE_USERS)?;
    let user = read_user(&users, id)?.ok_or(AuthError::InvalidCredentials)?;

    verify_password(password, &user.password_hash)?;
    Ok(user)
}

/// Loads the user a token points at
///
/// A token for a deleted account is treated as an invalid token.
pub fn get_user(db: &Database, id: u64) -> AppResult<User> {
    let read_txn = db.begin_read()?;
    let users = read_txn.open_table(TABLE_USERS)?;
    read_user(&users, id)?.ok_or_else(|| AuthError::InvalidToken.into())
}

pub fn find_by_username(db: &Database, username: &str) -> AppResult<User> {
    let username = username.trim();
    let read_txn = db.begin_read()?;
    let usernames = read_txn.open_table(TABLE_USERNAMES)?;
    let id = usernames
        .get(username)?
        .map(|guard| guard.value())
        .ok_or_else(|| AppError::not_found(format!("User {username} not found")))?;
    let users = read_txn.open_table(TABLE_USERS)?;
    read_user(&users, id)?.ok_or_else(|| AppError::not_found(format!("User {username} not found")))
}

/// Products on a user's wishlist, ordered by product id
///
/// Entries whose product has since disappeared are skipped.
pub fn wishlist(db: &Database, user_id: u64) -> AppResult<Vec<Product>> {
    let read_txn = db.begin_read()?;
    let entries = read_txn.open_table(TABLE_WISHLIST)?;
    let products = read_txn.open_table(TABLE_PRODUCTS)?;

    let (start, end) = owner_range(user_id);
    let mut result = Vec::new();
    for entry in entries.range(start.as_str()..end.as_str())? {
        let (_, product_id) = entry?;
        if let Some(product) = read_product(&products, product_id.value())? {
            result.push(product);
        }
    }
    Ok(result)
}

/// Adds a product to the wishlist; adding twice is a no-op
pub fn add_to_wishlist(db: &Database, user_id: u64, product_id: &str) -> AppResult<()> {
    let write_txn = db.begin_write()?;
    {
        require_product(&write_txn.open_table(TABLE_PRODUCTS)?, product_id)?;
        let key = child_key(user_id, product_id);
        write_txn
            .open_table(TABLE_WISHLIST)?
            .insert(key.as_str(), product_id)?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Removes a product from the wishlist; removing an absent entry is a no-op
pub fn remove_from_wishlist(db: &Database, user_id: u64, product_id: &str) -> AppResult<()> {
    let write_txn = db.begin_write()?;
    {
        require_product(&write_txn.open_table(TABLE_PRODUCTS)?, product_id)?;
        let key = child_key(user_id, product_id);
        write_txn.open_table(TABLE_WISHLIST)?.remove(key.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}
