//! Product catalog storage

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata};
use rust_decimal::Decimal;

use crate::database::{TABLE_ORDERS, TABLE_PRODUCTS, TABLE_USERS};
use crate::error::{AppError, AppResult};
use crate::model::Product;

/// Reads one product from any products table handle
pub(crate) fn read_product<T>(table: &T, product_id: &str) -> AppResult<Option<Product>>
where
    T: ReadableTable<&'static str, &'static str>,
{
    match table.get(product_id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Like [`read_product`] but unknown ids are a not-found error
pub(crate) fn require_product<T>(table: &T, product_id: &str) -> AppResult<Product>
where
    T: ReadableTable<&'static str, &'static str>,
{
    read_product(table, product_id)?
        .ok_or_else(|| AppError::not_found(format!("Product {product_id} not found")))
}

pub fn list_products(db: &Database) -> AppResult<Vec<Product>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_PRODUCTS)?;

    let mut products = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        products.push(serde_json::from_str(value.value())?);
    }
    Ok(products)
}

pub fn get_product(db: &Database, product_id: &str) -> AppResult<Product> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_PRODUCTS)?;
    require_product(&table, product_id)
}

/// Prices are stored with 10 significant digits, 2 of them decimals
const PRICE_DECIMAL_PLACES: u32 = 2;

/// eco_point has 3 digits
const MAX_ECO_POINT: u32 = 999;

fn max_price() -> Decimal {
    Decimal::new(100_000_000, 0)
}

/// Inserts or replaces a product
///
/// Prices are bounded so that order and cart totals cannot overflow.
///
/// Used by the startup seed; there is no HTTP surface for catalog edits.
pub fn upsert_product(db: &Database, product: &Product) -> AppResult<()> {
    if product.product_id.is_empty() {
        return Err(AppError::validation("product_id is required"));
    }
    if product.price.is_sign_negative() {
        return Err(AppError::validation(format!(
            "Product {} has a negative price",
            product.product_id
        )));
    }
    if product.price.scale() > PRICE_DECIMAL_PLACES || product.price >= max_price() {
        return Err(AppError::validation(format!(
            "Product {} price must be below 100000000 with at most 2 decimal places",
            product.product_id
        )));
    }
    if product.eco_point > MAX_ECO_POINT {
        return Err(AppError::validation(format!(
            "Product {} eco_point must be at most {MAX_ECO_POINT}",
            product.product_id
        )));
    }
    if product.rating > 5 {
        return Err(AppError::validation(format!(
            "Product {} rating must be between 0 and 5",
            product.product_id
        )));
    }

    let record_json = serde_json::to_string(product)?;
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_PRODUCTS)?;
        table.insert(product.product_id.as_str(), record_json.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}

/// Record counts shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Summary {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
}

pub fn summarize(db: &Database) -> AppResult<Summary> {
    let read_txn = db.begin_read()?;
    Ok(Summary {
        total_users: read_txn.open_table(TABLE_USERS)?.len()?,
        total_products: read_txn.open_table(TABLE_PRODUCTS)?.len()?,
        total_orders: read_txn.open_table(TABLE_ORDERS)?.len()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use rust_decimal::Decimal;
    use tempfile::NamedTempFile;

    fn product(id: &str, price: Decimal) -> Product {
        Product {
            product_id: id.to_string(),
            product_name: Some(format!("Product {id}")),
            price,
            stock: 5,
            category: None,
            is_new_release: false,
            is_trending: true,
            rating: 4,
            description: None,
            detail: None,
            eco_point: 0,
            img_url: None,
        }
    }

    #[test]
    fn upsert_then_read_back() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

        upsert_product(&db, &product("P1", Decimal::new(1000, 2))).unwrap();
        upsert_product(&db, &product("P2", Decimal::new(250, 2))).unwrap();

        let fetched = get_product(&db, "P1").unwrap();
        assert_eq!(fetched.price, Decimal::new(10, 0));
        assert_eq!(list_products(&db).unwrap().len(), 2);
        assert_eq!(summarize(&db).unwrap().total_products, 2);
    }

    #[test]
    fn unknown_product_is_not_found() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
        assert!(matches!(get_product(&db, "nope"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn price_precision_is_bounded() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

        let err = upsert_product(&db, &product("P1", Decimal::new(10005, 3))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = upsert_product(&db, &product("P1", Decimal::MAX)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = upsert_product(&db, &product("P1", Decimal::new(100_000_000, 0))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        upsert_product(&db, &product("P1", Decimal::new(9_999_999_999, 2))).unwrap();
        assert!(get_product(&db, "P1").is_ok());
    }

    #[test]
    fn eco_point_is_capped() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

        let mut too_green = product("P1", Decimal::new(100, 2));
        too_green.eco_point = 1000;
        let err = upsert_product(&db, &too_green).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        too_green.eco_point = 999;
        upsert_product(&db, &too_green).unwrap();
    }

    #[test]
    fn negative_price_is_rejected() {
        let temp_db = NamedTempFile::new().unwrap();
        let db = init_db(temp_db.path().to_str().unwrap()).unwrap();
        let err = upsert_product(&db, &product("P1", Decimal::new(-1, 0))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
