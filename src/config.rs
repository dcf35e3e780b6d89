//! Runtime configuration read from the environment
//!
//! Variables (a `.env` file is loaded first when present):
//!
//! - `PORT` - Server port number (default: 8080)
//! - `DATABASE_URL` - Path to the redb database file (default: "data.db")
//! - `JWT_SECRET` - HMAC key used to sign login tokens
//! - `TOKEN_TTL_HOURS` - Token lifetime in hours, 1 to 8760 (default: 24)
//! - `PRODUCT_SEED` - Optional JSON file of products loaded at startup

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use rand::{distr::Alphanumeric, Rng};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE: &str = "data.db";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// One year
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub product_seed: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET is not set; tokens will not survive a restart");
                rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect()
            }
        };

        Self {
            port: parse_or("PORT", DEFAULT_PORT),
            database_path: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE.to_string()),
            jwt_secret,
            token_ttl_hours: token_ttl_or_default(parse_or(
                "TOKEN_TTL_HOURS",
                DEFAULT_TOKEN_TTL_HOURS,
            )),
            product_seed: env::var_os("PRODUCT_SEED").map(PathBuf::from),
        }
    }
}

/// Keeps the token lifetime within 1 hour and [`MAX_TOKEN_TTL_HOURS`]
fn token_ttl_or_default(hours: i64) -> i64 {
    if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        hours
    } else {
        tracing::warn!(
            value = hours,
            fallback = DEFAULT_TOKEN_TTL_HOURS,
            "TOKEN_TTL_HOURS out of range"
        );
        DEFAULT_TOKEN_TTL_HOURS
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, fallback = %default, "unparseable setting");
            default
        }),
        Err(_) => default,
    }
}
