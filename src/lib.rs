//! Storefront backend: catalog, accounts, wishlists, carts and checkout over
//! an embedded redb database.

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod order;
pub mod route;
pub mod serializer;
