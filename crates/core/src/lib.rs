//! `millerp-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, MaterialShortage};
pub use id::AggregateId;
pub use value_object::{Quantity, ValueObject};

pub use rust_decimal::Decimal;
