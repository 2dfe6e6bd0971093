//! # Validation Module
//!
//! Input validation for Stockpile entities.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Route handler                                                │
//! │  └── Deserialization into NewProduct / NewSale / NewExpense            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository (stockpile-db)                                    │
//! │  └── THIS MODULE: field rules, checked before any statement runs       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / FOREIGN KEY constraints                       │
//! │  └── CHECK (role IN (...)), CHECK (payment_mode IN (...))              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockpile_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("SKU001").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{NewExpense, NewProduct};
use crate::MAX_SALE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use stockpile_core::validation::validate_sku;
///
/// assert!(validate_sku("SKU001").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product name, expense category).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a username.
///
/// ## Rules
/// - 3 to 32 characters
/// - Letters, numbers, dots, hyphens, underscores
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 32,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity sold.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_SALE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_SALE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_SALE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount.
///
/// ## Rules
/// - Must be finite (no NaN / infinity)
/// - Must be non-negative; zero is allowed (free items)
///
/// ## Example
/// ```rust
/// use stockpile_core::validation::validate_amount;
///
/// assert!(validate_amount("price", 10.99).is_ok());
/// assert!(validate_amount("price", 0.0).is_ok());
/// assert!(validate_amount("price", -1.0).is_err());
/// assert!(validate_amount("price", f64::NAN).is_err());
/// ```
pub fn validate_amount(field: &str, amount: f64) -> ValidationResult<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ValidationError::InvalidAmount {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates every field of a new product.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_sku(&product.sku)?;
    validate_name("name", &product.name)?;
    validate_amount("price", product.price)?;
    validate_amount("cost", product.cost)?;

    if product.quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if product.reorder_level < 0 {
        return Err(ValidationError::OutOfRange {
            field: "reorder_level".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates every field of a new expense.
pub fn validate_new_expense(expense: &NewExpense) -> ValidationResult<()> {
    validate_name("category", &expense.category)?;
    validate_amount("amount", expense.amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMode;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("SKU001").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("jane.doe").is_ok());

        assert!(validate_username("ab").is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username(&"u".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_SALE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_SALE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_new_product() {
        let mut product = NewProduct {
            sku: "SKU010".to_string(),
            name: "Stapler".to_string(),
            category: Some("Stationery".to_string()),
            price: 7.5,
            cost: 4.0,
            quantity: 12,
            reorder_level: 3,
        };
        assert!(validate_new_product(&product).is_ok());

        product.price = f64::INFINITY;
        assert_eq!(
            validate_new_product(&product),
            Err(ValidationError::InvalidAmount {
                field: "price".to_string()
            })
        );

        product.price = 7.5;
        product.quantity = -1;
        assert!(validate_new_product(&product).is_err());
    }

    #[test]
    fn test_validate_new_expense() {
        let expense = NewExpense {
            category: " ".to_string(),
            description: None,
            amount: 20.0,
            payment_mode: PaymentMode::Cash,
            recorded_by: None,
        };
        assert!(validate_new_expense(&expense).is_err());
    }
}
