//! Builders for creating test data.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::order::{CustomerSnapshot, NewOrder, OrderItem};
use crate::types::{Actor, CustomerEmail, Money, Note, ProductId, Quantity, Timestamp};

/// Builder for [`NewOrder`] values.
///
/// Starts with a valid customer and no items; [`NewOrderBuilder::build`]
/// adds a default line when none was given.
///
/// # Example
/// ```rust,ignore
/// let order = NewOrderBuilder::new()
///     .customer_email("grace@example.com")
///     .item("sku-1", "Mug", "12.50", 2)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct NewOrderBuilder {
    customer: CustomerSnapshot,
    items: Vec<OrderItem>,
    estimated_delivery: Option<Timestamp>,
    note: Option<Note>,
    actor: Actor,
}

impl NewOrderBuilder {
    /// Creates a builder with a default customer.
    pub fn new() -> Self {
        Self {
            customer: CustomerSnapshot {
                name: "Test Customer".to_string(),
                email: CustomerEmail::try_new("customer@example.com")
                    .expect("fixture email is valid"),
                phone: Some("+1 555 0100".to_string()),
                city: Some("Springfield".to_string()),
                address: Some("742 Evergreen Terrace".to_string()),
            },
            items: Vec::new(),
            estimated_delivery: None,
            note: None,
            actor: Actor::System,
        }
    }

    /// Sets the customer name.
    #[must_use]
    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = name.into();
        self
    }

    /// Sets the customer email.
    ///
    /// # Panics
    /// Panics if the email is invalid.
    #[must_use]
    pub fn customer_email(mut self, email: &str) -> Self {
        self.customer.email = CustomerEmail::try_new(email).expect("valid test email");
        self
    }

    /// Adds an order line. `price` is a decimal string such as `"12.50"`.
    ///
    /// # Panics
    /// Panics if any value is invalid.
    #[must_use]
    pub fn item(mut self, product_id: &str, name: &str, price: &str, quantity: u32) -> Self {
        let amount = Decimal::from_str(price).expect("valid test price");
        self.items.push(OrderItem {
            product_id: ProductId::try_new(product_id).expect("valid test product id"),
            name: name.to_string(),
            price: Money::new(amount).expect("valid test money"),
            quantity: Quantity::try_new(quantity).expect("valid test quantity"),
            image: None,
        });
        self
    }

    /// Sets the estimate known at checkout.
    #[must_use]
    pub const fn estimated_delivery(mut self, estimate: Timestamp) -> Self {
        self.estimated_delivery = Some(estimate);
        self
    }

    /// Sets the note of the initial event.
    ///
    /// # Panics
    /// Panics if the note is blank or too long.
    #[must_use]
    pub fn note(mut self, note: &str) -> Self {
        self.note = Some(Note::try_new(note).expect("valid test note"));
        self
    }

    /// Sets who placed the order.
    #[must_use]
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    /// Builds the order request.
    pub fn build(self) -> NewOrder {
        let builder = if self.items.is_empty() {
            self.item("sku-default", "Default item", "10.00", 1)
        } else {
            self
        };
        NewOrder {
            customer: builder.customer,
            items: builder.items,
            estimated_delivery: builder.estimated_delivery,
            note: builder.note,
            actor: builder.actor,
        }
    }

    /// Builds an order request with no items, for negative tests.
    pub fn build_empty(self) -> NewOrder {
        NewOrder {
            customer: self.customer,
            items: Vec::new(),
            estimated_delivery: self.estimated_delivery,
            note: self.note,
            actor: self.actor,
        }
    }
}

impl Default for NewOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
