//! Safety caps applied while building queries.

use crate::Error;
use crate::ast::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Largest page or cursor limit a query may ask for (default: 1000).
    pub max_page_size: u64,
    /// Maximum number of sort keys (default: 5).
    pub max_order_fields: usize,
    /// Maximum number of literals in one `in` list (default: 1000).
    pub max_in_list: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_page_size: 1000,
            max_order_fields: 5,
            max_in_list: 1000,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_page_size(mut self, max: u64) -> Self {
        self.max_page_size = max;
        self
    }

    #[must_use]
    pub fn with_max_order_fields(mut self, max: usize) -> Self {
        self.max_order_fields = max;
        self
    }

    #[must_use]
    pub fn with_max_in_list(mut self, max: usize) -> Self {
        self.max_in_list = max;
        self
    }

    /// # Errors
    /// `InvalidLimit` for zero or anything above `max_page_size`.
    pub fn validate_limit(&self, limit: u64) -> Result<(), Error> {
        if limit == 0 || limit > self.max_page_size {
            return Err(Error::InvalidLimit);
        }
        Ok(())
    }

    /// # Errors
    /// `InvalidArgument` when there are more sort keys than allowed.
    pub fn validate_order_count(&self, count: usize) -> Result<(), Error> {
        if count > self.max_order_fields {
            return Err(Error::invalid_argument(format!(
                "too many order fields: {count} (max: {})",
                self.max_order_fields
            )));
        }
        Ok(())
    }

    /// # Errors
    /// `InvalidArgument` when any `in` list is longer than allowed.
    pub fn validate_in_lists(&self, expr: &Expr) -> Result<(), Error> {
        match expr {
            Expr::And(a, b) | Expr::Or(a, b) => {
                self.validate_in_lists(a)?;
                self.validate_in_lists(b)
            }
            Expr::Not(x) => self.validate_in_lists(x),
            Expr::In(_, list) if list.len() > self.max_in_list => {
                Err(Error::invalid_argument(format!(
                    "IN list too long: {} (max: {})",
                    list.len(),
                    self.max_in_list
                )))
            }
            _ => Ok(()),
        }
    }
}
