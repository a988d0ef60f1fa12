//! Typed query model for repokit stores.
//!
//! This crate is storage agnostic. It defines:
//! - the filter AST ([`ast::Expr`]) and ordering primitives ([`OrderBy`])
//! - [`Schema`] / [`FieldRef`] for compile-time checked field references
//! - [`QueryBuilder`], which validates fields and value kinds before a query
//!   ever reaches a backend
//! - [`PageRequest`], [`Page`] and [`CursorPage`] result containers
//! - [`Example`] / [`ExampleMatcher`] for probe-based queries
//!
//! Compilation into SQL lives in `repokit-db`.

pub mod builder;
pub mod example;
pub mod kind;
pub mod limits;
pub mod page;
pub mod pagination;
pub mod schema;

pub use builder::QueryBuilder;
pub use example::{Example, ExampleMatcher};
pub use kind::FieldKind;
pub use limits::QueryLimits;
pub use page::{CursorPage, Page, PageInfo, PageRequest};
pub use pagination::{normalize_filter_for_hash, short_filter_hash};
pub use schema::{FieldRef, IntoValue, Schema};

pub mod ast {
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, Utc};

    use crate::schema::IntoValue;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Expr {
        And(Box<Expr>, Box<Expr>),
        Or(Box<Expr>, Box<Expr>),
        Not(Box<Expr>),
        Compare(Box<Expr>, CompareOperator, Box<Expr>),
        In(Box<Expr>, Vec<Expr>),
        Identifier(String),
        Value(Value),
    }

    impl Expr {
        /// `(field, op, value)` predicate on a field addressed by name.
        ///
        /// Names are not checked here; [`crate::QueryBuilder::build`] rejects
        /// the ones its schema does not declare.
        pub fn compare(field: impl Into<String>, op: CompareOperator, value: impl IntoValue) -> Expr {
            Expr::Compare(
                Box::new(Expr::Identifier(field.into())),
                op,
                Box::new(Expr::Value(value.into_value())),
            )
        }

        /// Field-to-field comparison, e.g. `member.age gt member.version`.
        pub fn compare_fields(
            left: impl Into<String>,
            op: CompareOperator,
            right: impl Into<String>,
        ) -> Expr {
            Expr::Compare(
                Box::new(Expr::Identifier(left.into())),
                op,
                Box::new(Expr::Identifier(right.into())),
            )
        }

        /// `field in (v1, v2, ...)`
        pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Expr
        where
            I: IntoIterator<Item = V>,
            V: IntoValue,
        {
            Expr::In(
                Box::new(Expr::Identifier(field.into())),
                values
                    .into_iter()
                    .map(|v| Expr::Value(v.into_value()))
                    .collect(),
            )
        }

        #[must_use]
        pub fn and(self, other: Expr) -> Expr {
            Expr::And(Box::new(self), Box::new(other))
        }

        #[must_use]
        pub fn or(self, other: Expr) -> Expr {
            Expr::Or(Box::new(self), Box::new(other))
        }

        /// Fold a conjunctive list into a single expression.
        ///
        /// Returns `None` for an empty list (match everything).
        pub fn all<I: IntoIterator<Item = Expr>>(parts: I) -> Option<Expr> {
            parts.into_iter().reduce(Expr::and)
        }

        /// Every identifier referenced by this expression, in visit order.
        #[must_use]
        pub fn identifiers(&self) -> Vec<&str> {
            let mut out = Vec::new();
            self.collect_identifiers(&mut out);
            out
        }

        fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
            match self {
                Expr::And(a, b) | Expr::Or(a, b) | Expr::Compare(a, _, b) => {
                    a.collect_identifiers(out);
                    b.collect_identifiers(out);
                }
                Expr::Not(x) => x.collect_identifiers(out),
                Expr::In(x, list) => {
                    x.collect_identifiers(out);
                    for item in list {
                        item.collect_identifiers(out);
                    }
                }
                Expr::Identifier(name) => out.push(name),
                Expr::Value(_) => {}
            }
        }
    }

    impl std::ops::Not for Expr {
        type Output = Expr;

        fn not(self) -> Self::Output {
            Expr::Not(Box::new(self))
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum CompareOperator {
        Eq,
        Ne,
        Gt,
        Ge,
        Lt,
        Le,
    }

    impl CompareOperator {
        #[must_use]
        pub fn as_str(self) -> &'static str {
            match self {
                CompareOperator::Eq => "eq",
                CompareOperator::Ne => "ne",
                CompareOperator::Gt => "gt",
                CompareOperator::Ge => "ge",
                CompareOperator::Lt => "lt",
                CompareOperator::Le => "le",
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Value {
        Null,
        Bool(bool),
        Number(BigDecimal),
        DateTime(DateTime<Utc>),
        String(String),
    }

    impl Value {
        #[must_use]
        pub fn kind_name(&self) -> &'static str {
            match self {
                Value::Null => "null",
                Value::Bool(_) => "bool",
                Value::Number(_) => "number",
                Value::DateTime(_) => "datetime",
                Value::String(_) => "string",
            }
        }
    }

    impl std::fmt::Display for Value {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Value::Null => f.write_str("null"),
                Value::Bool(b) => write!(f, "{b}"),
                Value::Number(n) => write!(f, "{n}"),
                Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
                Value::String(s) => write!(f, "'{s}'"),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub dir: SortDir,
}

impl OrderKey {
    pub fn new(field: impl Into<String>, dir: SortDir) -> Self {
        Self {
            field: field.into(),
            dir,
        }
    }
}

/// Ordered list of sort keys: primary first, then secondary, and so on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct OrderBy(pub Vec<OrderKey>);

/// Parse one `+field` / `-field` / `field` token.
fn parse_signed_token(token: &str) -> Option<OrderKey> {
    let token = token.trim();
    let (dir, name) = if let Some(rest) = token.strip_prefix('-') {
        (SortDir::Desc, rest)
    } else if let Some(rest) = token.strip_prefix('+') {
        (SortDir::Asc, rest)
    } else {
        (SortDir::Asc, token)
    };
    (!name.is_empty()).then(|| OrderKey::new(name, dir))
}

impl OrderBy {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn by(field: impl Into<String>, dir: SortDir) -> Self {
        Self(vec![OrderKey::new(field, dir)])
    }

    pub fn then(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.0.push(OrderKey::new(field, dir));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[OrderKey] {
        &self.0
    }

    /// Render as `+f1,-f2` for the cursor `s` slot.
    #[must_use]
    pub fn to_signed_tokens(&self) -> String {
        let tokens: Vec<String> = self
            .0
            .iter()
            .map(|k| match k.dir {
                SortDir::Asc => format!("+{}", k.field),
                SortDir::Desc => format!("-{}", k.field),
            })
            .collect();
        tokens.join(",")
    }

    /// Parse `+a,-b` back into an order.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` when a token has no field name or the
    /// list is empty.
    pub fn from_signed_tokens(signed: &str) -> Result<Self, Error> {
        let mut keys = Vec::new();
        for raw in signed.split(',').filter(|t| !t.trim().is_empty()) {
            let key = parse_signed_token(raw).ok_or_else(|| Error::InvalidField(raw.to_owned()))?;
            keys.push(key);
        }
        if keys.is_empty() {
            return Err(Error::InvalidField("empty order".to_owned()));
        }
        Ok(Self(keys))
    }

    #[must_use]
    pub fn equals_signed_tokens(&self, signed: &str) -> bool {
        let theirs: Vec<OrderKey> = signed.split(',').filter_map(parse_signed_token).collect();
        theirs == self.0
    }

    /// Append `tiebreaker` unless the order already sorts by it.
    pub fn ensure_tiebreaker(mut self, tiebreaker: &str, dir: SortDir) -> Self {
        if !self.0.iter().any(|k| k.field == tiebreaker) {
            self.0.push(OrderKey::new(tiebreaker, dir));
        }
        self
    }

    pub fn reverse_directions(mut self) -> Self {
        for key in &mut self.0 {
            key.dir = key.dir.reverse();
        }
        self
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(none)");
        }
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let dir = match key.dir {
                SortDir::Asc => "asc",
                SortDir::Desc => "desc",
            };
            write!(f, "{} {dir}", key.field)?;
        }
        Ok(())
    }
}

/// Build-time and cursor errors raised before any store is touched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown field: {0}")]
    InvalidField(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("type mismatch on '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        got: &'static str,
    },

    #[error("INVALID_LIMIT")]
    InvalidLimit,

    #[error("ORDER_MISMATCH")]
    OrderMismatch,

    #[error("FILTER_MISMATCH")]
    FilterMismatch,

    #[error("INVALID_CURSOR")]
    InvalidCursor,

    #[error("invalid cursor: invalid base64url encoding")]
    CursorInvalidBase64,

    #[error("invalid cursor: malformed JSON")]
    CursorInvalidJson,

    #[error("invalid cursor: unsupported version")]
    CursorInvalidVersion,

    #[error("invalid cursor: empty or invalid keys")]
    CursorInvalidKeys,

    #[error("invalid cursor: empty or invalid fields")]
    CursorInvalidFields,
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Check a cursor against the order and filter hash it is replayed with.
///
/// # Errors
/// `OrderMismatch` when the cursor was minted for another order,
/// `FilterMismatch` when it was minted for another filter.
pub fn validate_cursor_against(
    cursor: &CursorV1,
    effective_order: &OrderBy,
    effective_filter_hash: Option<&str>,
) -> Result<(), Error> {
    if !effective_order.equals_signed_tokens(&cursor.s) {
        return Err(Error::OrderMismatch);
    }
    match (effective_filter_hash, cursor.f.as_deref()) {
        (Some(ours), Some(theirs)) if ours != theirs => Err(Error::FilterMismatch),
        _ => Ok(()),
    }
}

/// Which way a cursor walks relative to the display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CursorDirection {
    #[serde(rename = "fwd")]
    Forward,
    #[serde(rename = "bwd")]
    Backward,
}

/// Keyset cursor, version 1.
///
/// `k` holds the encoded key values of the boundary row, `s` the signed order
/// tokens it was produced under and `f` the short filter hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorV1 {
    pub k: Vec<String>,
    pub o: SortDir,
    pub s: String,
    pub f: Option<String>,
    pub d: CursorDirection,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CursorWire {
    v: u8,
    k: Vec<String>,
    o: SortDir,
    s: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    f: Option<String>,
    #[serde(default = "forward")]
    d: CursorDirection,
}

fn forward() -> CursorDirection {
    CursorDirection::Forward
}

impl CursorV1 {
    #[must_use]
    pub fn is_backward(&self) -> bool {
        self.d == CursorDirection::Backward
    }

    /// Encode as an unpadded base64url token.
    ///
    /// # Errors
    /// Returns a JSON serialization error if encoding fails.
    pub fn encode(&self) -> serde_json::Result<String> {
        let wire = CursorWire {
            v: 1,
            k: self.k.clone(),
            o: self.o,
            s: self.s.clone(),
            f: self.f.clone(),
            d: self.d,
        };
        serde_json::to_vec(&wire).map(|bytes| base64_url::encode(&bytes))
    }

    /// Decode a token produced by [`CursorV1::encode`].
    ///
    /// # Errors
    /// One of the `Cursor*` variants of [`Error`] describing what is wrong.
    pub fn decode(token: &str) -> Result<Self, Error> {
        let bytes = base64_url::decode(token).map_err(|_| Error::CursorInvalidBase64)?;
        let wire: CursorWire =
            serde_json::from_slice(&bytes).map_err(|_| Error::CursorInvalidJson)?;
        if wire.v != 1 {
            return Err(Error::CursorInvalidVersion);
        }
        if wire.k.is_empty() {
            return Err(Error::CursorInvalidKeys);
        }
        if wire.s.trim().is_empty() {
            return Err(Error::CursorInvalidFields);
        }
        Ok(Self {
            k: wire.k,
            o: wire.o,
            s: wire.s,
            f: wire.f,
            d: wire.d,
        })
    }
}

mod base64_url {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}

/// A validated query: filter, order, optional projection, limit and cursor.
///
/// Produced by [`QueryBuilder::build`]; consumed by store-side compilers.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct Query {
    pub filter: Option<Box<ast::Expr>>,
    pub order: OrderBy,
    pub limit: Option<u64>,
    pub cursor: Option<CursorV1>,
    pub filter_hash: Option<String>,
    pub select: Option<Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, expr: ast::Expr) -> Self {
        self.filter_hash = short_filter_hash(Some(&expr));
        self.filter = Some(Box::new(expr));
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_cursor(mut self, cursor: CursorV1) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Restrict the output to `fields`. Only projected reads honour it;
    /// entity reads always load whole rows.
    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    #[must_use]
    pub fn filter(&self) -> Option<&ast::Expr> {
        self.filter.as_deref()
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    #[must_use]
    pub fn selected_fields(&self) -> Option<&[String]> {
        self.select.as_deref()
    }
}

impl From<Option<ast::Expr>> for Query {
    fn from(opt: Option<ast::Expr>) -> Self {
        opt.map_or_else(Self::default, |e| Self::default().with_filter(e))
    }
}

#[cfg(test)]
mod tests;
