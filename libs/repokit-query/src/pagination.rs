//! Stable filter hashing used to bind cursors to the filter that minted them.

use sha2::{Digest, Sha256};

use crate::ast::Expr;

/// Canonical text form of a filter.
///
/// Field names are lower-cased and literals carry their kind so that
/// `age eq 10` and `age eq '10'` never collide.
#[must_use]
pub fn normalize_filter_for_hash(expr: &Expr) -> String {
    let mut out = String::new();
    write_normalized(expr, &mut out);
    out
}

fn write_normalized(expr: &Expr, out: &mut String) {
    match expr {
        Expr::And(a, b) | Expr::Or(a, b) => {
            let op = if matches!(expr, Expr::And(..)) { "and" } else { "or" };
            out.push('(');
            write_normalized(a, out);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            write_normalized(b, out);
            out.push(')');
        }
        Expr::Not(x) => {
            out.push_str("(not ");
            write_normalized(x, out);
            out.push(')');
        }
        Expr::Compare(l, op, r) => {
            out.push('(');
            write_normalized(l, out);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_normalized(r, out);
            out.push(')');
        }
        Expr::In(l, list) => {
            out.push('(');
            write_normalized(l, out);
            out.push_str(" in [");
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_normalized(item, out);
            }
            out.push_str("])");
        }
        Expr::Identifier(name) => out.push_str(&name.to_ascii_lowercase()),
        Expr::Value(v) => {
            out.push_str(v.kind_name());
            out.push(':');
            out.push_str(&v.to_string());
        }
    }
}

/// First 16 hex chars of the SHA-256 of the normalized filter.
#[must_use]
pub fn short_filter_hash(expr: Option<&Expr>) -> Option<String> {
    let expr = expr?;
    let digest = Sha256::digest(normalize_filter_for_hash(expr).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(16);
    Some(hex)
}
