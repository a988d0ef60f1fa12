#![allow(clippy::unwrap_used)]

use super::*;
use crate::ast::{CompareOperator, Expr};

fn cursor(s: &str, f: Option<&str>) -> CursorV1 {
    CursorV1 {
        k: vec!["member5".to_owned(), "5".to_owned()],
        o: SortDir::Desc,
        s: s.to_owned(),
        f: f.map(str::to_owned),
        d: CursorDirection::Forward,
    }
}

#[test]
fn signed_tokens_parse_defaults_to_ascending() {
    let order = OrderBy::from_signed_tokens("-username, id").unwrap();
    assert_eq!(
        order,
        OrderBy::by("username", SortDir::Desc).then("id", SortDir::Asc)
    );
    assert!(order.equals_signed_tokens("-username,+id"));
    assert!(!order.equals_signed_tokens("-username"));
}

#[test]
fn signed_tokens_reject_empty_input() {
    assert!(OrderBy::from_signed_tokens(" , ").is_err());
    assert!(OrderBy::from_signed_tokens("+").is_err());
}

#[test]
fn tiebreaker_is_appended_once() {
    let order = OrderBy::by("username", SortDir::Desc)
        .ensure_tiebreaker("id", SortDir::Asc)
        .ensure_tiebreaker("id", SortDir::Asc);
    assert_eq!(order.to_signed_tokens(), "-username,+id");

    let already = OrderBy::by("id", SortDir::Desc).ensure_tiebreaker("id", SortDir::Asc);
    assert_eq!(already.to_signed_tokens(), "-id");
}

#[test]
fn display_lists_keys() {
    let order = OrderBy::by("username", SortDir::Desc).then("id", SortDir::Asc);
    assert_eq!(order.to_string(), "username desc, id asc");
    assert_eq!(OrderBy::empty().to_string(), "(none)");
}

#[test]
fn cursor_token_survives_encoding() {
    let original = cursor("-username,+id", Some("abcd"));
    let decoded = CursorV1::decode(&original.encode().unwrap()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn cursor_decode_errors() {
    assert_eq!(CursorV1::decode("***"), Err(Error::CursorInvalidBase64));

    let not_json = base64_url::encode(b"nope");
    assert_eq!(CursorV1::decode(&not_json), Err(Error::CursorInvalidJson));

    let v2 = base64_url::encode(br#"{"v":2,"k":["1"],"o":"asc","s":"+id"}"#);
    assert_eq!(CursorV1::decode(&v2), Err(Error::CursorInvalidVersion));

    let no_keys = base64_url::encode(br#"{"v":1,"k":[],"o":"asc","s":"+id"}"#);
    assert_eq!(CursorV1::decode(&no_keys), Err(Error::CursorInvalidKeys));

    let no_order = base64_url::encode(br#"{"v":1,"k":["1"],"o":"asc","s":" "}"#);
    assert_eq!(CursorV1::decode(&no_order), Err(Error::CursorInvalidFields));
}

#[test]
fn cursor_direction_defaults_to_forward() {
    let token = base64_url::encode(br#"{"v":1,"k":["1"],"o":"asc","s":"+id"}"#);
    let c = CursorV1::decode(&token).unwrap();
    assert!(!c.is_backward());
}

#[test]
fn cursor_must_match_order_and_filter() {
    let order = OrderBy::by("username", SortDir::Desc).then("id", SortDir::Asc);
    let c = cursor("-username,+id", Some("aaaa"));

    assert!(validate_cursor_against(&c, &order, Some("aaaa")).is_ok());
    assert!(validate_cursor_against(&c, &order, None).is_ok());
    assert_eq!(
        validate_cursor_against(&c, &order, Some("bbbb")),
        Err(Error::FilterMismatch)
    );
    assert_eq!(
        validate_cursor_against(&c, &OrderBy::by("id", SortDir::Asc), Some("aaaa")),
        Err(Error::OrderMismatch)
    );
}

#[test]
fn with_filter_computes_hash() {
    let q = Query::new().with_filter(Expr::compare("age", CompareOperator::Ge, 20));
    assert!(q.has_filter());
    assert_eq!(
        q.filter_hash,
        short_filter_hash(Some(&Expr::compare("age", CompareOperator::Ge, 20)))
    );
    assert_eq!(Query::from(None::<Expr>).filter_hash, None);
}

#[test]
fn identifiers_are_collected_in_order() {
    let e = Expr::compare("username", CompareOperator::Eq, "a")
        .or(!Expr::is_in("team.name", ["x"]))
        .and(Expr::compare_fields("age", CompareOperator::Gt, "version"));
    assert_eq!(e.identifiers(), vec!["username", "team.name", "age", "version"]);
}
