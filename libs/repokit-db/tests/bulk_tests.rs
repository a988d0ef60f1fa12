#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{EmployeeMapping, field_map, insert_department, seed, setup};
use repokit_db::{Mutation, RecordStore, SeaRecordStore, StoreError, bulk_update};
use repokit_query::ast::{CompareOperator, Expr};

#[tokio::test]
async fn increment_matching_rows_only() {
    // Arrange
    let conn = setup().await.unwrap();
    seed(
        &conn,
        &[("a", 10, None), ("b", 19, None), ("c", 20, None), ("d", 21, None), ("e", 40, None)],
    )
    .await
    .unwrap();
    let filter = Expr::compare("salary", CompareOperator::Ge, 20);

    // Act
    let affected = bulk_update(
        &conn,
        &field_map(),
        Some(&filter),
        &[Mutation::increment("salary", 1)],
    )
    .await
    .unwrap();

    // Assert
    assert_eq!(affected, 3);
    let salaries: Vec<i64> = SeaRecordStore::<EmployeeMapping>::default()
        .find_all(&conn)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.salary)
        .collect();
    assert_eq!(salaries, [10, 19, 21, 22, 41]);
}

#[tokio::test]
async fn set_without_filter_touches_every_row() {
    let conn = setup().await.unwrap();
    seed(&conn, &[("a", 1, None), ("b", 2, None)]).await.unwrap();

    let affected = bulk_update(&conn, &field_map(), None, &[Mutation::set("name", "x")])
        .await
        .unwrap();

    assert_eq!(affected, 2);
}

#[tokio::test]
async fn no_match_reports_zero() {
    let conn = setup().await.unwrap();
    seed(&conn, &[("a", 1, None)]).await.unwrap();
    let filter = Expr::compare("salary", CompareOperator::Gt, 1000);

    let affected = bulk_update(
        &conn,
        &field_map(),
        Some(&filter),
        &[Mutation::increment("salary", 5)],
    )
    .await
    .unwrap();

    assert_eq!(affected, 0);
}

#[tokio::test]
async fn invalid_mutations_are_rejected() {
    let conn = setup().await.unwrap();
    let dept = insert_department(&conn, "ops").await.unwrap();
    seed(&conn, &[("a", 1, Some(dept))]).await.unwrap();
    let fmap = field_map();

    let empty = bulk_update(&conn, &fmap, None, &[]).await;
    assert!(matches!(empty, Err(StoreError::InvalidArgument(_))));

    let text_increment = bulk_update(&conn, &fmap, None, &[Mutation::increment("name", 1)]).await;
    assert!(matches!(text_increment, Err(StoreError::InvalidArgument(_))));

    let joined_target = bulk_update(
        &conn,
        &fmap,
        None,
        &[Mutation::set("department.title", "dev")],
    )
    .await;
    assert!(matches!(joined_target, Err(StoreError::InvalidArgument(_))));

    let joined_filter = Expr::compare("department.title", CompareOperator::Eq, "ops");
    let res = bulk_update(
        &conn,
        &fmap,
        Some(&joined_filter),
        &[Mutation::increment("salary", 1)],
    )
    .await;
    assert!(matches!(res, Err(StoreError::InvalidArgument(_))));

    let unknown = bulk_update(&conn, &fmap, None, &[Mutation::set("bonus", 1)]).await;
    assert!(matches!(unknown, Err(StoreError::InvalidField(_))));
}
