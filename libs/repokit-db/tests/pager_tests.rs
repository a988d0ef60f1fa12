#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{Employee, employee, field_map, insert_department, seed, setup};
use repokit_db::{Pager, StoreError};
use repokit_query::ast::{CompareOperator, Expr};
use repokit_query::{CursorV1, OrderBy, PageRequest, Query, SortDir};
use sea_orm::EntityTrait;

fn to_name(m: employee::Model) -> String {
    m.name
}

async fn five_employees(conn: &sea_orm::DatabaseConnection) -> Vec<Employee> {
    seed(
        conn,
        &[
            ("e1", 10, None),
            ("e2", 20, None),
            ("e3", 30, None),
            ("e4", 40, None),
            ("e5", 50, None),
        ],
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn offset_page_reports_totals() {
    // Arrange
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let request = PageRequest::of(0, 3)
        .unwrap()
        .sorted_by("name", SortDir::Desc);

    // Act
    let page = Pager::new(&conn, &fmap)
        .fetch_page(employee::Entity::find(), &Query::new(), &request, to_name)
        .await
        .unwrap();

    // Assert
    assert_eq!(page.content, ["e5", "e4", "e3"]);
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages(), 2);
    assert!(page.is_first());
    assert!(page.has_next());
}

#[tokio::test]
async fn last_partial_page_and_page_past_end() {
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap);
    let query = Query::new().with_order(OrderBy::by("salary", SortDir::Asc));

    let last = pager
        .fetch_page(
            employee::Entity::find(),
            &query,
            &PageRequest::of(1, 3).unwrap(),
            to_name,
        )
        .await
        .unwrap();
    assert_eq!(last.content, ["e4", "e5"]);
    assert!(last.is_last());
    assert!(!last.has_next());

    let past = pager
        .fetch_page(
            employee::Entity::find(),
            &query,
            &PageRequest::of(7, 3).unwrap(),
            to_name,
        )
        .await
        .unwrap();
    assert!(past.content.is_empty());
    assert_eq!(past.total_elements, 5);
    assert!(!past.has_next());
}

#[tokio::test]
async fn total_matches_filter_not_window() {
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let query = Query::new().with_filter(Expr::compare("salary", CompareOperator::Gt, 15));

    let page = Pager::new(&conn, &fmap)
        .fetch_page(
            employee::Entity::find(),
            &query,
            &PageRequest::of(0, 2).unwrap(),
            to_name,
        )
        .await
        .unwrap();

    assert_eq!(page.total_elements, 4);
    assert_eq!(page.content, ["e2", "e3"]);
}

#[tokio::test]
async fn equal_sort_keys_break_ties_by_id() {
    let conn = setup().await.unwrap();
    seed(
        &conn,
        &[("a", 1, None), ("b", 1, None), ("c", 1, None), ("d", 1, None)],
    )
    .await
    .unwrap();
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap);
    let query = Query::new().with_order(OrderBy::by("salary", SortDir::Asc));

    let mut seen = Vec::new();
    for page in 0..2 {
        let p = pager
            .fetch_page(
                employee::Entity::find(),
                &query,
                &PageRequest::of(page, 2).unwrap(),
                to_name,
            )
            .await
            .unwrap();
        seen.extend(p.content);
    }

    assert_eq!(seen, ["a", "b", "c", "d"]);
}

#[tokio::test]
async fn joined_filter_counts_once_per_root_row() {
    let conn = setup().await.unwrap();
    let ops = insert_department(&conn, "ops").await.unwrap();
    let dev = insert_department(&conn, "dev").await.unwrap();
    seed(
        &conn,
        &[("a", 1, Some(ops)), ("b", 2, Some(dev)), ("c", 3, Some(ops)), ("d", 4, None)],
    )
    .await
    .unwrap();
    let fmap = field_map();
    let query = Query::new()
        .with_filter(Expr::compare("department.title", CompareOperator::Eq, "ops"))
        .with_order(OrderBy::by("department.title", SortDir::Asc));

    let page = Pager::new(&conn, &fmap)
        .fetch_page(
            employee::Entity::find(),
            &query,
            &PageRequest::of(0, 10).unwrap(),
            to_name,
        )
        .await
        .unwrap();

    assert_eq!(page.total_elements, 2);
    assert_eq!(page.content, ["a", "c"]);
}

#[tokio::test]
async fn oversized_page_and_unknown_sort_are_rejected() {
    let conn = setup().await.unwrap();
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap).limits(10, 50);

    let too_big = pager
        .fetch_page(
            employee::Entity::find(),
            &Query::new(),
            &PageRequest::of(0, 51).unwrap(),
            to_name,
        )
        .await;
    assert!(matches!(too_big, Err(StoreError::InvalidArgument(_))));

    let unknown = pager
        .fetch_page(
            employee::Entity::find(),
            &Query::new(),
            &PageRequest::of(0, 5).unwrap().sorted_by("shoe_size", SortDir::Asc),
            to_name,
        )
        .await;
    assert!(matches!(unknown, Err(StoreError::InvalidField(_))));
}

#[tokio::test]
async fn cursor_walks_forward_and_back() {
    // Arrange
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap);
    let base = Query::new()
        .with_order(OrderBy::by("salary", SortDir::Desc))
        .with_limit(2);

    // Act
    let first = pager
        .fetch_cursor(employee::Entity::find(), &base, to_name)
        .await
        .unwrap();
    let next = CursorV1::decode(first.page_info.next_cursor.as_deref().unwrap()).unwrap();
    let second = pager
        .fetch_cursor(
            employee::Entity::find(),
            &base.clone().with_cursor(next),
            to_name,
        )
        .await
        .unwrap();
    let prev = CursorV1::decode(second.page_info.prev_cursor.as_deref().unwrap()).unwrap();
    let back = pager
        .fetch_cursor(
            employee::Entity::find(),
            &base.clone().with_cursor(prev),
            to_name,
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(first.items, ["e5", "e4"]);
    assert!(first.page_info.prev_cursor.is_none());
    assert_eq!(second.items, ["e3", "e2"]);
    assert_eq!(back.items, ["e5", "e4"]);
}

#[tokio::test]
async fn last_cursor_page_has_no_next() {
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap);

    let page = pager
        .fetch_cursor(employee::Entity::find(), &Query::new().with_limit(10), to_name)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 5);
    assert!(page.page_info.next_cursor.is_none());
    assert_eq!(page.page_info.limit, 10);
}

#[tokio::test]
async fn cursor_from_another_order_is_rejected() {
    let conn = setup().await.unwrap();
    five_employees(&conn).await;
    let fmap = field_map();
    let pager = Pager::new(&conn, &fmap);
    let by_salary = Query::new()
        .with_order(OrderBy::by("salary", SortDir::Asc))
        .with_limit(2);

    let first = pager
        .fetch_cursor(employee::Entity::find(), &by_salary, to_name)
        .await
        .unwrap();
    let cursor = CursorV1::decode(first.page_info.next_cursor.as_deref().unwrap()).unwrap();

    let by_name = Query::new()
        .with_order(OrderBy::by("name", SortDir::Asc))
        .with_cursor(cursor);
    let res = pager
        .fetch_cursor(employee::Entity::find(), &by_name, to_name)
        .await;

    assert!(matches!(res, Err(StoreError::InvalidArgument(_))));
}
