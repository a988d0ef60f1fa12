#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{employee, field_map, insert_department, seed, setup};
use repokit_db::{
    FetchStrategy, Projection, ProjectionMapper, ProjectionShape, RoundTrips, StoreError,
};
use repokit_query::ast::{CompareOperator, Expr};
use repokit_query::{OrderBy, PageRequest, Query, SortDir};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct DeptInfo {
    title: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct NameWithDept {
    name: String,
    department: Option<DeptInfo>,
}

impl Projection for NameWithDept {
    fn shape() -> ProjectionShape {
        ProjectionShape::closed(["name"]).with_nested("department", ["title"])
    }
}

async fn seeded() -> DatabaseConnection {
    let conn = setup().await.unwrap();
    let ops = insert_department(&conn, "ops").await.unwrap();
    let dev = insert_department(&conn, "dev").await.unwrap();
    seed(
        &conn,
        &[("a", 1, Some(ops)), ("b", 2, Some(dev)), ("c", 3, None)],
    )
    .await
    .unwrap();
    conn
}

fn by_name() -> Query {
    Query::new().with_order(OrderBy::by("name", SortDir::Asc))
}

#[tokio::test]
async fn eager_join_is_one_round_trip() {
    // Arrange
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let plan = mapper.plan_for::<NameWithDept>().unwrap();
    assert_eq!(plan.round_trips(), RoundTrips::Single);

    // Act
    let projected = mapper
        .fetch(&conn, employee::Entity::find(), &by_name(), &plan)
        .await
        .unwrap();

    // Assert
    assert_eq!(projected.round_trips, 1);
    let rows: Vec<NameWithDept> = projected.into_typed().unwrap();
    assert_eq!(
        rows,
        vec![
            NameWithDept {
                name: "a".to_owned(),
                department: Some(DeptInfo {
                    title: "ops".to_owned()
                }),
            },
            NameWithDept {
                name: "b".to_owned(),
                department: Some(DeptInfo {
                    title: "dev".to_owned()
                }),
            },
            NameWithDept {
                name: "c".to_owned(),
                department: None,
            },
        ]
    );
}

#[tokio::test]
async fn per_row_fetch_counts_each_related_lookup() {
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let plan = mapper
        .plan(&NameWithDept::shape(), FetchStrategy::PerRowFetch)
        .unwrap();
    assert_eq!(plan.round_trips(), RoundTrips::PerRow { relations: 1 });

    let projected = mapper
        .fetch(&conn, employee::Entity::find(), &by_name(), &plan)
        .await
        .unwrap();

    // one root select plus one lookup per employee with a department
    assert_eq!(projected.round_trips, 3);
    assert!(projected.round_trips <= plan.round_trips().upper_bound(3));
    assert_eq!(projected.rows[0]["department"], json!({ "title": "ops" }));
    assert_eq!(projected.rows[2]["department"], json!(null));
}

#[tokio::test]
async fn flat_projection_with_joined_column() {
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let plan = mapper
        .plan(
            &ProjectionShape::closed(["id", "name", "department.title"]),
            FetchStrategy::EagerJoin,
        )
        .unwrap();
    let query = by_name().with_filter(Expr::compare("salary", CompareOperator::Le, 2));

    let projected = mapper
        .fetch(&conn, employee::Entity::find(), &query, &plan)
        .await
        .unwrap();

    assert_eq!(
        projected.rows,
        vec![
            json!({ "id": 1, "name": "a", "department_title": "ops" }),
            json!({ "id": 2, "name": "b", "department_title": "dev" }),
        ]
    );
}

#[tokio::test]
async fn projected_page_keeps_count_semantics() {
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let plan = mapper
        .plan(&ProjectionShape::closed(["name"]), FetchStrategy::EagerJoin)
        .unwrap();
    let request = PageRequest::of(0, 2)
        .unwrap()
        .sorted_by("name", SortDir::Desc);

    let projected = mapper
        .fetch_page(&conn, employee::Entity::find(), &Query::new(), &request, &plan)
        .await
        .unwrap();

    assert_eq!(projected.round_trips, 2);
    let page = projected.page;
    assert_eq!(page.total_elements, 3);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.content, vec![json!({ "name": "c" }), json!({ "name": "b" })]);
}

#[tokio::test]
async fn per_row_page_reports_every_statement() {
    // Arrange
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let plan = mapper
        .plan(&NameWithDept::shape(), FetchStrategy::PerRowFetch)
        .unwrap();
    let request = PageRequest::of(0, 3).unwrap().sorted_by("name", SortDir::Asc);
    let past_end = PageRequest::of(4, 3).unwrap();

    // Act
    let projected = mapper
        .fetch_page(&conn, employee::Entity::find(), &Query::new(), &request, &plan)
        .await
        .unwrap();
    let empty = mapper
        .fetch_page(&conn, employee::Entity::find(), &Query::new(), &past_end, &plan)
        .await
        .unwrap();

    // Assert
    // count, root select, and a lookup for each of the two employees with a department
    assert_eq!(projected.round_trips, 4);
    let typed = projected.into_typed::<NameWithDept>().unwrap();
    assert_eq!(typed.total_elements, 3);
    assert_eq!(
        typed.content[0].department,
        Some(DeptInfo {
            title: "ops".to_owned()
        })
    );
    assert_eq!(typed.content[2].department, None);
    assert_eq!(empty.round_trips, 1);
    assert!(empty.page.content.is_empty());
}

#[tokio::test]
async fn query_selection_drives_the_projection() {
    let conn = seeded().await;
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);
    let query = by_name().with_select(vec!["name".to_owned(), "department.title".to_owned()]);

    let plan = mapper.plan_selected(&query).unwrap();
    let projected = mapper
        .fetch(&conn, employee::Entity::find(), &query, &plan)
        .await
        .unwrap();

    assert_eq!(plan.round_trips(), RoundTrips::Single);
    assert_eq!(
        projected.rows,
        vec![
            json!({ "name": "a", "department_title": "ops" }),
            json!({ "name": "b", "department_title": "dev" }),
            json!({ "name": "c", "department_title": null }),
        ]
    );
}

#[test]
fn query_selection_is_validated() {
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);

    assert!(matches!(
        mapper.plan_selected(&Query::new()),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        mapper.plan_selected(&Query::new().with_select(vec!["nickname".to_owned()])),
        Err(StoreError::InvalidField(_))
    ));
}

#[test]
fn plans_reject_bad_shapes() {
    let fmap = field_map();
    let mapper = ProjectionMapper::new(&fmap);

    assert!(matches!(
        mapper.plan(&ProjectionShape::closed(["nickname"]), FetchStrategy::EagerJoin),
        Err(StoreError::InvalidField(_))
    ));
    assert!(matches!(
        mapper.plan(
            &ProjectionShape::closed(["name"]).with_nested("manager", ["name"]),
            FetchStrategy::EagerJoin
        ),
        Err(StoreError::InvalidField(_))
    ));
    assert!(matches!(
        mapper.plan(
            &ProjectionShape::closed(["department.title"]),
            FetchStrategy::PerRowFetch
        ),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        mapper.plan(&ProjectionShape::default(), FetchStrategy::EagerJoin),
        Err(StoreError::InvalidArgument(_))
    ));
}
