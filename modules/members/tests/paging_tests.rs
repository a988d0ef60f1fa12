#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{inmem_db, repos, save_member, save_team, usernames};
use members::{DomainError, MemberFields, MemberSchema, MembersRepository};
use repokit_query::{CursorV1, PageRequest, Query, QueryBuilder, SortDir};

#[tokio::test]
async fn paging_by_age() {
    // Arrange
    let db = inmem_db().await.unwrap();
    let repos = repos();
    for name in ["member1", "member2", "member3", "member4", "member5"] {
        save_member(&repos, db.conn(), name, 10, None).await;
    }
    let request = PageRequest::of(0, 3)
        .unwrap()
        .sorted_by("username", SortDir::Desc);

    // Act
    let page = repos
        .members
        .find_by_age(db.conn(), 10, &request)
        .await
        .unwrap();

    // Assert
    assert_eq!(usernames(&page.content), ["member5", "member4", "member3"]);
    assert_eq!(page.content.len(), 3);
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.number, 0);
    assert_eq!(page.total_pages(), 2);
    assert!(page.is_first());
    assert!(page.has_next());

    let dto_page = page.map(|m| m.username);
    assert_eq!(dto_page.total_elements, 5);
    assert_eq!(dto_page.content, ["member5", "member4", "member3"]);
}

#[tokio::test]
async fn concatenated_pages_cover_the_filtered_set() {
    let db = inmem_db().await.unwrap();
    let repos = repos();
    for i in 0..11_i64 {
        // every third member shares an age so the id tiebreaker matters
        save_member(&repos, db.conn(), &format!("m{i:02}"), i % 3, None).await;
    }
    let query = QueryBuilder::<MemberSchema>::new()
        .filter(MemberFields::AGE.ne(1))
        .order_by(MemberFields::AGE, SortDir::Asc)
        .build()
        .unwrap();
    let expected = repos.members.search(db.conn(), &query).await.unwrap();

    let mut collected = Vec::new();
    let first = repos
        .members
        .find_page(db.conn(), &query, &PageRequest::of(0, 3).unwrap())
        .await
        .unwrap();
    let total_pages = first.total_pages();
    assert_eq!(first.total_elements, 7);
    assert_eq!(total_pages, 3);
    collected.extend(first.content);
    for n in 1..total_pages {
        let page = repos
            .members
            .find_page(db.conn(), &query, &PageRequest::of(n, 3).unwrap())
            .await
            .unwrap();
        collected.extend(page.content);
    }

    assert_eq!(collected, expected);
}

#[tokio::test]
async fn page_past_the_end_is_empty() {
    let db = inmem_db().await.unwrap();
    let repos = repos();
    save_member(&repos, db.conn(), "m1", 10, None).await;

    let page = repos
        .members
        .find_page(db.conn(), &Query::new(), &PageRequest::of(5, 10).unwrap())
        .await
        .unwrap();

    assert!(page.content.is_empty());
    assert_eq!(page.total_elements, 1);
    assert!(!page.has_next());
}

#[tokio::test]
async fn unknown_sort_field_is_a_validation_error() {
    let db = inmem_db().await.unwrap();
    let repos = repos();

    let res = repos
        .members
        .find_page(
            db.conn(),
            &Query::new(),
            &PageRequest::of(0, 3).unwrap().sorted_by("nickname", SortDir::Asc),
        )
        .await;

    assert!(matches!(res, Err(DomainError::Validation { .. })));
}

#[tokio::test]
async fn cursor_pages_follow_next_links() {
    let db = inmem_db().await.unwrap();
    let repos = repos();
    for (name, age) in [("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)] {
        save_member(&repos, db.conn(), name, age, None).await;
    }
    let base = QueryBuilder::<MemberSchema>::new()
        .order_by(MemberFields::AGE, SortDir::Desc)
        .limit(2)
        .build()
        .unwrap();

    let mut seen = Vec::new();
    let mut query = base.clone();
    loop {
        let page = repos.members.find_cursor(db.conn(), &query).await.unwrap();
        seen.extend(page.items.into_iter().map(|m| m.username));
        match page.page_info.next_cursor {
            Some(next) => query = base.clone().with_cursor(CursorV1::decode(&next).unwrap()),
            None => break,
        }
    }

    assert_eq!(seen, ["e", "d", "c", "b", "a"]);
}

#[tokio::test]
async fn bulk_age_plus_counts_matching_rows() {
    // Arrange
    let db = inmem_db().await.unwrap();
    let repos = repos();
    for (name, age) in [
        ("member1", 10),
        ("member2", 19),
        ("member3", 20),
        ("member4", 21),
        ("member5", 40),
    ] {
        save_member(&repos, db.conn(), name, age, None).await;
    }

    // Act
    let affected = repos.members.bulk_age_plus(db.conn(), 20).await.unwrap();

    // Assert
    assert_eq!(affected, 3);
    let member5 = repos
        .members
        .find_member_by_username(db.conn(), "member5")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member5.age, 41);
    let ages: Vec<i64> = repos
        .members
        .find_all(db.conn())
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.age)
        .collect();
    assert_eq!(ages, [10, 19, 21, 22, 41]);
}

#[tokio::test]
async fn native_projection_page() {
    let db = inmem_db().await.unwrap();
    let repos = repos();
    let team = save_team(&repos, db.conn(), "teamA").await;
    save_member(&repos, db.conn(), "m1", 0, Some(&team)).await;
    save_member(&repos, db.conn(), "m2", 0, None).await;
    save_member(&repos, db.conn(), "m3", 0, Some(&team)).await;

    let first = repos
        .members
        .find_by_native_projection(db.conn(), &PageRequest::of(0, 2).unwrap())
        .await
        .unwrap();
    let second = repos
        .members
        .find_by_native_projection(db.conn(), &PageRequest::of(1, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(first.total_elements, 3);
    assert_eq!(first.total_pages(), 2);
    assert_eq!(first.content[0].username, "m1");
    assert_eq!(first.content[0].team_name.as_deref(), Some("teamA"));
    assert_eq!(first.content[1].team_name, None);
    assert_eq!(second.content.len(), 1);
    assert_eq!(second.content[0].username, "m3");
    assert!(second.is_last());
}

#[test]
fn page_request_rejects_bad_input() {
    assert!(PageRequest::of(0, 0).is_err());
    assert!(PageRequest::try_from_signed(-1, 10).is_err());
    assert!(PageRequest::try_from_signed(0, -5).is_err());
}
