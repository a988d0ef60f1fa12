#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use anyhow::Result;
use repokit_db::query::FieldMap;
use repokit_db::{DbConfig, DbHandle, RecordMapping};
use repokit_query::FieldKind;
use sea_orm::{ActiveValue, ConnectionTrait, DatabaseConnection, RelationTrait, Set};

pub mod department {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "department")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub title: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod employee {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "employee")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub salary: i64,
        pub dept_id: Option<i64>,
        pub version: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::department::Entity",
            from = "Column::DeptId",
            to = "super::department::Column::Id"
        )]
        Department,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Employee {
    pub id: Option<i64>,
    pub name: String,
    pub salary: i64,
    pub dept_id: Option<i64>,
    pub version: i64,
}

impl Employee {
    pub fn new(name: &str, salary: i64) -> Self {
        Self {
            id: None,
            name: name.to_owned(),
            salary,
            dept_id: None,
            version: 0,
        }
    }

    pub fn in_dept(mut self, dept_id: i64) -> Self {
        self.dept_id = Some(dept_id);
        self
    }
}

pub struct EmployeeMapping;

impl RecordMapping for EmployeeMapping {
    type Entity = employee::Entity;
    type Record = Employee;

    const NAME: &'static str = "employee";

    fn id_column() -> employee::Column {
        employee::Column::Id
    }

    fn version_column() -> Option<employee::Column> {
        Some(employee::Column::Version)
    }

    fn record_id(record: &Employee) -> Option<i64> {
        record.id
    }

    fn record_version(record: &Employee) -> Option<i64> {
        Some(record.version)
    }

    fn from_model(m: employee::Model) -> Employee {
        Employee {
            id: Some(m.id),
            name: m.name,
            salary: m.salary,
            dept_id: m.dept_id,
            version: m.version,
        }
    }

    fn into_active_model(r: Employee) -> employee::ActiveModel {
        employee::ActiveModel {
            id: r.id.map_or(ActiveValue::NotSet, Set),
            name: Set(r.name),
            salary: Set(r.salary),
            dept_id: Set(r.dept_id),
            version: Set(r.version),
        }
    }
}

pub fn field_map() -> FieldMap<employee::Entity> {
    FieldMap::<employee::Entity>::new()
        .insert_with_extractor("id", employee::Column::Id, FieldKind::I64, |m| m.id.to_string())
        .insert_with_extractor("name", employee::Column::Name, FieldKind::String, |m| {
            m.name.clone()
        })
        .insert_with_extractor("salary", employee::Column::Salary, FieldKind::I64, |m| {
            m.salary.to_string()
        })
        .insert("dept_id", employee::Column::DeptId, FieldKind::I64)
        .insert("version", employee::Column::Version, FieldKind::I64)
        .relation(
            "department",
            || employee::Relation::Department.def(),
            employee::Column::DeptId,
            department::Column::Id,
        )
        .insert_joined(
            "department.title",
            "department",
            department::Column::Title,
            FieldKind::String,
        )
        .unwrap()
}

/// Fresh in-memory database with the test schema.
pub async fn setup() -> Result<DatabaseConnection> {
    let db = DbHandle::connect(&DbConfig::default()).await?;
    let conn = db.conn().clone();
    conn.execute_unprepared(
        "CREATE TABLE department (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
title TEXT NOT NULL
)",
    )
    .await?;
    conn.execute_unprepared(
        "CREATE TABLE employee (
id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
name TEXT NOT NULL,
salary INTEGER NOT NULL,
dept_id INTEGER NULL REFERENCES department(id),
version INTEGER NOT NULL DEFAULT 0
)",
    )
    .await?;
    Ok(conn)
}

pub async fn insert_department(conn: &DatabaseConnection, title: &str) -> Result<i64> {
    use sea_orm::ActiveModelTrait;

    let model = department::ActiveModel {
        id: ActiveValue::NotSet,
        title: Set(title.to_owned()),
    }
    .insert(conn)
    .await?;
    Ok(model.id)
}

/// Insert `rows` as `(name, salary, dept)` and return them with ids.
pub async fn seed(
    conn: &DatabaseConnection,
    rows: &[(&str, i64, Option<i64>)],
) -> Result<Vec<Employee>> {
    use repokit_db::{RecordStore, SeaRecordStore};

    let store = SeaRecordStore::<EmployeeMapping>::default();
    let mut out = Vec::with_capacity(rows.len());
    for (name, salary, dept) in rows {
        let mut e = Employee::new(name, *salary);
        e.dept_id = *dept;
        out.push(store.save(conn, e).await?);
    }
    Ok(out)
}
