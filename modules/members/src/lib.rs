//! Member / team / item repositories on top of `repokit-db`.
//!
//! Every query the repositories expose is built with the typed
//! [`repokit_query::QueryBuilder`] over [`domain::fields::MemberSchema`],
//! paged through [`repokit_db::Pager`] and shaped through
//! [`repokit_db::ProjectionMapper`].

pub mod domain;
pub mod infra;
pub mod module;

pub use domain::error::DomainError;
pub use domain::fields::{MemberField, MemberFields, MemberSchema};
pub use domain::model::{Item, Member, Team, TeamDeletePolicy};
pub use domain::repos::{ItemsRepository, MemberCustomQueries, MembersRepository, TeamsRepository};
pub use domain::service::MembersService;
pub use infra::storage::migrations::Migrator;
pub use infra::storage::{SeaItemsRepository, SeaMembersRepository, SeaTeamsRepository};
pub use module::{DefaultMembersService, MembersModule};
