pub mod entity;
pub mod items_sea_repo;
pub mod mapper;
pub mod members_sea_repo;
pub mod migrations;
pub mod teams_sea_repo;

pub use items_sea_repo::SeaItemsRepository;
pub use members_sea_repo::SeaMembersRepository;
pub use teams_sea_repo::SeaTeamsRepository;
