pub mod item;
pub mod member;
pub mod team;
