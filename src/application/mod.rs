//! Application services layer.

pub mod error;
pub mod feed;
pub mod forms;
pub mod mail;
pub mod pagination;
pub mod repos;
pub mod search;
pub mod share;
