//! 基础设施层实现。
//!
//! 基于 PostgreSQL 的消息存储、用户目录与商品目录，实现应用层定义的接口。

pub mod migrations;
pub mod repository;

pub use migrations::MIGRATOR;
pub use repository::{
    create_pg_pool, PgItemDirectory, PgMessageRepository, PgStorage, PgUserDirectory,
};
