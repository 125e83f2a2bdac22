mod relation_store_mysql;

pub use relation_store_mysql::*;

mod repo_tx_mysql;

pub use repo_tx_mysql::*;

mod util;
