pub mod access;
pub mod catalog;
pub mod health;
pub mod logs;
pub mod rules;
pub mod sync;

pub use access::{check_access, get_content, verify};
pub use catalog::{get_catalog, get_catalog_by_type};
pub use health::health_check;
pub use logs::{get_build_log, get_build_logs, get_logs, get_stats};
pub use rules::{
    add_email, create_rule, delete_rule, get_rule, list_rules, remove_email, update_rule,
};
pub use sync::{manual_sync, sync_status, webhook};
