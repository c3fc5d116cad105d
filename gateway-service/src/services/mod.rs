pub mod access;
pub mod database;
pub mod processor;
pub mod source;
pub mod storage;
pub mod sync;
pub mod token;

pub use access::{AccessService, ClientContext};
pub use database::Database;
pub use source::{GithubFetcher, NormalizedPush, PushEventPayload, SourceFetcher};
pub use storage::{LocalStorage, S3Storage, Storage};
pub use sync::SyncService;
pub use token::TokenService;
