//! Collection Client - REST 远程存储
//!
//! 通过 HTTP 访问集合 API，实现 `collection_editor::RemoteStore`。
//!
//! # 使用
//!
//! ```ignore
//! let config = ClientConfig::new("http://localhost:8080/api").with_token("...");
//! let remote = Arc::new(RestStore::new(&config)?);
//! let editor = CollectionEditor::new(OwnerId::new("club"), remote, &EditorConfig::from_env());
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod store;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use store::RestStore;
