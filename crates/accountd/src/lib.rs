//! # accountd
//!
//! User, session and permission repositories for the account service, read
//! through a stampede-protected cache ([`accountd_cache`]).
//!
//! Configuration comes from `accountd.toml` overlaid by `ACCOUNTD__*`
//! environment variables; see [`config::loader::load_config`]. [`init`]
//! runs the whole start-up sequence and installs the tracing subscriber.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod repository;
pub mod store;

pub use bootstrap::{Repositories, Services, build_cache_manager, init, load_dotenv};
pub use config::AppConfig;
pub use error::{BootstrapError, RepositoryError, RepositoryResult, StoreError};
pub use model::{Permission, RoleResourceAction, Session, SessionTokens, TokenType, User};
pub use repository::{PermissionRepository, SessionRepository, UserRepository};
pub use store::{PermissionStore, SessionStore, StoreResult, UserStore};
