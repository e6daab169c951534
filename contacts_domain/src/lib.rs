pub mod contact_service;
pub mod error;
pub mod hashing_service;
pub mod image_store;
mod mappers;
pub mod models;
pub mod notification;
pub mod service;
pub mod session_cache;
pub mod token_service;
mod utils;

pub use contact_service::{ContactService, ContactServiceImpl};
pub use error::{AuthError, ContactError};
pub use models::{AuthResult, Contact, TokenPair, TokenScope, User};
pub use service::{AuthService, AuthServiceImpl};
pub use token_service::TokenService;
