//! Credential hashing and session tokens.

pub mod password;
pub mod token;

pub use password::{CredentialHasher, PasswordError};
pub use token::{SessionClaims, TokenError, TokenSigner};
