//! Signed credential tokens: issuance, validation, and type enforcement.

mod codec;
mod error;

pub use codec::{Claims, IssueContext, TokenCodec, TokenPair, TokenType, TOKEN_VERSION};
pub use error::Error;
