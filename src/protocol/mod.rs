//! Shell protocol: how command lines come in and how replies go out.
//!
//! ## Modules
//!
//! - `types`: the [`Reply`] enum returned by the command table
//! - `parser`: the line tokenizer feeding it
//!
//! ## Example
//!
//! ```
//! use shelfkv::protocol::{tokenize, Reply};
//!
//! let args = tokenize("GET name").unwrap();
//! assert_eq!(args.len(), 2);
//!
//! let reply = Reply::bulk("Ariz");
//! assert_eq!(reply.to_string(), "\"Ariz\"");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{tokenize, ParseError, ParseResult};
pub use types::Reply;
