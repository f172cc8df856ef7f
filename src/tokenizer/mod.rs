mod tokenizer;

pub use tokenizer::{Tokenizer, TokenizerKind, MAX_TOKEN_LEN};
