pub mod tokenizer;

pub use tokenizer::{
    Associativity, GroupKind, LexError, Token, TokenGroup, TokenKind, TokenNode, TokenSeq,
    TokenTree, tokenize,
};

// Re-export common types
pub use cellform_common::{CellValue, FormulaError, FormulaErrorKind};
