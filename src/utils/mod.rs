//! Shared utilities.

pub mod code_extraction;

pub use code_extraction::{parse_answer_payload, strip_code_fences, AnswerParseError};
