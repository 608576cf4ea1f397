pub(crate) use keywords::KEYWORDS;
pub(crate) use result::{ScanErr, ScanErrKind, ScanResult, ScanTokensResult};
pub(crate) use scanner::Scanner;
pub(crate) use token::{StringPart, Token, TokenWithLocation};

mod keywords;
mod result;
mod scanner;
mod token;
