use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{Token, Token::*};

/// Map of Ukrainian keyword spellings to their respective tokens,
/// grounded on the original lexer's keyword regex table (punctuation
/// operators such as `+=`/`==` are handled directly in `scanner.rs`).
pub(crate) static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    [
        ("істина", True),
        ("хиба", False),
        ("нич", Nil),
        ("та", And),
        ("або", Or),
        ("не", Not),
        ("є", Is),
        ("нехай", Let),
        ("якщо", If),
        ("інакше", Else),
        ("кінець", End),
        ("поки", While),
        ("для", For),
        ("кожного", Each),
        ("в", In),
        ("завершити", Break),
        ("продовжити", Continue),
        ("функція", Function),
        ("повернути", Return),
        ("спробувати", Try),
        ("зловити", Catch),
        ("нарешті", Finally),
        ("викинути", Raise),
    ]
    .iter()
    .cloned()
    .collect()
});
