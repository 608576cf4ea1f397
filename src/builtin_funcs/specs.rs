use crate::types::NativeFn;

/// One row per builtin function: surface name, declared arity (ignored
/// when variadic), variadic flag, implementation.
pub(crate) fn get_builtin_func_specs() -> Vec<(&'static str, usize, bool, NativeFn)> {
    vec![
        ("друк", 0, true, super::print::print),
        ("прочитати_рядок", 0, true, super::read_line::read_line),
        ("ітератор", 1, false, super::iterator::iterator),
    ]
}
