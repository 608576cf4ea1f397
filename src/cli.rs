// Shared between `main.rs` and `build.rs` (which includes this file
// directly to generate shell completion scripts at build time).
use clap::{Arg, ArgAction, Command};

pub(crate) fn build_cli() -> Command {
    Command::new("barvinok")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ukrainian-keyword scripting language interpreter")
        .disable_help_flag(true)
        .arg(
            Arg::new("help")
                .short('д')
                .long("допомога")
                .action(ArgAction::Help)
                .help("Print help and exit"),
        )
        .arg(
            Arg::new("dis")
                .short('а')
                .long("асемблер")
                .action(ArgAction::SetTrue)
                .help("Print the disassembly of the compiled program and exit"),
        )
        .arg(
            Arg::new("FILE_NAME")
                .index(1)
                .help("Program file to run; omit to start the REPL"),
        )
        .arg(
            Arg::new("ARGS")
                .index(2)
                .num_args(0..)
                .trailing_var_arg(true)
                .help("Arguments passed to the program"),
        )
}
