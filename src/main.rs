use std::process::exit;

use barvinok::repl;
use barvinok::run::{run_file, run_stdin};

mod cli;

fn main() {
    env_logger::init();

    let matches = cli::build_cli().get_matches();
    let dis = matches.get_flag("dis");
    let file_name = matches.get_one::<String>("FILE_NAME");

    let result = match file_name {
        Some(file_name) if file_name == "-" => run_stdin(dis),
        Some(file_name) => run_file(file_name, dis),
        None => repl::run(dis),
    };

    match result {
        Ok(Some(message)) => {
            println!("{message}");
            exit(0);
        }
        Ok(None) => exit(0),
        Err((code, message)) => {
            eprintln!("{message}");
            exit(code);
        }
    }
}
