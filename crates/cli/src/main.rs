use std::process::ExitCode;

fn main() -> ExitCode {
    propbot_cli::run()
}
