use std::process::ExitCode;

fn main() -> ExitCode {
    voxact_cli::run()
}
