// CLI modules
mod cli;
mod logging;
mod state;
mod version;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cat, Cp, Export, Init, Ls, Put, Rm, Search, Version, Whoami};

command_enum! {
    (Cat, Cat),
    (Cp, Cp),
    (Export, Export),
    (Init, Init),
    (Ls, Ls),
    (Put, Put),
    (Rm, Rm),
    (Search, Search),
    (Version, Version),
    (Whoami, Whoami),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    let guard = logging::init(args.log_level);

    let ctx = cli::op::OpContext::new(args.config_path, args.token);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            let output = output.to_string();
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}
