pub mod cache;
pub mod cli;
pub mod error;
pub mod load;
pub mod node;
pub mod options;
pub mod transform;
pub mod version;

use colored::Colorize;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
