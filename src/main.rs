use clap::Parser;

use layerdesk::cli::{self, CliArgs};
use layerdesk::logger::{self, Level};
use layerdesk::EditorSettings;

fn main() -> std::process::ExitCode {
    let args = CliArgs::parse();
    let settings = EditorSettings::load();

    // Overwrites the previous session log. --verbose forces debug records.
    logger::init(if args.verbose { Level::Debug } else { settings.log_level });

    cli::run(args, &settings)
}
