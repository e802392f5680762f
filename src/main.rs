// Entrypoint for the menu application.
// - Keeps `main` small: load settings, build the tool session and hand both
//   to the menu loop.
// - Returns `anyhow::Result` so a broken settings file is reported cleanly.

use anyhow::Context;
use clap::Parser;
use gallery_dl_menu::cli::{init_logging, Cli};
use gallery_dl_menu::config::Settings;
use gallery_dl_menu::prompt::ConsolePrompt;
use gallery_dl_menu::session::DownloadSession;
use gallery_dl_menu::ui::{AppContext, MenuController};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    info!("gallery-dl-menu v{} starting", env!("CARGO_PKG_VERSION"));

    let mut settings =
        Settings::load_or_create(cli.config.as_deref()).context("loading settings")?;
    if let Some(tool) = cli.tool {
        settings.tool = tool;
    }

    let mut prompt = ConsolePrompt::new();
    let mut tool = DownloadSession::new(settings.clone());

    println!("Gallery-dl Terminal Utility");
    // Blocks until the user chooses "Exit".
    MenuController::new(AppContext {
        settings: &settings,
        prompt: &mut prompt,
        tool: &mut tool,
    })
    .run();
    Ok(())
}
