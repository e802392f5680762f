// UI layer: the interactive main menu. It is a small explicit state machine
// driven through a context object (settings, prompt, tool runner) so the
// whole flow can be exercised without a terminal or the real tool.

use crate::auth::CredentialResolver;
use crate::batch::{BatchManifest, BatchRunner};
use crate::config::Settings;
use crate::error::ManifestError;
use crate::prompt::Prompt;
use crate::session::{DownloadTarget, ToolRunner};
use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, error, info};

const HELP_TEXT: &str = "
Gallery-dl Terminal Utility

Options:
1. Download Single: Enter a single URL to download.
2. Bulk Download: Download every URL listed in the manifest file.
3. Setup: Create or overwrite the manifest file and the cookie directory.
4. Update: Check for and install updates of the download tool.
5. Help: Show this help message.
6. Exit: Quit the program.

Downloads go to the configured download directory; already downloaded
items are skipped through the tool's download archive.";

/// Actions reachable from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    DownloadSingle,
    BulkDownload,
    Setup,
    Update,
    Help,
    Exit,
}

impl MenuAction {
    /// Parse a single-digit menu choice.
    pub fn from_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuAction::DownloadSingle),
            "2" => Some(MenuAction::BulkDownload),
            "3" => Some(MenuAction::Setup),
            "4" => Some(MenuAction::Update),
            "5" => Some(MenuAction::Help),
            "6" => Some(MenuAction::Exit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    MainMenu,
    AwaitingChoice,
    Running(MenuAction),
    Terminated,
}

/// Everything an action may touch.
pub struct AppContext<'a> {
    pub settings: &'a Settings,
    pub prompt: &'a mut dyn Prompt,
    pub tool: &'a mut dyn ToolRunner,
}

pub struct MenuController<'a> {
    ctx: AppContext<'a>,
    state: MenuState,
}

impl<'a> MenuController<'a> {
    pub fn new(ctx: AppContext<'a>) -> Self {
        MenuController {
            ctx,
            state: MenuState::MainMenu,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    /// Run until the operator exits (or input goes away).
    pub fn run(&mut self) {
        while self.state != MenuState::Terminated {
            self.step();
        }
    }

    /// Perform one transition.
    pub fn step(&mut self) {
        self.state = match self.state {
            MenuState::MainMenu => {
                self.show_menu();
                MenuState::AwaitingChoice
            }
            MenuState::AwaitingChoice => self.read_choice(),
            MenuState::Running(MenuAction::Exit) => {
                self.ctx.prompt.say("\nExiting the program. Goodbye!");
                MenuState::Terminated
            }
            MenuState::Running(action) => {
                self.dispatch(action);
                MenuState::MainMenu
            }
            MenuState::Terminated => MenuState::Terminated,
        };
    }

    fn show_menu(&mut self) {
        let prompt = &mut *self.ctx.prompt;
        prompt.say("\nMain Menu:");
        prompt.say("1. Download Single");
        prompt.say("2. Bulk Download");
        prompt.say("3. Setup");
        prompt.say("4. Update");
        prompt.say("5. Help");
        prompt.say("6. Exit");
    }

    fn read_choice(&mut self) -> MenuState {
        match self.ctx.prompt.line("Choose an option (1-6)") {
            Ok(input) => match MenuAction::from_choice(&input) {
                Some(action) => MenuState::Running(action),
                None => {
                    self.ctx
                        .prompt
                        .warn("Invalid choice. Please enter a number between 1 and 6.");
                    MenuState::AwaitingChoice
                }
            },
            Err(e) => {
                info!("input closed, leaving menu: {}", e);
                MenuState::Terminated
            }
        }
    }

    /// Run one action; whatever goes wrong is reported here and never
    /// leaves the menu loop.
    fn dispatch(&mut self, action: MenuAction) {
        debug!(?action, "running menu action");
        let result = match action {
            MenuAction::DownloadSingle => self.download_single(),
            MenuAction::BulkDownload => self.bulk_download(),
            MenuAction::Setup => self.setup(),
            MenuAction::Update => self.update(),
            MenuAction::Help => {
                self.ctx.prompt.say(HELP_TEXT);
                Ok(())
            }
            MenuAction::Exit => Ok(()),
        };
        if let Err(e) = result {
            error!(?action, "action failed: {:#}", e);
            self.ctx.prompt.warn(&format!("Error: {:#}", e));
        }
    }

    fn download_single(&mut self) -> Result<()> {
        let url = self
            .ctx
            .prompt
            .line("Enter the URL to download")
            .context("reading URL")?;
        let url = url.trim();
        if url.is_empty() {
            self.ctx.prompt.say("No URL entered.");
            return Ok(());
        }

        let auth = CredentialResolver::new(self.ctx.settings).resolve(&mut *self.ctx.prompt);
        let target = DownloadTarget::new(url, auth);
        self.ctx
            .tool
            .download(&target)
            .with_context(|| format!("downloading {}", target.url))?;
        self.ctx.prompt.say("Download complete.");
        Ok(())
    }

    fn bulk_download(&mut self) -> Result<()> {
        let settings = self.ctx.settings;
        let path = &settings.manifest_file;
        let manifest = match BatchManifest::load(path) {
            Ok(manifest) => manifest,
            Err(ManifestError::PathNotFound(_)) => {
                self.ctx.prompt.warn(&format!(
                    "{} not found. Run Setup to create it.",
                    path.display()
                ));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if manifest.is_empty() {
            self.ctx
                .prompt
                .say(&format!("{} contains no URLs. Nothing to do.", path.display()));
            return Ok(());
        }

        let auth = CredentialResolver::new(settings).resolve(&mut *self.ctx.prompt);
        let prompt = &mut *self.ctx.prompt;
        let report = BatchRunner::run_all(&manifest, &auth, &mut *self.ctx.tool, |i, n, url| {
            prompt.say(&format!("\nProcessing URL {}/{}: {}", i, n, url))
        });

        for failure in report.failures() {
            if let Err(e) = &failure.result {
                prompt.warn(&format!("Failed to download {}: {}", failure.url, e));
            }
        }
        prompt.say(&format!(
            "\nBulk download finished: {} succeeded, {} failed.",
            report.succeeded(),
            report.failed()
        ));
        Ok(())
    }

    /// Write the manifest interactively and make sure the cookie directory
    /// exists. Declining the overwrite question cancels.
    fn setup(&mut self) -> Result<()> {
        let settings = self.ctx.settings;
        let prompt = &mut *self.ctx.prompt;
        let path = &settings.manifest_file;

        if path.exists() {
            let overwrite = prompt
                .confirm(&format!("{} already exists. Overwrite it?", path.display()), false)
                .context("reading confirmation")?;
            if !overwrite {
                prompt.say("Setup cancelled.");
                return Ok(());
            }
        }

        prompt.say("Enter one URL per line. Submit an empty line to finish.");
        let mut urls = Vec::new();
        loop {
            let line = prompt
                .line(&format!("URL #{}", urls.len() + 1))
                .context("reading URL")?;
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            urls.push(line.to_string());
        }

        let mut contents = urls.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), count = urls.len(), "manifest written");
        prompt.say(&format!("Saved {} URL(s) to {}.", urls.len(), path.display()));

        if !settings.cookie_dir.exists() {
            fs::create_dir_all(&settings.cookie_dir)
                .with_context(|| format!("creating {}", settings.cookie_dir.display()))?;
            prompt.say(&format!(
                "Created {} - put cookie files there to use them for authentication.",
                settings.cookie_dir.display()
            ));
        }
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.ctx
            .prompt
            .say("\nChecking for download tool updates...");
        self.ctx.tool.update().context("updating download tool")?;
        self.ctx.prompt.say("Update check completed successfully.");
        Ok(())
    }
}
