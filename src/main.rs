use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;

use wallpaper_carousel::app::PickerApp;
use wallpaper_carousel::backend::{self, BackendSelector, WallpaperBackend};
use wallpaper_carousel::cli::{Cli, Command, PickerArgs};
use wallpaper_carousel::env::Environment;
use wallpaper_carousel::session::SelectionSession;
use wallpaper_carousel::state;
use wallpaper_carousel::thumbs::ThumbnailCache;
use wallpaper_carousel::WINDOW_TITLE;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Restore { backend }) => run_restore(backend),
        Some(Command::Diagnose) => run_diagnose(),
        None => run_picker(cli.picker),
    }
}

fn run_picker(args: PickerArgs) -> anyhow::Result<()> {
    let env = Environment::detect();
    let backend = backend::select_backend(&env, args.backend)
        .map_err(|err| anyhow::anyhow!("{err}\n\n{}", backend::diagnostics(&env)))?;
    let backend: Arc<dyn WallpaperBackend> = Arc::from(backend);
    info!("using backend '{}'", backend.id());

    let delay = Duration::from_secs_f32(args.preview_delay.max(0.0));
    let session = SelectionSession::new(
        args.directory(),
        backend,
        args.mode,
        delay,
        !args.no_preview,
        state::state_file_path(),
    )?;
    let cache = ThumbnailCache::new(ThumbnailCache::default_root())?;

    // Wayland compositors generally refuse transparent overrides here, so
    // default to opaque there unless the user forces it.
    let transparent = args.transparency().unwrap_or_else(|| !env.is_wayland());

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([args.width, args.height])
        .with_decorations(false)
        .with_always_on_top()
        .with_transparent(transparent)
        .with_title(WINDOW_TITLE);
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let app = PickerApp::new(session, cache, args, transparent);
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| Ok(Box::new(app) as Box<dyn eframe::App>)),
    )
    .map_err(|err| anyhow::anyhow!("failed to run overlay window: {err:?}"))
}

fn run_restore(selector: BackendSelector) -> anyhow::Result<()> {
    let env = Environment::detect();
    let state_path = state::state_file_path().context("no usable state directory")?;
    let saved = state::load_selection(&state_path)?;

    let backend = match selector {
        // Prefer the backend that confirmed the selection, if it still works.
        BackendSelector::Auto => match backend::backend_by_id(&saved.backend) {
            Some(preferred) if preferred.available(&env) => preferred,
            _ => backend::select_backend(&env, BackendSelector::Auto)
                .map_err(|err| anyhow::anyhow!("{err}\n\n{}", backend::diagnostics(&env)))?,
        },
        other => backend::select_backend(&env, other)
            .map_err(|err| anyhow::anyhow!("{err}\n\n{}", backend::diagnostics(&env)))?,
    };

    backend.apply(&saved.path, saved.mode)?;
    info!("restored {} via '{}'", saved.path.display(), backend.id());
    Ok(())
}

fn run_diagnose() -> anyhow::Result<()> {
    println!("{}", backend::diagnostics(&Environment::detect()));
    Ok(())
}
