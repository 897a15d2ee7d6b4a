use clap::Parser;
use serial_test::serial;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use wallpaper_carousel::backend::{self, BackendSelector, Mode};
use wallpaper_carousel::cli::Cli;
use wallpaper_carousel::env::Environment;
use wallpaper_carousel::files::{self, ImageEntry};
use wallpaper_carousel::navigation::{NavigationState, MAX_STEPS_PER_POLL};
use wallpaper_carousel::preview::PreviewDebouncer;
use wallpaper_carousel::state::{self, SavedSelection};
use wallpaper_carousel::thumbs::{self, ContentSignature, ThumbnailCache};
use wallpaper_carousel::Error;

fn write_test_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 40, 200]));
    img.save(path).unwrap();
}

fn entries_from(names: &[&str], dir: &Path) -> Vec<ImageEntry> {
    names
        .iter()
        .map(|name| ImageEntry::new(dir.join(name)))
        .collect()
}

#[cfg(test)]
mod cli_args_tests {
    use super::*;

    #[test]
    fn test_picker_defaults() {
        let cli = Cli::try_parse_from(["wallpaper-carousel"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.picker.directory(), PathBuf::from("."));
        assert_eq!(cli.picker.backend, BackendSelector::Auto);
        assert_eq!(cli.picker.mode, Mode::Auto);
        assert_eq!(cli.picker.width, 1000.0);
        assert_eq!(cli.picker.height, 260.0);
        assert_eq!(cli.picker.visible_cards, 5);
        assert!(!cli.picker.no_preview);
        assert!((cli.picker.preview_delay - 0.18).abs() < f32::EPSILON);
        assert_eq!(cli.picker.transparency(), None);
    }

    #[test]
    fn test_picker_custom_values() {
        let cli = Cli::try_parse_from([
            "wallpaper-carousel",
            "/home/user/walls",
            "--backend",
            "feh",
            "--mode",
            "center",
            "--width",
            "1400",
            "--visible-cards",
            "9",
            "--no-preview",
            "--preview-delay",
            "0.4",
            "--opaque",
        ])
        .unwrap();

        assert_eq!(cli.picker.directory(), PathBuf::from("/home/user/walls"));
        assert_eq!(cli.picker.backend, BackendSelector::Feh);
        assert_eq!(cli.picker.mode, Mode::Center);
        assert_eq!(cli.picker.width, 1400.0);
        assert_eq!(cli.picker.visible_cards, 9);
        assert!(cli.picker.no_preview);
        assert_eq!(cli.picker.transparency(), Some(false));
    }

    #[test]
    fn test_restore_subcommand() {
        let cli =
            Cli::try_parse_from(["wallpaper-carousel", "restore", "--backend", "gnome"]).unwrap();
        match cli.command {
            Some(wallpaper_carousel::Command::Restore { backend }) => {
                assert_eq!(backend, BackendSelector::Gnome);
            }
            _ => panic!("expected restore subcommand"),
        }
    }

    #[test]
    fn test_diagnose_subcommand() {
        let cli = Cli::try_parse_from(["wallpaper-carousel", "diagnose"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(wallpaper_carousel::Command::Diagnose)
        ));
    }

    #[test]
    fn test_x_requires_y() {
        let result = Cli::try_parse_from(["wallpaper-carousel", "--x", "100"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["wallpaper-carousel", "--x", "100", "--y", "50"]).unwrap();
        assert_eq!(cli.picker.x, Some(100.0));
        assert_eq!(cli.picker.y, Some(50.0));
    }

    #[test]
    fn test_transparent_conflicts_with_opaque() {
        let result = Cli::try_parse_from(["wallpaper-carousel", "--transparent", "--opaque"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_visible_cards_capped_and_forced_odd() {
        let mut cli = Cli::try_parse_from(["wallpaper-carousel"]).unwrap();

        cli.picker.visible_cards = 4;
        assert_eq!(cli.picker.effective_visible_cards(), 3);

        cli.picker.visible_cards = 99;
        assert_eq!(cli.picker.effective_visible_cards(), 15);

        cli.picker.visible_cards = 0;
        assert_eq!(cli.picker.effective_visible_cards(), 1);

        cli.picker.visible_cards = 7;
        assert_eq!(cli.picker.effective_visible_cards(), 7);
    }
}

#[cfg(test)]
mod listing_tests {
    use super::*;

    #[test]
    fn test_is_image_file_extensions() {
        let valid = ["a.jpg", "b.jpeg", "c.png", "d.gif", "e.bmp", "f.webp", "G.PNG"];
        for name in valid {
            assert!(files::is_image_file(Path::new(name)), "failed for {name}");
        }

        let invalid = ["a.txt", "b.mp4", "no_extension", "c."];
        for name in invalid {
            assert!(!files::is_image_file(Path::new(name)), "failed for {name}");
        }
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        write_test_png(&base.join("Banana.png"), 4, 4);
        write_test_png(&base.join("apple.png"), 4, 4);
        write_test_png(&base.join("cherry.PNG"), 4, 4);
        std::fs::write(base.join("notes.txt"), b"not an image").unwrap();
        std::fs::create_dir(base.join("nested")).unwrap();
        write_test_png(&base.join("nested").join("deep.png"), 4, 4);

        let listed = files::list_images(base);
        let names: Vec<String> = listed.iter().map(|e| e.file_name()).collect();

        // Top level only, case-insensitive lexicographic order.
        assert_eq!(names, vec!["apple.png", "Banana.png", "cherry.PNG"]);
    }

    #[test]
    fn test_list_images_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["z.png", "m.png", "a.png"] {
            write_test_png(&temp_dir.path().join(name), 4, 4);
        }

        let first = files::list_images(temp_dir.path());
        let second = files::list_images(temp_dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_images_missing_directory() {
        let listed = files::list_images(Path::new("/nonexistent/wallpapers"));
        assert!(listed.is_empty());
    }
}

#[cfg(test)]
mod navigation_tests {
    use super::*;

    fn tap(nav: &mut NavigationState, direction: i8) -> i32 {
        let delta = nav.poll(direction, 0.016);
        nav.poll(0, 0.016);
        delta
    }

    #[test]
    fn test_wraparound_forward() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png", "d.png", "e.png"],
            Path::new("/walls"),
        ));

        for _ in 0..5 {
            assert_eq!(tap(&mut nav, 1), 1);
        }
        // Five steps over five entries comes back around.
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_wraparound_backward() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png"],
            Path::new("/walls"),
        ));

        assert_eq!(tap(&mut nav, -1), -1);
        assert_eq!(nav.selected(), Some(2));
    }

    #[test]
    fn test_index_stays_in_range() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png", "d.png"],
            Path::new("/walls"),
        ));

        for step in 0..200 {
            let direction = if step % 3 == 0 { -1 } else { 1 };
            nav.poll(direction, 0.05);
            let selected = nav.selected().unwrap();
            assert!(selected < nav.len());
        }
    }

    #[test]
    fn test_empty_sequence_has_no_selection() {
        let mut nav = NavigationState::new(Vec::new());
        assert_eq!(nav.selected(), None);
        assert!(nav.current().is_none());
        assert_eq!(nav.poll(1, 0.016), 0);
    }

    #[test]
    fn test_single_entry_never_moves() {
        let mut nav = NavigationState::new(entries_from(&["only.png"], Path::new("/walls")));
        assert_eq!(nav.poll(1, 5.0), 0);
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_bounded_steps_per_poll() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png", "d.png", "e.png", "f.png", "g.png", "h.png"],
            Path::new("/walls"),
        ));

        nav.poll(1, 0.016);
        // A pathological frame stall must not burst past the bound.
        let delta = nav.poll(1, 30.0);
        assert!(delta.abs() <= MAX_STEPS_PER_POLL);

        let delta = nav.poll(1, 30.0);
        assert!(delta.abs() <= MAX_STEPS_PER_POLL);
    }

    #[test]
    fn test_hold_accelerates_monotonically() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png", "d.png", "e.png"],
            Path::new("/walls"),
        ));

        let dt = 0.02;
        let frames_per_second = (1.0 / dt) as usize;
        let mut per_second = Vec::new();
        nav.poll(1, dt);
        for _ in 0..4 {
            let mut steps = 0i32;
            for _ in 0..frames_per_second {
                steps += nav.poll(1, dt).abs();
            }
            per_second.push(steps);
        }

        // Later hold seconds never step slower than earlier ones.
        for pair in per_second.windows(2) {
            assert!(pair[1] >= pair[0], "steps per second decreased: {per_second:?}");
        }
        assert!(per_second[3] > per_second[0]);
    }

    #[test]
    fn test_refresh_keeps_selection_by_path() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png"],
            Path::new("/walls"),
        ));
        tap(&mut nav, 1);
        assert_eq!(nav.selected(), Some(1));

        // b.png survives the rescan at a different index.
        nav.refresh(entries_from(&["a.png", "ab.png", "b.png"], Path::new("/walls")));
        assert_eq!(nav.selected(), Some(2));
    }

    #[test]
    fn test_refresh_resets_when_path_gone() {
        let mut nav = NavigationState::new(entries_from(
            &["a.png", "b.png", "c.png"],
            Path::new("/walls"),
        ));
        tap(&mut nav, 1);

        nav.refresh(entries_from(&["a.png", "c.png"], Path::new("/walls")));
        assert_eq!(nav.selected(), Some(0));
    }

    #[test]
    fn test_refresh_to_empty() {
        let mut nav = NavigationState::new(entries_from(&["a.png"], Path::new("/walls")));
        nav.refresh(Vec::new());
        assert_eq!(nav.selected(), None);
    }
}

#[cfg(test)]
mod debouncer_tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(180);

    #[test]
    fn test_fires_once_after_settle() {
        let mut debouncer = PreviewDebouncer::new(DELAY, true);
        let t0 = Instant::now();

        debouncer.on_navigate(3, t0);
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(50)), None);
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(200)), Some(3));
        // The settle period is consumed; nothing fires again until the next
        // navigation event.
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(400)), None);
    }

    #[test]
    fn test_rapid_navigation_fires_nothing_until_rest() {
        let mut debouncer = PreviewDebouncer::new(DELAY, true);
        let t0 = Instant::now();

        for i in 0..10 {
            let at = t0 + Duration::from_millis(i * 40);
            debouncer.on_navigate(i as usize, at);
            assert_eq!(debouncer.tick(at + Duration::from_millis(10)), None);
        }

        let rest = t0 + Duration::from_millis(9 * 40);
        assert_eq!(debouncer.tick(rest + DELAY), Some(9));
    }

    #[test]
    fn test_skips_already_applied_index() {
        let mut debouncer = PreviewDebouncer::new(DELAY, true);
        let t0 = Instant::now();

        debouncer.on_navigate(2, t0);
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(200)), Some(2));
        debouncer.mark_applied(2);

        debouncer.on_navigate(2, t0 + Duration::from_millis(300));
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(600)), None);
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut debouncer = PreviewDebouncer::new(DELAY, false);
        let t0 = Instant::now();

        debouncer.on_navigate(1, t0);
        assert_eq!(debouncer.tick(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_zero_delay_degrades_to_every_move() {
        let mut debouncer = PreviewDebouncer::new(Duration::ZERO, true);
        let t0 = Instant::now();

        debouncer.on_navigate(1, t0);
        assert_eq!(debouncer.tick(t0), Some(1));
        debouncer.mark_applied(1);

        debouncer.on_navigate(2, t0 + Duration::from_millis(1));
        assert_eq!(debouncer.tick(t0 + Duration::from_millis(1)), Some(2));
    }

    #[test]
    fn test_reset_forgets_pending_and_applied() {
        let mut debouncer = PreviewDebouncer::new(DELAY, true);
        let t0 = Instant::now();

        debouncer.on_navigate(4, t0);
        debouncer.mark_applied(4);
        debouncer.reset();

        assert_eq!(debouncer.tick(t0 + Duration::from_secs(1)), None);
        debouncer.on_navigate(4, t0 + Duration::from_secs(1));
        assert_eq!(debouncer.tick(t0 + Duration::from_secs(2)), Some(4));
    }
}

#[cfg(test)]
mod auto_mode_tests {
    use super::*;

    const FHD: (u32, u32) = (1920, 1080);

    #[test]
    fn test_large_same_orientation_fills() {
        assert_eq!(backend::resolve_auto_mode(Some((3000, 2000)), FHD), Mode::Fill);
    }

    #[test]
    fn test_small_image_centers() {
        assert_eq!(backend::resolve_auto_mode(Some((400, 300)), FHD), Mode::Center);
    }

    #[test]
    fn test_portrait_on_landscape_centers() {
        assert_eq!(backend::resolve_auto_mode(Some((1000, 3000)), FHD), Mode::Center);
    }

    #[test]
    fn test_extreme_aspect_mismatch_centers() {
        assert_eq!(backend::resolve_auto_mode(Some((5000, 1000)), FHD), Mode::Center);
    }

    #[test]
    fn test_large_squareish_fits() {
        assert_eq!(backend::resolve_auto_mode(Some((2000, 2000)), FHD), Mode::Fit);
    }

    #[test]
    fn test_unknown_size_fills() {
        assert_eq!(backend::resolve_auto_mode(None, FHD), Mode::Fill);
    }

    #[test]
    fn test_degenerate_screen_fills() {
        assert_eq!(backend::resolve_auto_mode(Some((3000, 2000)), (0, 0)), Mode::Fill);
    }
}

#[cfg(test)]
mod signature_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_signature_changes_with_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("img.png");

        std::fs::write(&file, b"one").unwrap();
        let first = ContentSignature::probe(&file).unwrap();

        std::fs::write(&file, b"longer content").unwrap();
        let second = ContentSignature::probe(&file).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_signature_missing_file() {
        assert!(ContentSignature::probe(Path::new("/nonexistent/img.png")).is_none());
    }
}

#[cfg(test)]
mod thumbnail_hash_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_hash_is_stable_sha1_hex() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("img.png");
        write_test_png(&file, 4, 4);

        let first = thumbs::thumbnail_hash(&file);
        let second = thumbs::thumbnail_hash(&file);

        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    #[serial]
    fn test_hash_differs_per_path() {
        let temp_dir = TempDir::new().unwrap();
        let one = temp_dir.path().join("one.png");
        let two = temp_dir.path().join("two.png");
        write_test_png(&one, 4, 4);
        write_test_png(&two, 4, 4);

        assert_ne!(thumbs::thumbnail_hash(&one), thumbs::thumbnail_hash(&two));
    }
}

#[cfg(test)]
mod thumbnail_cache_tests {
    use super::*;
    use wallpaper_carousel::ThumbStatus;

    fn wait_for_completion(cache: &mut ThumbnailCache, path: &Path) -> Vec<ThumbStatus> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            for (done_path, status) in cache.poll() {
                if done_path == path {
                    seen.push(status);
                }
            }
            match cache.status(&ImageEntry::new(path.to_path_buf())) {
                Some(status) if !status.is_pending() => return seen,
                _ => std::thread::sleep(Duration::from_millis(10)),
            }
        }
        panic!("thumbnail generation timed out for {}", path.display());
    }

    #[test]
    #[serial]
    fn test_generation_reports_ready_and_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("img.png");
        write_test_png(&source, 320, 200);

        let mut cache =
            ThumbnailCache::with_limits(temp_dir.path().join("cache"), 64, 64).unwrap();
        let entry = ImageEntry::new(source.clone());

        assert!(cache.get_or_generate(&entry).is_pending());
        wait_for_completion(&mut cache, &source);

        assert!(cache.status(&entry).unwrap().is_ready());
        assert_eq!(cache.native_dimensions(&entry), Some((320, 200)));
    }

    #[test]
    #[serial]
    fn test_concurrent_requests_coalesce() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("img.png");
        write_test_png(&source, 640, 400);

        let mut cache =
            ThumbnailCache::with_limits(temp_dir.path().join("cache"), 64, 64).unwrap();
        let entry = ImageEntry::new(source.clone());

        // Both requests land before the background job finishes.
        assert!(cache.get_or_generate(&entry).is_pending());
        assert!(cache.get_or_generate(&entry).is_pending());

        let completions = wait_for_completion(&mut cache, &source);
        // Linger briefly in case a duplicate job were still in flight.
        std::thread::sleep(Duration::from_millis(100));
        let late: Vec<_> = cache.poll();

        assert_eq!(completions.len() + late.len(), 1);
    }

    #[test]
    #[serial]
    fn test_failed_decode_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.jpg");
        std::fs::write(&source, b"this is not a jpeg").unwrap();

        let mut cache =
            ThumbnailCache::with_limits(temp_dir.path().join("cache"), 64, 64).unwrap();
        let entry = ImageEntry::new(source.clone());

        cache.get_or_generate(&entry);
        wait_for_completion(&mut cache, &source);

        assert!(cache.status(&entry).unwrap().is_failed());
        // No retry: the record stays failed without a new job.
        assert!(cache.get_or_generate(&entry).is_failed());
    }

    #[test]
    #[serial]
    fn test_sidecar_round_trip_preserves_native_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let cache_root = temp_dir.path().join("cache");
        let source = temp_dir.path().join("img.png");
        write_test_png(&source, 500, 250);
        let entry = ImageEntry::new(source.clone());

        {
            let mut cache = ThumbnailCache::with_limits(cache_root.clone(), 64, 64).unwrap();
            cache.get_or_generate(&entry);
            wait_for_completion(&mut cache, &source);
            assert!(cache.thumb_path(&source).exists());
            assert!(cache.meta_path(&source).exists());
        }

        // A fresh process sees the sidecar and never needs the full image.
        let mut cache = ThumbnailCache::with_limits(cache_root, 64, 64).unwrap();
        assert_eq!(cache.native_dimensions(&entry), Some((500, 250)));

        cache.get_or_generate(&entry);
        wait_for_completion(&mut cache, &source);
        assert!(cache.status(&entry).unwrap().is_ready());
    }

    #[test]
    #[serial]
    fn test_stale_signature_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let cache_root = temp_dir.path().join("cache");
        let source = temp_dir.path().join("img.png");
        write_test_png(&source, 100, 100);
        let entry = ImageEntry::new(source.clone());

        {
            let mut cache = ThumbnailCache::with_limits(cache_root.clone(), 64, 64).unwrap();
            cache.get_or_generate(&entry);
            wait_for_completion(&mut cache, &source);
        }

        // Replace the source; size changes, so the stored signature is stale.
        write_test_png(&source, 300, 120);

        let mut cache = ThumbnailCache::with_limits(cache_root, 64, 64).unwrap();
        cache.get_or_generate(&entry);
        wait_for_completion(&mut cache, &source);

        assert_eq!(cache.native_dimensions(&entry), Some((300, 120)));
    }

    #[test]
    #[serial]
    fn test_invalidate_removes_sidecar_pair() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("img.png");
        write_test_png(&source, 100, 100);

        let mut cache =
            ThumbnailCache::with_limits(temp_dir.path().join("cache"), 64, 64).unwrap();
        let entry = ImageEntry::new(source.clone());
        cache.get_or_generate(&entry);
        wait_for_completion(&mut cache, &source);

        cache.invalidate(&entry);

        assert!(cache.status(&entry).is_none());
        assert!(!cache.thumb_path(&source).exists());
        assert!(!cache.meta_path(&source).exists());
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    #[serial]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("nested").join("last_selection.json");

        let record = SavedSelection::new(PathBuf::from("/walls/sunset.png"), Mode::Fill, "feh");
        state::save_selection(&state_file, &record).unwrap();

        assert!(state_file.exists());
        let loaded = state::load_selection(&state_file).unwrap();
        assert_eq!(loaded, record);
        assert!(!loaded.timestamp.is_empty());
    }

    #[test]
    fn test_load_missing_state() {
        let result = state::load_selection(Path::new("/nonexistent/last_selection.json"));
        assert!(matches!(result, Err(Error::NoSavedSelection)));
    }

    #[test]
    #[serial]
    fn test_load_corrupt_state() {
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("last_selection.json");
        std::fs::write(&state_file, b"{ not json").unwrap();

        let result = state::load_selection(&state_file);
        assert!(matches!(result, Err(Error::NoSavedSelection)));
    }
}

#[cfg(test)]
mod environment_tests {
    use super::*;

    #[test]
    fn test_gnome_session_detection() {
        let env = Environment {
            current_desktop: "ubuntu:GNOME".to_string(),
            ..Environment::default()
        };
        assert!(env.is_gnome_session());

        let env = Environment {
            current_desktop: "KDE".to_string(),
            ..Environment::default()
        };
        assert!(!env.is_gnome_session());
    }

    #[test]
    fn test_x11_and_wayland_detection() {
        let env = Environment {
            x_display: ":0".to_string(),
            ..Environment::default()
        };
        assert!(env.is_x11());
        assert!(!env.is_wayland());

        let env = Environment {
            session_type: "wayland".to_string(),
            ..Environment::default()
        };
        assert!(env.is_wayland());
    }

    #[test]
    #[serial]
    fn test_detect_finds_executables_on_path() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let fake_feh = temp_dir.path().join("feh");
        std::fs::write(&fake_feh, b"#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&fake_feh, std::fs::Permissions::from_mode(0o755)).unwrap();

        let original_path = std::env::var_os("PATH");
        std::env::set_var("PATH", temp_dir.path());

        let env = Environment::detect();

        match original_path {
            Some(value) => std::env::set_var("PATH", value),
            None => std::env::remove_var("PATH"),
        }

        assert!(env.has_command("feh"));
        assert!(!env.has_command("gsettings"));
    }
}

#[cfg(test)]
mod backend_selection_tests {
    use super::*;

    #[test]
    fn test_no_backend_is_fatal() {
        let env = Environment::default();
        let result = backend::select_backend(&env, BackendSelector::Auto);
        assert!(matches!(result, Err(Error::NoBackend(_))));
    }

    #[test]
    fn test_auto_prefers_gnome_over_feh() {
        let env = Environment {
            current_desktop: "GNOME".to_string(),
            x_display: ":0".to_string(),
            ..Environment::with_commands(["gsettings", "feh"])
        };
        let chosen = backend::select_backend(&env, BackendSelector::Auto).unwrap();
        assert_eq!(chosen.id(), "gnome");
    }

    #[test]
    fn test_auto_falls_back_to_feh_on_x11() {
        let env = Environment {
            x_display: ":0".to_string(),
            ..Environment::with_commands(["feh"])
        };
        let chosen = backend::select_backend(&env, BackendSelector::Auto).unwrap();
        assert_eq!(chosen.id(), "feh");
    }

    #[test]
    fn test_explicit_unavailable_backend_errors() {
        let env = Environment::default();
        let result = backend::select_backend(&env, BackendSelector::Feh);
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }

    #[test]
    fn test_feh_needs_x11() {
        // The binary alone is not enough outside an X session.
        let env = Environment::with_commands(["feh"]);
        let result = backend::select_backend(&env, BackendSelector::Feh);
        assert!(result.is_err());
    }

    #[test]
    fn test_diagnostics_lists_backends() {
        let env = Environment::default();
        let report = backend::diagnostics(&env);
        assert!(report.contains("Backends:"));
        assert!(report.contains("gnome:"));
        assert!(report.contains("feh:"));
        assert!(report.contains("Auto backend:"));
    }

    #[test]
    fn test_path_from_uri_decodes_percent_escapes() {
        let path = backend::path_from_uri("file:///walls/two%20words.png").unwrap();
        assert_eq!(path, PathBuf::from("/walls/two words.png"));

        assert!(backend::path_from_uri("https://example.com/x.png").is_none());
        assert!(backend::path_from_uri("file://").is_none());
    }
}
