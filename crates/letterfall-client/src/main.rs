//! Letterfall Client
//!
//! Native windowed host: owns the typing session and feeds it into the
//! letterfall render plugin.

mod systems;
mod typing;

use anyhow::Context;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use letterfall_core::bevy::{LetterfallRenderPlugin, LetterfallSet, StatsStore, TypingFeed};
use letterfall_core::config::LetterfallConfig;
use letterfall_core::font::{Deferred, FontQuery, SharedGlyphSource, load_font_file, load_system_font};
use rand::seq::SliceRandom;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

use crate::systems::SessionRes;
use crate::typing::{TypingSession, WORDS};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    let font = load_font();

    let mut words: Vec<String> = WORDS.iter().map(ToString::to_string).collect();
    words.shuffle(&mut rand::rng());
    let session = TypingSession::new(words, config.impulse.clone());

    let feed = TypingFeed::new();
    let exit = App::new()
        .add_plugins(
            DefaultPlugins
                .build()
                // A single global subscriber is installed by `init_tracing`.
                .disable::<LogPlugin>()
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "letterfall".to_string(),
                        ..default()
                    }),
                    ..default()
                }),
        )
        .add_plugins(LetterfallRenderPlugin {
            config,
            font: Some(font),
            feed: Some(feed),
            stats: Some(StatsStore::default()),
        })
        .insert_resource(SessionRes(session))
        .add_systems(Startup, systems::push_first_word)
        .add_systems(
            Update,
            (systems::handle_keyboard, systems::advance_session)
                .chain()
                .before(LetterfallSet::Input),
        )
        .add_systems(Update, (systems::update_window_title, systems::update_cursor_icon))
        .run();

    match exit {
        AppExit::Success => Ok(()),
        AppExit::Error(code) => anyhow::bail!("letterfall exited with code {code}"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wgpu=error,naga=warn"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Reads the file named by `LETTERFALL_CONFIG`, or the defaults.
fn load_config() -> anyhow::Result<LetterfallConfig> {
    match std::env::var("LETTERFALL_CONFIG") {
        Ok(path) => {
            let config = LetterfallConfig::from_path(&path)
                .with_context(|| format!("failed to load config from {path}"))?;
            tracing::info!("[client] loaded config from {}", path);
            Ok(config)
        }
        Err(_) => Ok(LetterfallConfig::default()),
    }
}

/// `LETTERFALL_FONT` names a font file; otherwise a system sans-serif face.
fn load_font() -> Deferred<SharedGlyphSource> {
    match std::env::var("LETTERFALL_FONT") {
        Ok(path) => load_font_file(path),
        Err(_) => load_system_font(FontQuery::default()),
    }
}
