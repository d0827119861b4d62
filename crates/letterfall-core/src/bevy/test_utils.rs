//! Test utilities for headless Bevy integration tests.
//!
//! Provides `TestApp`, a wrapper around `bevy::app::App` that uses
//! `MinimalPlugins` + `LetterfallHeadlessPlugin` so the render loop can be
//! driven without a window or GPU.

use bevy::prelude::*;

use crate::bevy::plugin::LetterfallHeadlessPlugin;
use crate::bevy::resources::{LetterfallRes, StatsStore, TypingCommand, TypingFeed};
use crate::config::LetterfallConfig;
use crate::letter::LetterStats;
use crate::render_loop::RenderLoop;

pub(crate) struct TestApp {
    pub app: App,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(LetterfallConfig::default())
    }

    pub fn with_config(config: LetterfallConfig) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(LetterfallHeadlessPlugin {
            config,
            ..Default::default()
        });
        // Pause virtual time so only `step_frames` runs FixedUpdate.
        app.world_mut().resource_mut::<Time<Virtual>>().pause();
        // Runs Startup, which arms the render loop.
        app.update();
        Self { app }
    }

    pub fn update(&mut self) {
        self.app.update();
    }

    /// Runs exactly `n` fixed steps, i.e. `n` render-loop frames.
    pub fn step_frames(&mut self, n: usize) {
        let dt = std::time::Duration::from_secs_f32(
            self.render_loop().config().physics.dt,
        );
        for _ in 0..n {
            self.app
                .world_mut()
                .resource_mut::<Time<Fixed>>()
                .accumulate_overstep(dt);
            self.app.update();
        }
    }

    pub fn push(&mut self, command: TypingCommand) {
        self.app.world().resource::<TypingFeed>().push(command);
    }

    /// Feeds text and runs one update to apply it.
    pub fn sync_text(&mut self, history: &[&str], current: &str) {
        self.push(TypingCommand::SyncText {
            history: history.iter().map(ToString::to_string).collect(),
            current: current.to_string(),
        });
        self.update();
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.app.world().resource::<LetterfallRes>().render_loop
    }

    pub fn stats(&self) -> LetterStats {
        self.app.world().resource::<StatsStore>().get()
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }
}
