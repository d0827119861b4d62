//! Frame scheduling systems.

use bevy::prelude::*;

use crate::bevy::{LettersExpiredEvent, LetterfallRes, StatsStore};
use crate::render_loop::FrameOutcome;

pub fn start_render_loop(mut res: ResMut<LetterfallRes>) {
    res.render_loop.start();
}

/// Runs one render-loop frame per fixed step.
pub fn advance_frame(mut res: ResMut<LetterfallRes>, mut expired: MessageWriter<LettersExpiredEvent>) {
    let FrameOutcome::Rendered(report) = res.render_loop.tick() else {
        return;
    };
    if !report.expired.is_empty() {
        tracing::info!(
            "[letterfall] frame {}: {} letters expired",
            report.frame,
            report.expired.len()
        );
        expired.write(LettersExpiredEvent {
            ids: report.expired,
            stats: report.stats,
        });
    }
}

pub fn publish_stats(res: Res<LetterfallRes>, store: Res<StatsStore>) {
    store.set(res.render_loop.stats());
}

pub fn teardown_on_exit(mut exits: MessageReader<AppExit>, mut res: ResMut<LetterfallRes>) {
    if exits.read().next().is_some() {
        res.render_loop.teardown();
    }
}
