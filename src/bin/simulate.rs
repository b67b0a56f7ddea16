use clap::Parser;
use log::Level;
use rank_merge_rust_server::config::{ConfigError, GameConfig};
use rank_merge_rust_server::engine::GameEngine;
use rank_merge_rust_server::logging::{self, emit_log, LogContext};
use rank_merge_rust_server::physics::sandbox::SandboxWorld;
use rank_merge_rust_server::ranks::{self, RankId};
use rank_merge_rust_server::rng::Rng;
use rank_merge_rust_server::types::{GameOverReason, RuntimeEvent, Snapshot};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_MAX_TICKS: u64 = 60 * 60 * 20;
const POLICY_SEED_SALT: u32 = 0x9e37_79b9;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_ticks: Option<u64>,
    #[arg(long, default_value_t = 1)]
    games: u32,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct GameResultLine {
    game: u32,
    seed: u32,
    reason: String,
    score: u64,
    merges: u32,
    drops: u32,
    #[serde(rename = "highestRankId")]
    highest_rank_id: Option<RankId>,
    #[serde(rename = "highestRankName")]
    highest_rank_name: Option<&'static str>,
    ticks: u64,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct GameRunResult {
    result: GameResultLine,
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "gameCount")]
    game_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageScore")]
    average_score: u64,
    #[serde(rename = "bestScore")]
    best_score: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    games: Vec<GameResultLine>,
}

struct AutoPlayer {
    rng: Rng,
    target_x: f32,
    min_x: f32,
    max_x: f32,
}

impl AutoPlayer {
    fn new(seed: u32, config: &GameConfig) -> Self {
        let mut rng = Rng::new(seed ^ POLICY_SEED_SALT);
        let min_x = config.follow_left_x;
        let max_x = config.follow_right_x;
        let target_x = rng.range_f32(min_x, max_x);
        Self {
            rng,
            target_x,
            min_x,
            max_x,
        }
    }

    fn next_target(&mut self) {
        self.target_x = self.rng.range_f32(self.min_x, self.max_x);
    }

    fn act(&mut self, can_drop: bool) -> bool {
        if !can_drop {
            return false;
        }
        if self.rng.chance(0.05) {
            self.next_target();
            return false;
        }
        true
    }
}

fn main() {
    let _ = logging::init();
    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let base_seed = normalize_seed(cli.seed.unwrap_or(run_started_at_ms));
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(base_seed, run_started_at_ms));
    let run_context = LogContext::for_match(&match_id);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            emit_log(
                Level::Error,
                "config_load_failed",
                &run_context,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };
    let max_ticks = cli.max_ticks.unwrap_or(DEFAULT_MAX_TICKS).max(1);

    let mut has_anomaly = false;
    let mut results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for game in 0..cli.games.max(1) {
        let seed = base_seed.wrapping_add(game);
        let game_context = LogContext::for_match(&match_id).with_seed(seed);
        emit_log(
            Level::Info,
            "game_started",
            &game_context,
            json!({ "game": game, "maxTicks": max_ticks }),
        );

        let run = run_game(game, seed, &config, max_ticks);
        for anomaly in &run.anomaly_records {
            emit_log(
                Level::Warn,
                "anomaly_detected",
                &game_context.clone().with_tick(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        if !run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += run.anomaly_records.len();
        *reason_counts.entry(run.result.reason.clone()).or_insert(0) += 1;

        emit_log(
            Level::Info,
            "game_finished",
            &game_context.clone().with_tick(run.result.ticks),
            json!({
                "reason": run.result.reason,
                "score": run.result.score,
                "merges": run.result.merges,
                "highestRankId": run.result.highest_rank_id,
                "anomalyCount": run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => emit_log(
                Level::Error,
                "result_encode_failed",
                &game_context,
                json!({ "error": error.to_string() }),
            ),
        }
        results.push(run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        results,
        reason_counts,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                Level::Error,
                "summary_write_failed",
                &run_context,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        Level::Info,
        "run_finished",
        &run_context,
        json!({
            "gameCount": summary.game_count,
            "anomalyCount": summary.anomaly_count,
            "averageScore": summary.average_score,
            "bestScore": summary.best_score,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<GameConfig, ConfigError> {
    match path {
        Some(path) => GameConfig::load(path),
        None => Ok(GameConfig::default()),
    }
}

fn run_game(game: u32, seed: u32, config: &GameConfig, max_ticks: u64) -> GameRunResult {
    let mut engine = GameEngine::new(SandboxWorld::default(), config.clone(), seed);
    let mut player = AutoPlayer::new(seed, config);
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut merged_points = 0u64;
    let mut last_tick = 0u64;

    while !engine.is_ended() {
        if last_tick >= max_ticks {
            break;
        }
        engine.receive_pointer(player.target_x);
        if player.act(engine.spawner().can_drop()) && engine.request_drop() {
            player.next_target();
        }
        engine.step(config.tick_ms);

        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;
        for event in &snapshot.events {
            if let RuntimeEvent::PiecesMerged { points, .. } = event {
                merged_points += *points as u64;
            }
        }

        let mut messages = collect_snapshot_anomalies(&snapshot, merged_points);
        let body_count = engine.physics().body_count();
        if engine.registry().len() != body_count {
            messages.push(format!(
                "registry/body mismatch: {} pieces, {} bodies",
                engine.registry().len(),
                body_count
            ));
        }
        for message in messages {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
    }

    let summary = engine.build_summary();
    let reason = match summary.reason {
        Some(reason) => game_over_reason_key(reason),
        None => "tick_limit".to_string(),
    };
    GameRunResult {
        result: GameResultLine {
            game,
            seed,
            reason,
            score: summary.score,
            merges: summary.merges,
            drops: summary.drops,
            highest_rank_id: summary.highest_rank_id,
            highest_rank_name: summary
                .highest_rank_id
                .and_then(ranks::lookup)
                .map(|rank| rank.name),
            ticks: summary.ticks,
            duration_ms: summary.duration_ms,
            anomalies,
        },
        anomaly_records,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, merged_points: u64) -> Vec<String> {
    let mut anomalies = Vec::new();
    if !snapshot.over_limit_ratio.is_finite()
        || snapshot.over_limit_ratio < 0.0
        || snapshot.over_limit_ratio > 1.0
    {
        anomalies.push(format!(
            "invalid over-limit ratio: {}",
            snapshot.over_limit_ratio
        ));
    }

    let controlled = snapshot.pieces.iter().filter(|piece| piece.is_static).count();
    if controlled > 1 {
        anomalies.push(format!("multiple controlled pieces: {controlled}"));
    }

    if snapshot.score != merged_points {
        anomalies.push(format!(
            "score drift: score {} but merges awarded {}",
            snapshot.score, merged_points
        ));
    }

    let mut seen = HashSet::new();
    for piece in &snapshot.pieces {
        if !seen.insert(piece.body_id) {
            anomalies.push(format!("duplicate body id in snapshot: {}", piece.body_id));
        }
        if !piece.x.is_finite() || !piece.y.is_finite() {
            anomalies.push(format!("non-finite position on body {}", piece.body_id));
        }
    }
    anomalies
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    games: Vec<GameResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let game_count = games.len();
    let total_score: u64 = games.iter().map(|game| game.score).sum();
    let average_score = if game_count == 0 {
        0
    } else {
        total_score / game_count as u64
    };
    let best_score = games.iter().map(|game| game.score).max().unwrap_or(0);
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        game_count,
        anomaly_count,
        average_score,
        best_score,
        reason_counts,
        games,
    }
}

fn game_over_reason_key(reason: GameOverReason) -> String {
    match reason {
        GameOverReason::Overflow => "overflow",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rank_merge_rust_server::types::PieceView;

    fn make_result(score: u64, reason: &str) -> GameResultLine {
        GameResultLine {
            game: 0,
            seed: 42,
            reason: reason.to_string(),
            score,
            merges: 0,
            drops: 0,
            highest_rank_id: None,
            highest_rank_name: None,
            ticks: 10,
            duration_ms: 160,
            anomalies: Vec::new(),
        }
    }

    fn make_snapshot(pieces: Vec<PieceView>, score: u64, ratio: f32) -> Snapshot {
        Snapshot {
            tick: 1,
            elapsed_ms: 16,
            score,
            next_rank_id: 0,
            over_limit_ratio: ratio,
            can_drop: false,
            running: true,
            pieces,
            events: Vec::new(),
        }
    }

    fn make_piece(body_id: u64, is_static: bool) -> PieceView {
        PieceView {
            body_id,
            rank_id: 0,
            label: "1",
            x: 270.0,
            y: 100.0,
            radius: 18.0,
            color: 0,
            is_static,
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_and_best_score() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![make_result(100, "overflow"), make_result(301, "overflow")],
            BTreeMap::from([("overflow".to_string(), 2usize)]),
            0,
        );
        assert_eq!(summary.average_score, 200);
        assert_eq!(summary.best_score, 301);
        assert_eq!(summary.game_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("rank-merge-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_result(5, "tick_limit")],
            BTreeMap::new(),
            0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn snapshot_anomalies_flag_broken_invariants() {
        let healthy = make_snapshot(vec![make_piece(1, true), make_piece(2, false)], 3, 0.5);
        assert!(collect_snapshot_anomalies(&healthy, 3).is_empty());

        let broken = make_snapshot(
            vec![make_piece(1, true), make_piece(1, true)],
            5,
            1.5,
        );
        let messages = collect_snapshot_anomalies(&broken, 3);
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn autoplay_targets_stay_inside_follow_range() {
        let config = GameConfig::default();
        let mut player = AutoPlayer::new(9, &config);
        for _ in 0..200 {
            assert!(player.target_x >= config.follow_left_x);
            assert!(player.target_x <= config.follow_right_x);
            player.next_target();
        }
        assert!(!player.act(false));
    }

    #[test]
    fn short_game_run_is_deterministic_and_clean() {
        let config = GameConfig::default();
        let first = run_game(0, 1234, &config, 600);
        let second = run_game(0, 1234, &config, 600);
        assert_eq!(first.result.score, second.result.score);
        assert_eq!(first.result.drops, second.result.drops);
        assert_eq!(first.result.ticks, second.result.ticks);
        assert!(first.result.drops > 0);
        assert!(first.result.anomalies.is_empty(), "{:?}", first.result.anomalies);
    }
}
