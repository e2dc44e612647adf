//! Offline replay of captured protocol messages.
//!
//! A capture is JSON lines, one `{"method_id": 45, "payload": "<hex>"}` object per message.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{DispatchOutcome, Envelope};
use crate::snapshot::SessionSnapshot;
use crate::{MeterEngine, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub method_id: u32,
    pub payload: String,
}

impl ReplayRecord {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            method_id: envelope.method_id,
            payload: hex::encode(&envelope.payload),
        }
    }
}

pub fn parse_line(line: &str) -> Result<Envelope> {
    let record: ReplayRecord = serde_json::from_str(line)?;
    let payload = hex::decode(record.payload.trim())?;
    Ok(Envelope::new(record.method_id, payload))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayInput {
    pub envelopes: Vec<Envelope>,
    pub skipped_lines: usize,
}

/// Parses a whole capture. Malformed lines are logged and skipped.
pub fn parse_capture(content: &str) -> ReplayInput {
    let mut input = ReplayInput::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(envelope) => input.envelopes.push(envelope),
            Err(e) => {
                log::warn!("Skipping line {}: {}", index + 1, e);
                input.skipped_lines += 1;
            }
        }
    }
    input
}

pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<ReplayInput> {
    let content = fs::read_to_string(&path)?;
    let input = parse_capture(&content);
    log::info!(
        "Read {} messages from {:?} ({} lines skipped)",
        input.envelopes.len(),
        path.as_ref(),
        input.skipped_lines
    );
    Ok(input)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub handled: u64,
    pub unknown: u64,
    pub dropped: u64,
}

impl ReplayStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled => self.handled += 1,
            DispatchOutcome::Unknown => self.unknown += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
        }
    }

    fn merge(&mut self, other: ReplayStats) {
        self.handled += other.handled;
        self.unknown += other.unknown;
        self.dropped += other.dropped;
    }

    pub fn total(&self) -> u64 {
        self.handled + self.unknown + self.dropped
    }
}

/// Fans the envelopes out over `producers` workers and waits for all of them.
pub async fn run_replay(
    engine: Arc<MeterEngine>,
    envelopes: Vec<Envelope>,
    producers: usize,
    report_interval: Duration,
) -> ReplayStats {
    let producers = producers.max(1);
    let (tx, rx) = async_channel::bounded::<Envelope>(producers * 64);
    let processed = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = (0..producers)
        .map(|_| {
            let rx = rx.clone();
            let engine = engine.clone();
            let processed = processed.clone();
            tokio::spawn(async move {
                let mut stats = ReplayStats::default();
                while let Ok(envelope) = rx.recv().await {
                    stats.record(engine.dispatch_envelope(&envelope));
                    processed.fetch_add(1, Ordering::Relaxed);
                }
                stats
            })
        })
        .collect();
    drop(rx);

    let reporter = {
        let engine = engine.clone();
        let processed = processed.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(report_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                log::info!(
                    "Replayed {} messages, {}",
                    processed.load(Ordering::Relaxed),
                    leader_summary(&engine)
                );
            }
        })
    };

    let total = envelopes.len();
    for envelope in envelopes {
        if tx.send(envelope).await.is_err() {
            log::error!("All replay workers stopped early");
            break;
        }
    }
    tx.close();

    let mut stats = ReplayStats::default();
    for worker in workers {
        match worker.await {
            Ok(worker_stats) => stats.merge(worker_stats),
            Err(e) => log::error!("Replay worker failed: {}", e),
        }
    }
    reporter.abort();

    log::info!(
        "Replay finished: {}/{} handled, {} unknown, {} dropped",
        stats.handled,
        total,
        stats.unknown,
        stats.dropped
    );
    stats
}

fn leader_summary(engine: &MeterEngine) -> String {
    let mut leaders: Vec<(u64, f64)> = engine
        .list_tracked_entities()
        .into_iter()
        .filter_map(|id| {
            let attack = engine.get_full_statistics(id)?.attack_damage;
            (!attack.is_npc && attack.total() > 0).then(|| (id, attack.value_per_second))
        })
        .collect();
    if leaders.is_empty() {
        return "no damage yet".to_string();
    }

    leaders.sort_by(|a, b| b.1.total_cmp(&a.1));
    leaders
        .iter()
        .take(3)
        .map(|(id, dps)| format!("#{} {:.0} dps", id, dps))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_rate(rate: f64) -> String {
    if rate.is_nan() {
        "-".to_string()
    } else {
        format!("{:.1}", rate)
    }
}

/// Plain-text summary, one row per entity, sorted by full-session damage.
pub fn render_table(session: &SessionSnapshot) -> String {
    let mut entities: Vec<_> = session.entities.iter().collect();
    entities.sort_by(|a, b| b.full.attack_damage.total().cmp(&a.full.attack_damage.total()));

    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:>12} {:>10} {:>7} {:>7} {:>12} {:>12} {:>12}\n",
        "Name", "Damage", "DPS", "Crit%", "Lucky%", "Healing", "Taken", "Section"
    ));
    for snapshot in entities {
        let attack = &snapshot.full.attack_damage;
        out.push_str(&format!(
            "{:<24} {:>12} {:>10} {:>7.1} {:>7.1} {:>12} {:>12} {:>12}\n",
            snapshot.display_name,
            attack.total(),
            format_rate(attack.value_per_second),
            attack.crit_rate * 100.0,
            attack.lucky_rate * 100.0,
            snapshot.full.healing.total(),
            snapshot.full.taken_damage.total(),
            snapshot.section.attack_damage.total()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_parser::{AoiSyncDelta, NotifyMethod, SkillEffects, SyncDamageInfo, SyncNearDeltaInfo};
    use prost::Message;

    const PLAYER_UUID: u64 = (1001 << 16) | 640;
    const MONSTER_UUID: u64 = (5001 << 16) | 64;

    fn hit(value: u64) -> Envelope {
        let payload = SyncNearDeltaInfo {
            delta_infos: vec![AoiSyncDelta {
                uuid: Some(MONSTER_UUID),
                attrs: None,
                skill_effects: Some(SkillEffects {
                    damages: vec![SyncDamageInfo {
                        owner_id: Some(1241),
                        attacker_uuid: Some(PLAYER_UUID),
                        value: Some(value),
                        ..Default::default()
                    }],
                }),
            }],
        }
        .encode_to_vec();
        Envelope::new(NotifyMethod::SyncNearDeltaInfo.id(), payload)
    }

    #[test]
    fn test_parse_line() {
        let envelope = parse_line(r#"{"method_id": 45, "payload": "0a00"}"#).unwrap();
        assert_eq!(envelope.method_id, 45);
        assert_eq!(&envelope.payload[..], &[0x0a, 0x00]);

        assert!(matches!(
            parse_line(r#"{"method_id": 45, "payload": "zz"}"#),
            Err(crate::MeterError::Hex(_))
        ));
        assert!(matches!(parse_line("not json"), Err(crate::MeterError::Json(_))));
    }

    #[test]
    fn test_parse_capture_skips_bad_lines() {
        let good = serde_json::to_string(&ReplayRecord::from_envelope(&hit(10))).unwrap();
        let content = format!("{}\n\n{{broken\n{}\n", good, good);

        let input = parse_capture(&content);
        assert_eq!(input.envelopes.len(), 2);
        assert_eq!(input.skipped_lines, 1);
        assert_eq!(input.envelopes[0], hit(10));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replay_fans_out_across_producers() {
        let engine = Arc::new(MeterEngine::default());
        let mut envelopes: Vec<Envelope> = (0..1_000).map(|_| hit(3)).collect();
        envelopes.push(Envelope::new(0x1234, vec![1u8]));
        envelopes.push(Envelope::new(NotifyMethod::SyncNearDeltaInfo.id(), vec![0xffu8, 0xff]));

        let stats = run_replay(engine.clone(), envelopes, 4, Duration::from_millis(5)).await;

        assert_eq!(stats.handled, 1_000);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.total(), 1_002);

        let attack = engine.get_full_statistics(1001).unwrap().attack_damage;
        assert_eq!(attack.total(), 3_000);
        assert_eq!(attack.hit_count(), 1_000);
    }

    #[test]
    fn test_render_table() {
        let engine = MeterEngine::default();
        engine.dispatch_envelope(&hit(100));

        let table = render_table(&engine.export_snapshot());
        let mut lines = table.lines();
        assert!(lines.next().unwrap().starts_with("Name"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("Entity_1001"));
        assert!(row.contains("100"));
        assert!(lines.next().is_none());
    }
}
