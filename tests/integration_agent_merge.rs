use anyhow::Result;
use loadgen_stats::{
    defaults::BINS, AgentSnapshot, Channel, ConnectionStats, HistogramSampler, Operation,
    Percentile, ReportFormat,
};

/// Latencies (µs) an agent observes across two intervals.
fn agent_operations() -> Vec<Operation> {
    (0..400)
        .map(|i| {
            let latency_us = 80.0 + f64::from(i % 97) * 37.5;
            let start = 50.0 + f64::from(i) * 0.01;
            Operation::new(start, start + latency_us / 1_000_000.0, (i % 2) as usize)
        })
        .collect()
}

/// Sampling operations directly and shipping the same raw fields through a
/// snapshot must produce identical read-channel state.
#[test]
fn snapshot_round_trip_matches_direct_sampling() -> Result<()> {
    let ops = agent_operations();

    let mut direct = ConnectionStats::new(true, 2);
    for op in &ops {
        direct.log_read(op);
    }
    direct.start = 50.0;
    direct.stop = 54.0;

    // Build the wire fields by hand, the way a foreign agent would.
    let mut snapshot = AgentSnapshot::empty(2);
    let bucketer = HistogramSampler::new(BINS, 1);
    for op in &ops {
        let latency = (op.end_time - op.start_time) * 1_000_000.0;
        let bucket = bucketer.bucket_index(latency);
        snapshot.read_bins[op.interval * BINS + bucket] += 1;
        snapshot.read_sum[op.interval] += latency;
        snapshot.read_sum_sq[op.interval] += latency * latency;
        snapshot.gets_dyn[op.interval] += 1;
    }
    snapshot.base.gets = ops.len() as u64;
    snapshot.base.start = 50.0;
    snapshot.base.stop = 54.0;

    let decoded = AgentSnapshot::from_bytes(&snapshot.to_bytes()?)?;
    let mut coordinator = ConnectionStats::new(true, 2);
    coordinator.merge_snapshot(&decoded);

    for interval in 0..2 {
        let a = &direct.read_sampler;
        let b = &coordinator.read_sampler;
        assert_eq!(a.total(interval), b.total(interval));
        assert_eq!(a.bucket_counts(interval), b.bucket_counts(interval));
        assert_eq!(a.sum(interval), b.sum(interval));
        assert_eq!(a.sum_sq(interval), b.sum_sq(interval));
    }
    assert_eq!(direct.gets, coordinator.gets);
    assert_eq!(direct.gets_dyn, coordinator.gets_dyn);

    let p99 = Percentile::from_code(99);
    assert_eq!(direct.quantile(p99, 1), coordinator.quantile(p99, 1));
    assert_eq!(direct.throughput(), coordinator.throughput());
    Ok(())
}

#[test]
fn agent_capture_and_coordinator_fan_in() -> Result<()> {
    let mut agents = Vec::new();
    for agent in 0..3u32 {
        let mut stats = ConnectionStats::new(true, 1);
        for i in 0..50u32 {
            let latency_us = 500.0 + f64::from(agent * 100 + i);
            stats.log_read(&Operation::new(0.0, latency_us / 1_000_000.0, 0));
        }
        stats.log_write(&Operation::new(0.0, 0.01, 0));
        stats.rx_bytes = 1_000;
        stats.start = 10.0;
        stats.stop = 20.0;
        agents.push(AgentSnapshot::from_stats(&stats)?);
    }

    let mut coordinator = ConnectionStats::new(true, 1);
    for snapshot in &agents {
        let bytes = snapshot.to_bytes()?;
        coordinator.merge_snapshot(&AgentSnapshot::from_bytes(&bytes)?);
    }

    assert_eq!(coordinator.gets, 150);
    assert_eq!(coordinator.sets, 3);
    assert_eq!(coordinator.rx_bytes, 3_000);
    assert_eq!(coordinator.read_sampler.total(0), 150);
    // agents' write latencies are not shipped
    assert_eq!(coordinator.write_sampler.total(0), 0);
    assert_eq!(coordinator.combined_sampler.total(0), 0);
    assert!((coordinator.throughput() - 15.3).abs() < 1e-9);

    let format = ReportFormat::default();
    let table = coordinator.render_table(&format, 0);
    assert_eq!(table.lines().count(), 4);
    let write_line = coordinator.render(&format, "update", Channel::Write, 0);
    assert!(write_line
        .split_whitespace()
        .skip(1)
        .all(|field| field == "0.0"));
    Ok(())
}

#[test]
fn mismatched_snapshot_is_rejected_without_side_effects() {
    let mut coordinator = ConnectionStats::new(true, 4);
    coordinator.gets = 9;
    let before = coordinator.clone();

    assert!(coordinator
        .try_merge_snapshot(&AgentSnapshot::empty(2))
        .is_err());
    assert_eq!(coordinator, before);
}
