mod common;

use std::sync::Arc;
use std::time::Duration;

use furnace_sim::config::FurnaceConfig;
use furnace_sim::furnace_shared::{
    Asset, AssetCatalog, ChannelKind, FurnaceState, PropertyValue, PropertyWrite, SinkError,
};
use furnace_sim::{FurnaceError, FurnaceStateMachine, MemoryPlatform, Pacing, SimContext, SimulationClock};
use rand::SeedableRng;
use rand::rngs::StdRng;

use common::{EPOCH, RejectAssetSink, client, client_with_sink, fast_config, fleet};

// Writes in one full cycle at setpoint 1000: five state changes, nine
// heating pairs, thirteen holding pairs and seven cooling pairs
const CYCLE_WRITES_AT_1000: usize = 1 + 1 + 18 + 1 + 26 + 1 + 14;

async fn furnace(
    platform: &Arc<MemoryPlatform>,
    telemetry: Arc<furnace_sim::TelemetryClient>,
    asset_id: &str,
    setpoint: f64,
    seed: u64,
) -> FurnaceStateMachine<StdRng> {
    let detail = platform.describe_asset(asset_id).await.unwrap();
    let asset = Asset::from_detail(&detail).unwrap().with_setpoint(setpoint);
    FurnaceStateMachine::new(
        asset,
        telemetry,
        &FurnaceConfig::default(),
        StdRng::seed_from_u64(seed),
    )
}

/// Step the furnace on its own virtual timeline until the platform has
/// recorded `writes` writes for it.
async fn drive(furnace: &mut FurnaceStateMachine<StdRng>, platform: &MemoryPlatform, writes: usize) {
    let mut now = Duration::ZERO;
    while platform.writes_for(furnace.asset().id()).len() < writes {
        let delay = furnace.step(&SimContext::new(now, EPOCH)).await.unwrap();
        now += delay;
    }
}

fn values_on(writes: &[PropertyWrite], channel: &str) -> Vec<PropertyValue> {
    writes
        .iter()
        .filter(|w| w.property_id == channel)
        .map(|w| w.value.clone())
        .collect()
}

fn states(writes: &[PropertyWrite], asset: &Asset) -> Vec<String> {
    values_on(writes, asset.state_channel())
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Temperature/power pairs emitted while the furnace was in `state`.
fn pairs_in(writes: &[PropertyWrite], asset: &Asset, state: FurnaceState) -> Vec<(f64, i64)> {
    let mut current = None;
    let mut pairs = Vec::new();
    let mut pending = None;
    for write in writes {
        if write.property_id == asset.state_channel() {
            current = write.value.as_str().and_then(FurnaceState::parse);
        } else if current == Some(state) {
            if write.property_id == asset.temperature_channel() {
                pending = write.value.as_f64();
            } else if write.property_id == asset.power_channel() {
                let power = write.value.as_i64().unwrap();
                pairs.push((pending.take().unwrap(), power));
            }
        }
    }
    pairs
}

fn setup(setpoints: &[Option<f64>]) -> (Arc<MemoryPlatform>, Arc<furnace_sim::TelemetryClient>) {
    let config = fast_config();
    let platform = Arc::new(MemoryPlatform::from_fleet(&fleet(setpoints)));
    let telemetry = client(&platform, &config);
    (platform, telemetry)
}

#[tokio::test(start_paused = true)]
async fn test_full_cycle_at_reference_setpoint() {
    let (platform, telemetry) = setup(&[Some(1000.0)]);
    let mut furnace = furnace(&platform, telemetry, "furnace-0", 1000.0, 1).await;
    let asset = furnace.asset().clone();
    assert_eq!(furnace.holding_iterations(), 13);

    drive(&mut furnace, &platform, CYCLE_WRITES_AT_1000 + 1).await;
    let writes = platform.writes_for("furnace-0");
    assert_eq!(writes.len(), CYCLE_WRITES_AT_1000 + 1);

    assert_eq!(
        states(&writes, &asset),
        vec!["IDLE", "HEATING", "HOLDING", "COOLING", "IDLE"]
    );
    // Temperature always precedes its power reading
    assert_eq!(writes[0].property_id, asset.state_channel());
    assert_eq!(writes[1].property_id, asset.state_channel());
    assert_eq!(writes[2].property_id, asset.temperature_channel());
    assert_eq!(writes[3].property_id, asset.power_channel());

    let heating = pairs_in(&writes, &asset, FurnaceState::Heating);
    assert_eq!(heating.len(), 9);
    assert_eq!(heating[0], (0.0, 0));
    assert_eq!(heating[8], (1001.0, 31));

    let holding = pairs_in(&writes, &asset, FurnaceState::Holding);
    assert_eq!(holding.len(), 13);
    for (temperature, power) in &holding {
        assert!((999.5..=1000.5).contains(temperature), "holding at {}", temperature);
        assert!((27..=32).contains(power), "holding draw {}", power);
    }

    let cooling = pairs_in(&writes, &asset, FurnaceState::Cooling);
    assert_eq!(cooling.len(), 7);
    assert_eq!(cooling[0], (999.0, 0));
    assert_eq!(cooling[6], (0.0, 0));
    assert!(cooling.iter().all(|(_, power)| *power == 0));

    // Power is always an integer reading
    assert!(values_on(&writes, asset.power_channel())
        .iter()
        .all(|v| matches!(v, PropertyValue::Integer(_))));
}

#[tokio::test(start_paused = true)]
async fn test_timestamps_follow_virtual_time() {
    let (platform, telemetry) = setup(&[Some(1000.0)]);
    let mut furnace = furnace(&platform, telemetry, "furnace-0", 1000.0, 2).await;
    let asset = furnace.asset().clone();
    drive(&mut furnace, &platform, CYCLE_WRITES_AT_1000).await;
    let writes = platform.writes_for("furnace-0");

    assert_eq!(writes[0].time_in_seconds, EPOCH);
    // Idle lasts at least the minimum idle time
    assert!(writes[1].time_in_seconds >= EPOCH + 20);
    assert!(writes.windows(2).all(|w| w[0].time_in_seconds <= w[1].time_in_seconds));

    // Heating samples are one measurement interval apart
    let heating_times: Vec<i64> = writes[2..20]
        .iter()
        .filter(|w| w.property_id == asset.temperature_channel())
        .map(|w| w.time_in_seconds)
        .collect();
    assert_eq!(heating_times.len(), 9);
    assert!(heating_times.windows(2).all(|t| t[1] - t[0] == 5));

    // Holding ends with an extra settle wait of 0.5s to 4.5s before cooling
    let temperature_times: Vec<i64> = writes
        .iter()
        .filter(|w| w.property_id == asset.temperature_channel())
        .map(|w| w.time_in_seconds)
        .collect();
    let last_holding = temperature_times[9 + 13 - 1];
    let first_cooling = temperature_times[9 + 13];
    let gap = first_cooling - last_holding;
    assert!((5..=10).contains(&gap), "settle gap {}s", gap);
}

#[tokio::test(start_paused = true)]
async fn test_heating_curve_scales_with_setpoint() {
    let (platform, telemetry) = setup(&[Some(1000.0), Some(500.0)]);
    let mut reference = furnace(&platform, telemetry.clone(), "furnace-0", 1000.0, 3).await;
    let mut half = furnace(&platform, telemetry, "furnace-1", 500.0, 3).await;
    drive(&mut reference, &platform, 20).await;
    drive(&mut half, &platform, 20).await;

    let reference_pairs = pairs_in(&platform.writes_for("furnace-0"), reference.asset(), FurnaceState::Heating);
    let half_pairs = pairs_in(&platform.writes_for("furnace-1"), half.asset(), FurnaceState::Heating);
    assert_eq!(reference_pairs.len(), 9);
    for ((full_t, full_p), (half_t, half_p)) in reference_pairs.iter().zip(&half_pairs) {
        assert!((full_t / 2.0 - half_t).abs() < 1e-9);
        assert_eq!(full_p, half_p);
    }
}

#[tokio::test(start_paused = true)]
async fn test_holding_length_depends_on_setpoint() {
    let (platform, telemetry) = setup(&[Some(760.0), Some(1000.0), Some(1500.0)]);
    for (id, setpoint, expected) in [("furnace-0", 760.0, 16), ("furnace-1", 1000.0, 13), ("furnace-2", 1500.0, 9)] {
        let mut furnace = furnace(&platform, telemetry.clone(), id, setpoint, 4).await;
        assert_eq!(furnace.holding_iterations(), expected);
        // Through the COOLING state write
        drive(&mut furnace, &platform, 1 + 1 + 18 + 1 + 2 * expected as usize + 1).await;
        let holding = pairs_in(&platform.writes_for(id), furnace.asset(), FurnaceState::Holding);
        assert_eq!(holding.len(), expected as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn test_idle_duration_never_below_minimum() {
    let (platform, telemetry) = setup(&[Some(1000.0)]);
    let mut furnace = furnace(&platform, telemetry, "furnace-0", 1000.0, 5).await;
    let draws: Vec<Duration> = (0..2000).map(|_| furnace.idle_duration()).collect();
    assert!(draws.iter().all(|d| *d >= Duration::from_secs(20)));

    // Mean of 20s + Exp(1/30) is 50s
    let mean = draws.iter().map(Duration::as_secs_f64).sum::<f64>() / draws.len() as f64;
    assert!((40.0..60.0).contains(&mean), "mean idle {:.1}s", mean);
}

#[tokio::test(start_paused = true)]
async fn test_cycles_repeat_in_order() {
    let (platform, telemetry) = setup(&[Some(1000.0)]);
    let mut furnace = furnace(&platform, telemetry, "furnace-0", 1000.0, 6).await;
    let asset = furnace.asset().clone();
    drive(&mut furnace, &platform, 3 * CYCLE_WRITES_AT_1000 + 1).await;

    let observed = states(&platform.writes_for("furnace-0"), &asset);
    let expected: Vec<String> = FurnaceState::CYCLE
        .iter()
        .cycle()
        .take(13)
        .map(|s| s.as_str().to_string())
        .collect();
    assert_eq!(observed, expected);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_furnaces_do_not_share_state() {
    let (platform, telemetry) = setup(&[Some(760.0), Some(1200.0)]);
    let cold = furnace(&platform, telemetry.clone(), "furnace-0", 760.0, 7).await;
    let hot = furnace(&platform, telemetry, "furnace-1", 1200.0, 8).await;
    let cold_asset = cold.asset().clone();
    let hot_asset = hot.asset().clone();

    let mut clock = SimulationClock::new(Pacing::Unthrottled).with_epoch(EPOCH);
    clock.spawn(Box::new(cold));
    clock.spawn(Box::new(hot));
    let report = clock.run(Duration::from_secs(3600)).await.unwrap();
    assert!(report.failures.is_empty());

    for (asset, setpoint, holding) in [(&cold_asset, 760.0, 16), (&hot_asset, 1200.0, 11)] {
        let writes = platform.writes_for(asset.id());
        assert!(!writes.is_empty());
        let own = [asset.temperature_channel(), asset.power_channel(), asset.state_channel()];
        assert!(writes.iter().all(|w| own.contains(&w.property_id.as_str())));

        let heating = pairs_in(&writes, asset, FurnaceState::Heating);
        assert!((heating[8].0 - 1.001 * setpoint).abs() < 1e-9);
        let cycles = states(&writes, asset)
            .iter()
            .filter(|s| s.as_str() == "COOLING")
            .count();
        assert!(cycles >= 1);
        let holding_pairs = pairs_in(&writes, asset, FurnaceState::Holding);
        assert!(holding_pairs.len() >= holding);
        for (temperature, _) in holding_pairs {
            assert!((temperature - setpoint).abs() <= 0.5);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_keeps_cursor() {
    let config = fast_config();
    let platform = Arc::new(MemoryPlatform::from_fleet(&fleet(&[Some(1000.0)])));
    let sink = Arc::new(RejectAssetSink::new(
        platform.clone(),
        "furnace-0",
        SinkError::from_code("ValidationException", "bad quality"),
    ));
    let telemetry = client_with_sink(&platform, sink, &config);
    let mut furnace = furnace(&platform, telemetry, "furnace-0", 1000.0, 9).await;

    let err = furnace
        .step(&SimContext::new(Duration::ZERO, EPOCH))
        .await
        .unwrap_err();
    match err {
        FurnaceError::Delivery {
            asset_id,
            state,
            channel,
            value,
            ..
        } => {
            assert_eq!(asset_id, "furnace-0");
            assert_eq!(state, FurnaceState::Idle);
            assert_eq!(channel, ChannelKind::State);
            assert_eq!(value, PropertyValue::from(FurnaceState::Idle));
        }
    }
    assert_eq!(furnace.state(), FurnaceState::Idle);
    assert!(platform.writes().is_empty());
}
