use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;

use crate::{
    analytics::{history_for_range, summarize, trend_series, TimeRange},
    auth::AuthContext,
    channel::{MemoryTransport, TcpTransport, Transport},
    db::Database,
    models::Profile,
    session::SessionController,
    settings::{DeviceSettings, SettingsStore},
    simulator::DeviceSimulator,
};

use super::{ProfileAction, SessionArgs};

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run_session(db: Database, settings: &DeviceSettings, args: SessionArgs) -> Result<()> {
    let auth = AuthContext::default();
    if let Some(owner) = &args.owner {
        auth.sign_in(owner.clone());
    }

    let mut simulator = None;
    let transport: Arc<dyn Transport> = match &settings.channel.endpoint {
        Some(addr) => Arc::new(TcpTransport::new(addr.clone())),
        None => {
            let (transport, endpoint) = MemoryTransport::pair();
            simulator = Some(DeviceSimulator::spawn(
                endpoint,
                Duration::from_millis(settings.simulator_interval_ms.max(1)),
                Utc::now().timestamp_millis() as u64,
            ));
            Arc::new(transport)
        }
    };

    let mut config = settings.controller_config();
    if args.manual.is_some() {
        config.auto_mode = false;
    }
    let controller = SessionController::new(db, auth, transport, config);

    controller.start_session().await?;
    if let Some(level) = args.manual {
        controller.set_manual_intensity(level).await?;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    for _ in 0..args.seconds {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = controller.snapshot().await;
                println!(
                    "[{:>4}s] {:?} | pressure {:>5.1} kPa | temp {:>4.1} C | battery {:>3}% | vibration {}/10",
                    snapshot.elapsed_seconds,
                    controller.connection_state(),
                    snapshot.pressure,
                    snapshot.temperature,
                    snapshot.battery_level,
                    snapshot.vibration,
                );
            }
            _ = tokio::signal::ctrl_c() => {
                log::warn!("interrupted; sending emergency stop");
                controller.emergency_stop().await?;
                break;
            }
        }
    }

    controller.stop().await?;

    if !args.no_save {
        let record = controller
            .save(args.planned, args.intensity, args.notes.clone())
            .await?;
        print_json(&record)?;
    }

    controller.shutdown().await?;
    if let Some(mut simulator) = simulator {
        simulator.shutdown().await?;
    }
    Ok(())
}

pub async fn show_history(db: &Database, owner: &str, range: TimeRange) -> Result<()> {
    let records = history_for_range(db, owner, range, Utc::now()).await?;
    print_json(&json!({
        "range": range.to_string(),
        "summary": summarize(&records),
        "trend": trend_series(&records),
        "sessions": records,
    }))
}

pub async fn handle_profile(db: &Database, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Show { owner } => {
            let profile = db
                .get_profile(&owner)
                .await?
                .ok_or_else(|| anyhow!("no profile stored for {owner}"))?;
            print_json(&json!({
                "profile": profile,
                "predictedNextCycle": profile.predicted_next_cycle(),
            }))
        }
        ProfileAction::Set {
            owner,
            name,
            age,
            cycle_length,
            pain_level,
            medications,
            last_period,
        } => {
            let profile = Profile {
                age,
                cycle_length_days: cycle_length,
                pain_level,
                medications,
                last_period_start_date: last_period,
                ..Profile::new(owner, name)
            };
            profile.validate()?;
            db.upsert_profile(&profile).await?;
            print_json(&json!({
                "profile": profile,
                "predictedNextCycle": profile.predicted_next_cycle(),
            }))
        }
    }
}

pub fn edit_settings(
    store: &SettingsStore,
    endpoint: Option<String>,
    device_id: Option<String>,
    reconnect_delay_ms: Option<u64>,
) -> Result<()> {
    let mut settings = store.current();
    let changed = endpoint.is_some() || device_id.is_some() || reconnect_delay_ms.is_some();

    if let Some(endpoint) = endpoint {
        let endpoint = endpoint.trim().to_string();
        settings.channel.endpoint = (!endpoint.is_empty()).then_some(endpoint);
    }
    if let Some(device_id) = device_id {
        settings.device_id = device_id;
    }
    if let Some(delay) = reconnect_delay_ms {
        settings.channel.reconnect_delay_ms = delay;
    }

    if changed {
        store.update(settings.clone())?;
        log::info!("settings saved to {}", store.path().display());
    }
    print_json(&settings)
}
