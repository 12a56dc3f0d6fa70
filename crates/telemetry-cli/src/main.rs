mod bootstrap;
mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use telemetry_core::settings::Settings;
use telemetry_core::time_utils::TimezoneHandler;
use telemetry_data::reader::load_commands;
use telemetry_runtime::exporter::ExportScheduler;
use telemetry_runtime::replay::Replayer;
use telemetry_runtime::sink::file_sink;

use crate::report::DisplayOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("journey-telemetry v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Timezone: {}, Export: {}",
        settings.view,
        settings.timezone,
        settings
            .export_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "off".to_string())
    );

    let timezone = TimezoneHandler::new(&settings.timezone);
    let input = settings
        .input
        .clone()
        .unwrap_or_else(bootstrap::default_script_dir);
    let commands = load_commands(&input, &timezone)
        .with_context(|| format!("failed to load scripts from {}", input.display()))?;

    let start = commands
        .iter()
        .find_map(|c| c.at)
        .unwrap_or_else(Utc::now);
    let mut replayer = Replayer::new(start);

    let exporter = match &settings.export_path {
        Some(path) => {
            let sink = file_sink(&settings.export_format, path)?;
            Some(
                ExportScheduler::new(
                    Duration::from_secs(u64::from(settings.export_interval)),
                    replayer.aggregator().clone(),
                    sink,
                )
                .start(),
            )
        }
        None => None,
    };

    let stats = replayer.run(&commands);
    if stats.ignored > 0 || stats.failed > 0 {
        tracing::warn!(
            ignored = stats.ignored,
            failed = stats.failed,
            "some script commands had no effect"
        );
    }

    if let Some(handle) = exporter {
        let exported = handle.shutdown().await;
        tracing::info!(exported, "metrics export finished");
    }

    let opts = DisplayOptions {
        timezone,
        use_12h: settings.use_12h(),
    };
    let output = replayer.aggregator().with(|agg| match settings.view.as_str() {
        "journey" => Ok(report::render_journey(agg, settings.screen.as_deref(), &opts)),
        "chokepoints" => Ok(report::render_chokepoints(agg)),
        "events" => Ok(report::render_events(
            agg,
            settings.event_filter.as_deref(),
            settings.screen.as_deref(),
            &opts,
        )),
        "export" => report::render_export(agg),
        _ => Ok(report::render_summary(agg, &opts)),
    })?;

    print!("{}", output);
    Ok(())
}
