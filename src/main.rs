use std::time::Duration;

use anyhow::Result;
use shoresquad_core::{App, AppError, Config};
use shoresquad_events::{EventCatalog, EventFilter};
use shoresquad_offline::{
    ContactOutbox, Gateway, GatewayConfig, GatewayError, HttpFetcher, OutboxSync, SqliteStore,
    WorkerState,
};
use shoresquad_weather::{CityWeather, Location, LocationWeather, WeatherProvider, WeatherReport};

#[tokio::main]
async fn main() -> Result<()> {
    shoresquad_core::init()?;

    let mut app = match start() {
        Ok(app) => app,
        Err(e) => {
            let err = AppError::classify(e);
            report_error("Startup", &err);
            return Err(err.into());
        }
    };
    let config = app.shared_config();

    tracing::info!("ShoreSquad started");
    println!("ShoreSquad - Beach cleanups, organised");
    println!("  Config directory: {}", config.config_dir.display());

    if let Err(e) = show_weather(&config).await {
        report_error("Weather", &e);
    }

    show_events(&config);

    if let Err(e) = prepare_offline(&config).await {
        report_error("Offline cache", &e);
    }

    if let Err(e) = sync_outbox(&config).await {
        report_error("Contact outbox", &e);
    }

    app.shutdown()?;
    Ok(())
}

fn start() -> Result<App> {
    let mut app = App::load()?;
    app.initialize()?;
    Ok(app)
}

fn report_error(area: &str, err: &AppError) {
    tracing::error!("{} failed: {}", area, err);
    eprintln!("{}: {}", area, err.user_message());
}

async fn show_weather(config: &Config) -> Result<(), AppError> {
    let provider = WeatherProvider::new(config.weather.clone())?;
    let query = std::env::var("SHORESQUAD_LOCATION").unwrap_or_default();

    match provider.lookup(&query).await {
        LocationWeather::City(city) => print_city(&city),
        LocationWeather::Singapore(report) => {
            if !query.trim().is_empty() && !Location::is_singapore(&query) {
                println!("\nNo weather for \"{}\", showing Singapore instead", query.trim());
            }
            print_report(&report);
        }
    }
    Ok(())
}

fn print_city(city: &CityWeather) {
    println!("\nWeather in {}", city.location);
    println!("  Conditions:  {}", city.condition);
    println!("  Temperature: {}°C (feels like {}°C)", city.temperature_c, city.feels_like_c);
    println!("  Humidity:    {}%", city.humidity_pct);
    println!("  Wind:        {} km/h", city.wind_kmh);
    match city.visibility_km {
        Some(v) => println!("  Visibility:  {} km", v),
        None => println!("  Visibility:  N/A"),
    }
    println!("  Verdict:     {}", city.verdict());
}

fn print_report(report: &WeatherReport) {
    let current = &report.current;

    println!("\nWeather in {}{}", report.location, if report.is_fallback() { " (offline data)" } else { "" });
    match current.temperature_c {
        Some(t) => println!("  Temperature: {}°C", t),
        None => println!("  Temperature: --"),
    }
    match current.humidity_pct {
        Some(h) => println!("  Humidity:    {}%", h),
        None => println!("  Humidity:    --"),
    }
    println!("  Rainfall:    {} mm", current.rainfall_mm);
    println!("  Verdict:     {}", report.suitability().description());

    for day in &report.forecast {
        println!(
            "  {}  {:<28} {:.0}-{:.0}°C",
            day.date.format("%a %d %b"),
            day.condition_text,
            day.temperature.low,
            day.temperature.high
        );
    }
}

fn show_events(config: &Config) {
    let filter = std::env::var("SHORESQUAD_EVENT_FILTER")
        .map(|name| EventFilter::parse(&name))
        .unwrap_or_else(|_| EventFilter::parse(&config.events.default_filter));
    let today = chrono::Local::now().date_naive();

    let mut catalog = EventCatalog::with_samples();
    let events = catalog.apply_filter(filter, today);

    println!("\nCleanups ({})", filter.as_str());
    if events.is_empty() {
        println!("  No events found for this filter");
    }
    for event in events {
        println!(
            "  #{} {} - {} at {} ({} spots left, {})",
            event.id,
            event.title,
            event.formatted_date(),
            event.location,
            event.spots_left(),
            event.difficulty
        );
    }
}

async fn prepare_offline(config: &Config) -> Result<(), AppError> {
    let store = SqliteStore::new(config.cache_db_path())?;
    let fetcher = HttpFetcher::new(Duration::from_secs(config.weather.request_timeout_secs))
        .map_err(GatewayError::from)?;
    let gateway = Gateway::new(store, fetcher, GatewayConfig::from_config(&config.offline)?);

    let state = gateway.install().await;
    if gateway.should_activate() {
        let removed = gateway.activate().await?;
        println!(
            "\nOffline cache {} ready ({} old version(s) removed)",
            gateway.version(),
            removed.len()
        );
    } else {
        println!("\nOffline cache {} not available ({:?})", gateway.version(), state);
    }

    if state == WorkerState::Redundant {
        tracing::warn!("Offline support disabled until the next successful install");
    }
    Ok(())
}

async fn sync_outbox(config: &Config) -> Result<(), AppError> {
    let outbox = ContactOutbox::new(config.outbox_db_path())?;
    let pending = outbox.len()?;
    if pending == 0 {
        return Ok(());
    }

    let sync = OutboxSync::from_config(config, outbox, reqwest::Client::new())?;
    if let Some(report) = sync.sync(&config.outbox.sync_tag).await? {
        println!(
            "\nContact outbox: {} sent, {} still queued",
            report.sent, report.failed
        );
    }
    Ok(())
}
