use std::sync::Arc;

use chrono::Local;
use tracing_subscriber::EnvFilter;

use cms_doctor_agenda::{
    api::DoctorApi,
    config::Config,
    filter::{self, ViewQuery},
    store::AppointmentStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let backend = Arc::new(DoctorApi::new(&cfg)?);

    let mut store = AppointmentStore::new(backend);
    let count = store.load_all().await?;
    tracing::info!("Loaded {count} appointments from {}", cfg.api_base_url);

    let now = Local::now().naive_local();

    let s = filter::stats(store.items(), now);
    println!(
        "Today: {}   This week: {}   This month: {}   Cancelled this month: {}",
        s.today, s.week, s.month, s.cancelled_this_month
    );

    println!("\nToday's appointments:");
    let today = filter::visible(store.items(), &ViewQuery::default(), now);
    if today.is_empty() {
        println!("  (none)");
    }
    for apt in today {
        println!(
            "  {}  {} {}  [{}]  {}",
            apt.scheduled_at.format("%H:%M"),
            apt.patient_first_name,
            apt.patient_last_name,
            apt.status.label(),
            apt.reason
        );
    }

    let soon = filter::upcoming_within(store.items(), now, 30);
    if !soon.is_empty() {
        let names: Vec<String> = soon
            .iter()
            .map(|a| format!("{} {}", a.patient_first_name, a.patient_last_name))
            .collect();
        println!("\nUpcoming in the next 30 minutes: {}", names.join(", "));
    }

    Ok(())
}
