use tracing_subscriber::EnvFilter;
use valpas_api::{login, Credentials};

fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credentials = Credentials::new(env("VALPAS_USERNAME"), env("VALPAS_PASSWORD"));
    let customer = env("VALPAS_CUSTOMER");
    let metering_point = env("VALPAS_METERING_POINT");

    let session = login(&credentials).await.expect("Logging in failed.");

    let end = chrono::Local::now();
    let start = end - chrono::Duration::days(1);
    let (consumption, prices) = tokio::join!(
        session.consumption(&customer, &metering_point, start, end),
        session.prices(&customer, start, end),
    );

    println!("Consumption from yesterday to now:");
    println!(
        "{:#}",
        consumption.expect("Querying consumption failed.")
    );
    println!("Spot prices from yesterday to now:");
    println!("{:#}", prices.expect("Querying prices failed."));
}
