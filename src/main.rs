use std::path::Path;
use std::process::exit;

use anyhow::{Context, Result};

use riskcast::api_client::{ApiClient, HttpTransport};
use riskcast::config;
use riskcast::ensemble::BootstrapEnsemble;
use riskcast::predict::{Predictor, risk_csv_name, write_risk_csv};
use riskcast::reference::{PositionEncoder, TeamTable};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let (Some(home), Some(away)) = (args.next(), args.next()) else {
        eprintln!("usage: riskcast <home team> <away team>");
        exit(2);
    };

    let api_key = config::api_key().context("FOOTBALL_API_KEY is not set")?;
    let teams = TeamTable::load(&config::teams_table_path())?;
    let encoder = PositionEncoder::load(&config::position_encoder_path())?;
    let ensemble = BootstrapEnsemble::load(&config::model_dir())?;

    let client = ApiClient::new(Box::new(HttpTransport::new(api_key)));
    let predictor = Predictor::new(client, teams, encoder, ensemble);

    let today = chrono::Utc::now().date_naive();
    let results = predictor.predict_match_risk(&home, &away, today)?;

    println!("{:<28} {:>8} {:>16}", "player", "p(inj)", "95% interval");
    for row in &results {
        println!(
            "{:<28} {:>8.3} [{:>5.3}, {:>5.3}]",
            row.player_name, row.probability, row.ci_lower, row.ci_upper
        );
    }

    let file = risk_csv_name(&home, &away);
    write_risk_csv(Path::new(&file), &results)?;
    println!("saved -> {file}");

    Ok(())
}
