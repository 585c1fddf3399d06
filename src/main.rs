use std::env;
use std::error::Error;
use std::fs;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use carbon_emissions_pipeline::{
    CalculationContext, EmissionUnit, Outcome, Pipeline, PipelineConfig,
};

/// Small Melbourne depot fit-out, used when no input file is given.
const DEMO_CALCULATION: &str = r#"{
  "projectDetails": { "name": "Depot fit-out", "location": "VIC", "period": "FY2025" },
  "materials": [
    { "id": "concrete-32mpa", "name": "Ready Mix Concrete 32MPa", "quantity": 120,
      "unit": "m3", "factor": 420, "category": "concrete", "isCustom": false },
    { "id": "steel-custom", "name": "Steel", "quantity": 1000, "unit": "kg",
      "factor": 1.9, "category": "steel", "source": "NMEF v2025.1", "isCustom": true },
    { "id": "bad-row", "name": "Timber", "quantity": -5, "unit": "m3",
      "factor": 233, "category": "timber" }
  ],
  "fuelInputs": { "diesel_stationary": "500", "petrol": 80 },
  "electricityInputs": { "kwh": 12000 },
  "transportInputs": { "commute_car": 2400, "waste_general": "1.5" }
}"#;

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = PipelineConfig::from_env()?;
    init_tracing(&config.log_filter);

    let body = match env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => DEMO_CALCULATION.to_string(),
    };

    let pipeline = Pipeline::from_config(config)?;
    let ctx = CalculationContext::new();

    match pipeline.run_json(&ctx, &body)? {
        Outcome::Computed(report) => {
            let t = report.totals;
            println!("calculation,{}", report.calculation_id);
            println!("dataset,{}", report.dataset_version);
            println!("scope1,{:.3}", t.scope1);
            println!("scope2,{:.3}", t.scope2);
            println!("scope3_materials,{:.3}", t.scope3_materials);
            println!("scope3_transport,{:.3}", t.scope3_transport);
            println!("total,{:.3}", t.total);
            println!(
                "total_tco2e,{:.3}",
                EmissionUnit::KgCo2e.convert(t.total, EmissionUnit::TCo2e)
            );
            for row in &report.rejected {
                for issue in &row.issues {
                    println!("rejected,{},{}", row.index, issue);
                }
            }
            for warning in &report.warnings {
                println!("warning,{},{}", warning.subject, warning.message);
            }
        }
        Outcome::Invalid(errors) => {
            for issue in &errors.issues {
                println!("invalid,{issue}");
            }
        }
    }

    Ok(())
}
