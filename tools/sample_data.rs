//! Sample Data Generator
//!
//! Writes an aligned pair of job-listing CSVs for trying the dashboard
//! without the original dataset: raw listings for upload, the processed
//! feature file the scorer reads, and a linear model artifact over those
//! features.
//!
//! Usage: `sample-data [out_dir] [count] [fraud_rate] [seed]`

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

const RAW_HEADER: [&str; 10] = [
    "job_id",
    "title",
    "location",
    "department",
    "salary_range",
    "description",
    "requirements",
    "telecommuting",
    "has_company_logo",
    "has_questions",
];

/// Processed feature columns, in model input order
const FEATURES: [&str; 8] = [
    "desc_length",
    "requirements_length",
    "title_words",
    "telecommuting",
    "has_company_logo",
    "has_questions",
    "salary_missing",
    "urgency_terms",
];

struct Listing {
    job_id: u64,
    title: String,
    location: String,
    department: String,
    salary_range: String,
    description: String,
    requirements: String,
    telecommuting: bool,
    has_company_logo: bool,
    has_questions: bool,
}

impl Listing {
    fn raw_record(&self) -> Vec<String> {
        vec![
            self.job_id.to_string(),
            self.title.clone(),
            self.location.clone(),
            self.department.clone(),
            self.salary_range.clone(),
            self.description.clone(),
            self.requirements.clone(),
            flag(self.telecommuting),
            flag(self.has_company_logo),
            flag(self.has_questions),
        ]
    }

    /// Same order as `FEATURES`
    fn features(&self) -> Vec<f64> {
        let text = format!("{} {}", self.title, self.description).to_lowercase();
        let urgency = ["urgent", "immediate", "no experience", "wire", "$$$"]
            .iter()
            .filter(|term| text.contains(*term))
            .count();
        vec![
            self.description.chars().count() as f64 / 1000.0,
            self.requirements.chars().count() as f64 / 1000.0,
            self.title.split_whitespace().count() as f64,
            bool_value(self.telecommuting),
            bool_value(self.has_company_logo),
            bool_value(self.has_questions),
            bool_value(self.salary_range.is_empty()),
            urgency as f64,
        ]
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn bool_value(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Listing generator for demos
struct ListingGenerator {
    rng: StdRng,
    listing_counter: u64,
}

impl ListingGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            listing_counter: 0,
        }
    }

    /// Generate an ordinary listing from an established employer
    fn generate_legitimate(&mut self) -> Listing {
        self.listing_counter += 1;
        let title = self
            .random_choice(&[
                "Senior Software Engineer",
                "Marketing Coordinator",
                "Customer Success Manager",
                "Data Analyst",
                "Registered Nurse",
                "Account Executive",
                "Warehouse Associate",
            ])
            .to_string();
        let paragraphs = self.rng.gen_range(3..8);
        let description = (0..paragraphs)
            .map(|_| {
                self.random_choice(&[
                    "You will join a team shipping products used by thousands of customers.",
                    "We offer a structured onboarding program and regular mentoring.",
                    "The role reports to the department lead and works with product and design.",
                    "Our office is located downtown with flexible hybrid arrangements.",
                    "Benefits include health coverage, retirement matching and paid leave.",
                    "You will own projects end to end and present results to stakeholders.",
                ])
            })
            .collect::<Vec<_>>()
            .join(" ");

        Listing {
            job_id: self.listing_counter,
            title,
            location: self
                .random_choice(&[
                    "US, NY, New York",
                    "US, CA, San Francisco",
                    "GB, LND, London",
                    "DE, BE, Berlin",
                    "US, TX, Austin",
                ])
                .to_string(),
            department: self
                .random_choice(&["Engineering", "Marketing", "Sales", "Operations", ""])
                .to_string(),
            salary_range: if self.rng.gen_bool(0.3) {
                let low = self.rng.gen_range(40..90) * 1000;
                format!("{}-{}", low, low + self.rng.gen_range(10..40) * 1000)
            } else {
                String::new()
            },
            description,
            requirements: self
                .random_choice(&[
                    "3+ years of relevant experience. Strong written communication.",
                    "Bachelor's degree or equivalent experience.",
                    "Valid license and two references.",
                ])
                .to_string(),
            telecommuting: self.rng.gen_bool(0.05),
            has_company_logo: self.rng.gen_bool(0.85),
            has_questions: self.rng.gen_bool(0.5),
        }
    }

    /// Generate a listing with the usual scam markers
    fn generate_suspicious(&mut self) -> Listing {
        self.listing_counter += 1;
        Listing {
            job_id: self.listing_counter,
            title: self
                .random_choice(&[
                    "Data Entry Clerk URGENT",
                    "Work From Home Administrative Assistant",
                    "Immediate Start Payroll Clerk",
                    "Mystery Shopper",
                ])
                .to_string(),
            location: self
                .random_choice(&["US, TX, Houston", "US, , ", "", "US, CA, Bakersfield"])
                .to_string(),
            department: String::new(),
            salary_range: String::new(),
            description: self
                .random_choice(&[
                    "Earn $$$ weekly from home, no experience needed. Immediate hiring.",
                    "Urgent! Process payments and wire funds to our partners. Training provided.",
                    "Flexible hours, weekly pay. Send your bank details to get started.",
                ])
                .to_string(),
            requirements: String::new(),
            telecommuting: self.rng.gen_bool(0.4),
            has_company_logo: self.rng.gen_bool(0.2),
            has_questions: self.rng.gen_bool(0.1),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// JSON artifact read by the dashboard's linear classifier
#[derive(Serialize)]
struct LinearModel {
    name: &'static str,
    intercept: f64,
    weights: BTreeMap<&'static str, f64>,
}

fn sample_model() -> LinearModel {
    let weights = FEATURES
        .iter()
        .copied()
        .zip([-1.2, -0.8, -0.15, 0.9, -1.6, -0.4, 0.3, 1.8])
        .collect();
    LinearModel {
        name: "sample-linear",
        intercept: -0.5,
        weights,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_data=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let out_dir = args.get(1).map(|s| s.as_str()).unwrap_or("data");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(200);
    let fraud_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);
    let seed: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(42);

    info!(
        out_dir = %out_dir,
        count = count,
        fraud_rate = fraud_rate,
        seed = seed,
        "Configuration loaded"
    );

    let out = Path::new(out_dir);
    fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;

    let raw_path = out.join("job_postings_sample.csv");
    let processed_path = out.join("X_test_processed.csv");
    let keyed_path = out.join("X_test_processed_keyed.csv");
    let model_path = out.join("linear_model.json");

    let mut raw = csv::Writer::from_path(&raw_path)?;
    let mut processed = csv::Writer::from_path(&processed_path)?;
    let mut keyed = csv::Writer::from_path(&keyed_path)?;

    raw.write_record(RAW_HEADER)?;
    processed.write_record(FEATURES)?;
    keyed.write_record(std::iter::once("job_id").chain(FEATURES))?;

    let mut generator = ListingGenerator::new(seed);
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for _ in 0..count {
        let listing = if generator.rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let features: Vec<String> = listing.features().iter().map(|v| v.to_string()).collect();
        raw.write_record(listing.raw_record())?;
        processed.write_record(&features)?;
        keyed.write_record(std::iter::once(listing.job_id.to_string()).chain(features))?;
    }

    raw.flush()?;
    processed.flush()?;
    keyed.flush()?;

    fs::write(&model_path, serde_json::to_string_pretty(&sample_model())?)
        .with_context(|| format!("Failed to write {}", model_path.display()))?;

    info!(
        "Completed! Wrote {} listings ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );
    info!("Raw listings:       {}", raw_path.display());
    info!("Processed features: {}", processed_path.display());
    info!("Keyed features:     {}", keyed_path.display());
    info!("Linear model:       {}", model_path.display());

    Ok(())
}
