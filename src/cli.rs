//! This module implements the CLI part of the application.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use scone_core::{
    aggregate::Aggregator,
    config::{Config, PublishConfig, PublishTarget},
    event::{group_by_name, normalize},
    filter::{select, FilterMode},
    publisher::{google::GoogleCalendar, ics::IcsCalendar, publish_all, PublishedEvent},
    time_window::TimeWindow,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Get notified about your favorite scones at Arizmendi Bakery")]
pub struct Arguments {
    /// TOML configuration file, built-in defaults are used without one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find this month's scones with the wanted ingredients
    Live {
        #[command(flatten)]
        args: LiveArgs,
    },
    /// Collect the dates of every scone from the calendar archive into a JSON file
    Bulk {
        #[command(flatten)]
        args: BulkArgs,
    },
}

#[derive(Debug, Args)]
pub struct LiveArgs {
    /// an ingredient to look for, may be repeated
    #[arg(short, long = "ingredient")]
    pub ingredients: Vec<String>,
    /// require every ingredient instead of any of them
    #[arg(long)]
    pub all: bool,
    /// include scones which were already served this month
    #[arg(long)]
    pub include_past: bool,
    /// only look this many days ahead
    #[arg(long)]
    pub days_ahead: Option<u32>,
    /// create calendar events for the found scones
    #[arg(long, value_enum)]
    pub publish: Option<Target>,
    /// add a reminder five minutes before opening, needs a publish target
    #[arg(long)]
    pub final_call: bool,
}

#[derive(Debug, Args)]
pub struct BulkArgs {
    /// first day to collect (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,
    /// day to stop at, exclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// the JSON file to write, it is overwritten
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    Google,
    Ics,
}

impl From<Target> for PublishTarget {
    fn from(value: Target) -> Self {
        match value {
            Target::Google => PublishTarget::Google,
            Target::Ics => PublishTarget::Ics,
        }
    }
}

impl LiveArgs {
    /// Let the given flags take precedence over the configuration.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if !self.ingredients.is_empty() {
            config.live.ingredients = self.ingredients.clone();
        }
        if self.all {
            config.live.mode = FilterMode::Intersection;
        }
        if self.include_past {
            config.live.future_only = false;
        }
        if let Some(days_ahead) = self.days_ahead {
            config.live.days_ahead = days_ahead;
        }
        if let Some(target) = self.publish {
            config.publish.get_or_insert_with(PublishConfig::default).target = target.into();
        }
        if self.final_call {
            let Some(publish) = config.publish.as_mut() else {
                bail!("--final-call needs --publish or a [publish] section in the configuration");
            };
            publish.final_call_reminder = true;
        }
        Ok(())
    }
}

impl BulkArgs {
    /// Let the given flags take precedence over the configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(start) = self.start {
            config.bulk.start = start;
        }
        if let Some(end) = self.end {
            config.bulk.end = end;
        }
        if let Some(output) = &self.output {
            config.bulk.output = output.clone();
        }
    }
}

pub async fn run(arguments: Arguments) -> Result<()> {
    let mut config = match &arguments.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None => Config::default(),
    };
    match arguments.command {
        Command::Live { args } => {
            args.apply(&mut config)?;
            run_live(&config).await?
        }
        Command::Bulk { args } => {
            args.apply(&mut config);
            run_bulk(&config).await?
        }
    };
    Ok(())
}

async fn run_live(config: &Config) -> Result<()> {
    let time_window = TimeWindow::now(config.tz()?);
    let client = config.client()?;
    let records = client.fetch_month(time_window.query_window()).await?;
    let events = normalize(&records, &time_window, &config.normalize_options())?;
    let selected = select(&events, &config.live.ingredients, config.live.mode);
    if selected.is_empty() {
        println!(
            "No scones with {} this month.",
            config.live.ingredients.join(", ")
        );
    }
    for (name, events) in group_by_name(&selected) {
        let dates: Vec<String> = events
            .iter()
            .map(|event| event.start.format("%a %m/%d").to_string())
            .collect();
        println!("{name}: {}", dates.join(", "));
    }

    let Some(publish_config) = &config.publish else {
        return Ok(());
    };
    let settings = config.publish_settings();
    let published: Vec<PublishedEvent> = match publish_config.target {
        PublishTarget::Google => {
            let _ = rustls::crypto::ring::default_provider().install_default();
            let mut calendar = GoogleCalendar::new(
                &publish_config.credentials_path,
                &publish_config.token_cache_path,
                publish_config.calendar_id.as_str(),
            )
            .await
            .context("cannot connect to Google Calendar")?;
            publish_all(&mut calendar, &selected, &settings).await?
        }
        PublishTarget::Ics => {
            let mut calendar = IcsCalendar::new(&publish_config.ics_path);
            let published = publish_all(&mut calendar, &selected, &settings).await?;
            if !published.is_empty() {
                info!(path = %calendar.path().display(), "wrote calendar file");
            }
            published
        }
    };
    for event in &published {
        println!("New Calendar Event created: {}", event.link);
    }
    info!(count = published.len(), "published scones");
    Ok(())
}

async fn run_bulk(config: &Config) -> Result<()> {
    let client = config.client()?;
    let aggregator = Aggregator::new(&client, config.tz()?, &config.bulk.output);
    let report = aggregator.run(config.bulk.start, config.bulk.end).await?;
    println!(
        "Took {:.2} seconds to get data from {} total months into {}.",
        report.elapsed.as_secs_f64(),
        report.months,
        aggregator.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use chrono::{Duration, Utc};
    use clap::Parser;
    use scone_core::{
        aggregate::AggregateStore,
        config::{Config, PublishConfig, PublishTarget},
        filter::FilterMode,
    };
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::cli::{run_bulk, run_live, Arguments, Command, LiveArgs};

    fn live_args(arguments: &[&str]) -> LiveArgs {
        let arguments = Arguments::parse_from(arguments);
        let Command::Live { args } = arguments.command else {
            panic!("expected the live command");
        };
        args
    }

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.retry.max_retries = 0;
        config
    }

    #[test]
    fn test_live_args_override_config() {
        let args = live_args(&[
            "scone-alert",
            "live",
            "-i",
            "raspberry",
            "--ingredient",
            "chocolate",
            "--all",
            "--include-past",
            "--days-ahead",
            "7",
            "--publish",
            "ics",
            "--final-call",
        ]);
        let mut config = Config::default();
        args.apply(&mut config).unwrap();
        assert_eq!(config.live.ingredients, ["raspberry", "chocolate"]);
        assert_eq!(config.live.mode, FilterMode::Intersection);
        assert!(!config.live.future_only);
        assert_eq!(config.live.days_ahead, 7);
        let publish = config.publish.unwrap();
        assert_eq!(publish.target, PublishTarget::Ics);
        assert!(publish.final_call_reminder);
    }

    #[test]
    fn test_live_without_flags_keeps_config() {
        let args = live_args(&["scone-alert", "live"]);
        let mut config = Config::default();
        args.apply(&mut config).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_final_call_needs_publish_target() {
        let args = live_args(&["scone-alert", "live", "--final-call"]);
        let mut config = Config::default();
        assert!(args.apply(&mut config).is_err());

        config.publish = Some(PublishConfig::default());
        args.apply(&mut config).unwrap();
        assert!(config.publish.unwrap().final_call_reminder);
    }

    #[test]
    fn test_bulk_args_override_config() {
        let arguments = Arguments::parse_from([
            "scone-alert",
            "--config",
            "scone.toml",
            "bulk",
            "--start",
            "2019-04-01",
            "--end",
            "2019-07-01",
            "-o",
            "spring.json",
        ]);
        assert_eq!(arguments.config.as_deref().and_then(|path| path.to_str()), Some("scone.toml"));
        let Command::Bulk { args } = arguments.command else {
            panic!("expected the bulk command");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.bulk.start.to_string(), "2019-04-01");
        assert_eq!(config.bulk.end.to_string(), "2019-07-01");
        assert_eq!(config.bulk.output.to_str(), Some("spring.json"));
    }

    #[tokio::test]
    async fn test_run_live_publishes_matches_to_ics() {
        let tomorrow = Utc::now() + Duration::days(1);
        let start = tomorrow.timestamp_millis();
        let end = start + 4 * 3_600_000;
        let body = serde_json::json!([
            {"title": "Raspberry Chocolate", "startDate": start, "endDate": end, "fullUrl": "/a"},
            {"title": "Lemon", "startDate": start, "endDate": end, "fullUrl": "/b"},
            {"title": "Raspberry", "startDate": start - 30 * 24 * 3_600_000_i64, "endDate": end - 30 * 24 * 3_600_000_i64, "fullUrl": "/c"},
        ]);
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let ics_path = dir.path().join("scones.ics");
        let mut config = config_for(&server);
        config.publish = Some(PublishConfig {
            target: PublishTarget::Ics,
            ics_path: ics_path.clone(),
            ..PublishConfig::default()
        });

        run_live(&config).await.unwrap();

        let ics = read_to_string(&ics_path).unwrap();
        assert!(ics.contains("SUMMARY:Raspberry Chocolate Scone @ Arizmendi"));
        assert!(!ics.contains("SUMMARY:Lemon"));
        // the plain raspberry was served a month ago
        assert!(!ics.contains("SUMMARY:Raspberry Scone"));
    }

    #[tokio::test]
    async fn test_run_bulk_writes_aggregate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("month", "12-2019"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"title": "Raspberry", "startDate": 1575388800000, "endDate": 1575403200000, "fullUrl": "/a"}]"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("month", "01-2020"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"title": "Raspberry", "startDate": 1578326400000, "fullUrl": "/b"}]"#,
            ))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let mut config = config_for(&server);
        config.bulk.start = "2019-12-01".parse().unwrap();
        config.bulk.end = "2020-02-01".parse().unwrap();
        config.bulk.output = dir.path().join("scraped_data.json");

        run_bulk(&config).await.unwrap();

        let store = AggregateStore::load(&config.bulk.output).unwrap();
        assert_eq!(
            store.dates("raspberry").unwrap(),
            ["12/03/2019", "01/06/2020"]
        );
    }
}
