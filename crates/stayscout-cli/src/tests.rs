use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use stayscout_core::{AppConfig, ListingRecord, PhotoRecord, RunParams};
use stayscout_scraper::{RenderError, ScraperError, SourceOutput, SourceReport};

use super::*;
use crate::crawl::{run_params, task_settings, CrawlOptions};
use crate::output::{read_document, reconcile, write_json, RunDocument};

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["stayscout"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn crawl_defaults_to_both_sources() {
    let cli = Cli::try_parse_from(["stayscout", "crawl", "--city", "Hangzhou"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Crawl {
            ref sources,
            ref city,
            pages: None,
            max_retries: None,
            delay: None,
            output: None,
        }) if sources == &[Source::Booking, Source::Ctrip] && city == "Hangzhou"
    ));
}

#[test]
fn crawl_accepts_comma_separated_sources_and_overrides() {
    let cli = Cli::try_parse_from([
        "stayscout",
        "crawl",
        "--source",
        "ctrip,booking",
        "--city",
        "17",
        "--pages",
        "5",
        "--max-retries",
        "1",
        "--delay",
        "0.5",
        "-o",
        "run.json",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Crawl {
            ref sources,
            pages: Some(5),
            max_retries: Some(1),
            output: Some(ref out),
            ..
        }) if sources == &[Source::Ctrip, Source::Booking] && out == &PathBuf::from("run.json")
    ));
}

#[test]
fn crawl_requires_city() {
    assert!(Cli::try_parse_from(["stayscout", "crawl"]).is_err());
}

#[test]
fn crawl_rejects_unknown_source() {
    assert!(Cli::try_parse_from(["stayscout", "crawl", "--city", "x", "--source", "expedia"]).is_err());
}

#[test]
fn merge_requires_inputs() {
    assert!(Cli::try_parse_from(["stayscout", "merge"]).is_err());
    let cli = Cli::try_parse_from(["stayscout", "merge", "a.json", "b.json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Merge { ref inputs, output: None }) if inputs.len() == 2
    ));
}

#[test]
fn profiles_parses_source_filter() {
    let cli = Cli::try_parse_from(["stayscout", "profiles", "--source", "b"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Profiles { ref sources }) if sources == &[Source::Ctrip]
    ));
}

fn config() -> AppConfig {
    AppConfig {
        log_level: "info".to_owned(),
        renderer_url: None,
        renderer_token: None,
        user_agent: "stayscout-test/0.1".to_owned(),
        nav_timeout_secs: 60,
        max_retries: 3,
        retry_base_delay_ms: 1000,
        request_delay_secs: 2.0,
        page_limit: 4,
        detail_limit: 3,
        photo_limit: 2,
        task_timeout_secs: None,
        profiles_path: None,
    }
}

fn options() -> CrawlOptions {
    CrawlOptions {
        sources: vec![Source::Ctrip],
        city: " Hangzhou ".to_owned(),
        pages: None,
        max_retries: Some(0),
        delay: None,
        output: None,
    }
}

#[test]
fn run_params_fall_back_to_config() {
    let params = run_params(&config(), &options()).unwrap();
    assert_eq!(params.page_limit, 4);
    assert_eq!(params.max_retries, 0);
    assert_eq!(params.city_or_region, "Hangzhou");
    assert!((params.request_delay_seconds - 2.0).abs() < f64::EPSILON);
}

#[test]
fn run_params_reject_zero_pages() {
    let opts = CrawlOptions {
        pages: Some(0),
        ..options()
    };
    assert!(run_params(&config(), &opts).is_err());
}

#[test]
fn task_settings_mirror_config() {
    let settings = task_settings(&config());
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.retry.base_delay, Duration::from_millis(1000));
    assert_eq!(settings.session.default_timeout, Duration::from_secs(60));
    assert_eq!(settings.detail_limit, 3);
    assert_eq!(settings.photo_limit, 2);
    assert_eq!(settings.task_timeout, None);
}

fn listing(source: Source, name: &str, reviews: u64, rating: f64) -> ListingRecord {
    ListingRecord {
        name: name.to_owned(),
        rating: Some(rating),
        review_count: reviews,
        price: Some(100),
        detail_url: format!("https://{source}.test/{reviews}"),
        thumbnail_url: None,
        source,
        scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
    }
}

fn output(source: Source, listings: Vec<ListingRecord>) -> SourceOutput {
    SourceOutput {
        source,
        listings,
        details: Vec::new(),
        photos: BTreeMap::new(),
        report: SourceReport::default(),
    }
}

#[test]
fn assemble_separates_failures_and_reconciles_successes() {
    let params = RunParams::new(&Source::ALL, "Hangzhou", 1, 0, 0.0).unwrap();
    let mut ctrip = output(Source::Ctrip, vec![listing(Source::Ctrip, "West Lake Inn", 300, 4.7)]);
    ctrip.photos.insert(
        "https://ctrip.test/300".to_owned(),
        vec![PhotoRecord {
            url: "https://dimg.test/1.jpg".to_owned(),
            caption: "Lobby".to_owned(),
            order: 0,
            is_official: true,
            source: Source::Ctrip,
        }],
    );
    let results = vec![
        (
            Source::Booking,
            Err(ScraperError::SessionStartup {
                site: Source::Booking,
                cause: RenderError::NoPage,
            }),
        ),
        (Source::Ctrip, Ok(ctrip)),
    ];

    let now = Utc::now();
    let document = RunDocument::assemble(params, now, now, results);

    assert_eq!(document.sources.len(), 1);
    assert_eq!(document.failures.len(), 1);
    assert_eq!(document.failures[0].source, Source::Booking);
    assert_eq!(document.entities.len(), 1);
    assert_eq!(document.entities[0].photos.len(), 1);
}

#[test]
fn reconcile_merges_across_documents() {
    let outputs = vec![
        output(Source::Booking, vec![listing(Source::Booking, "Grand Hotel", 500, 8.6)]),
        output(Source::Ctrip, vec![listing(Source::Ctrip, "GRAND hotel", 300, 4.7)]),
    ];
    let entities = reconcile(&outputs);
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].merged_rating, Some(8.6));
}

#[test]
fn run_document_round_trips_through_file() {
    let params = RunParams::new(&[Source::Booking], "Paris", 1, 0, 0.0).unwrap();
    let now = Utc::now();
    let document = RunDocument::assemble(
        params,
        now,
        now,
        vec![(
            Source::Booking,
            Ok(output(Source::Booking, vec![listing(Source::Booking, "Inn", 1, 7.0)])),
        )],
    );

    let path = std::env::temp_dir().join(format!("stayscout-{}.json", document.run_id));
    write_json(Some(&path), &document).unwrap();
    let loaded = read_document(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, document);
}
