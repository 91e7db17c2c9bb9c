use chrono::NaiveDate;
use sms_price_etl::core::Storage;
use sms_price_etl::{run_daily_pipeline, LocalStorage, PriceDiff, PriceRow, PricePipeline, TomlConfig};
use std::io::Read;
use tempfile::TempDir;

fn eml(lines: &[&str]) -> Vec<u8> {
    lines.join("\r\n").into_bytes()
}

fn acme_email(sweden: &str, norway: &str) -> Vec<u8> {
    let table = format!(
        "<table><tr><th>Country</th><th>Operator</th><th>Price (EUR)</th></tr>\
<tr><td>Sweden</td><td>Telia</td><td>{}</td></tr>\
<tr><td>Norway</td><td>Telenor</td><td>{}</td></tr></table>",
        sweden, norway
    );
    let body = format!(
        "<html><body><p>Dear partner, see the table below.</p>{}</body></html>",
        table
    );
    eml(&[
        "From: rates@acme.example",
        "To: pricing@example.com",
        "Subject: Acme price update",
        "MIME-Version: 1.0",
        "Content-Type: multipart/mixed; boundary=\"BOUNDARY\"",
        "",
        "--BOUNDARY",
        "Content-Type: text/html; charset=\"utf-8\"",
        "",
        &body,
        "--BOUNDARY",
        "Content-Type: text/csv; name=\"rates.csv\"",
        "Content-Disposition: attachment; filename=\"rates.csv\"",
        "",
        "Country,Network,Rate USD",
        "Chile,Entel,0.10",
        "--BOUNDARY--",
        "",
    ])
}

fn globex_email(country: &str, operator: &str, price: &str) -> Vec<u8> {
    eml(&[
        "From: noc@globex.example",
        "To: pricing@example.com",
        "Subject: Rate notification",
        "MIME-Version: 1.0",
        "Content-Type: text/plain; charset=\"utf-8\"",
        "",
        "Dear customer,",
        "",
        &format!("Country: {}", country),
        &format!("Operator: {}", operator),
        &format!("New price: {} EUR", price),
        "",
        "Regards,",
        "Globex",
        "",
    ])
}

async fn drop_emails(storage: &LocalStorage, acme: Vec<u8>, globex: Vec<u8>) {
    storage.write_file("emails/acme.eml", &acme).await.unwrap();
    storage.write_file("emails/globex.eml", &globex).await.unwrap();
}

fn pipeline(dir: &TempDir, date: &str) -> PricePipeline<LocalStorage> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    PricePipeline::new(LocalStorage::new(dir.path()), TomlConfig::default(), date).unwrap()
}

async fn read_json<T: serde::de::DeserializeOwned>(storage: &LocalStorage, path: &str) -> T {
    serde_json::from_slice(&storage.read_file(path).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_daily_pipeline_over_two_days() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());

    // Day 1: everything is new.
    drop_emails(
        &storage,
        acme_email("0.045", "0.050"),
        globex_email("Spain", "Movistar", "0.0600"),
    )
    .await;

    let day1 = run_daily_pipeline(pipeline(&dir, "2024-06-01"), false).await.unwrap();
    assert_eq!(day1.status, "success");
    assert_eq!(day1.report.summary, "📊 Summary: 0 price changes, 4 new routes");
    assert!(day1.download_url.starts_with("file://"));

    assert!(storage.exists("inbox_today/acme.eml").await.unwrap());
    let extraction: Vec<PriceRow> = read_json(&storage, "logs/extraction_2024-06-01.json").await;
    assert_eq!(extraction.len(), 4);
    let chile = extraction
        .iter()
        .find(|r| r.country.as_deref() == Some("Chile"))
        .unwrap();
    assert_eq!(chile.normalized_price, Some(0.092));
    assert_eq!(chile.original_currency.as_deref(), Some("USD"));
    assert_eq!(chile.base_currency.as_deref(), Some("EUR"));
    let spain = extraction
        .iter()
        .find(|r| r.country.as_deref() == Some("Spain"))
        .unwrap();
    assert_eq!(spain.provider.as_deref(), Some("globex"));
    assert_eq!(spain.operator.as_deref(), Some("Movistar"));

    // Day 2: two changes (one anomalous), one new route, one removed.
    drop_emails(
        &storage,
        acme_email("0.050", "0.120"),
        globex_email("Portugal", "MEO", "0.0700"),
    )
    .await;

    let day2 = run_daily_pipeline(pipeline(&dir, "2024-06-02"), false).await.unwrap();
    assert_eq!(
        day2.report.summary,
        "📊 Summary: 2 price changes, 1 new routes, ⚠️ 1 anomalies detected!"
    );
    assert!(day2
        .summary
        .contains("Diff: 2 changes, 1 new routes. Saved to logs/diff_2024-06-02.json"));

    let diff: PriceDiff = read_json(&storage, "logs/diff_2024-06-02.json").await;
    assert_eq!(diff.changed.len(), 2);
    assert_eq!(diff.changed[0].after.country.as_deref(), Some("Sweden"));
    assert_eq!(diff.changed[0].percent_change, 11.11);
    assert_eq!(diff.new[0].country.as_deref(), Some("Portugal"));
    assert_eq!(diff.removed[0].country.as_deref(), Some("Spain"));
    assert_eq!(diff.anomalies.len(), 1);
    assert_eq!(diff.anomalies[0].change.after.country.as_deref(), Some("Norway"));
    assert_eq!(diff.anomalies[0].severity.as_str(), "critical");
    assert_eq!(diff.summary.unchanged, 1);

    let latest: Vec<PriceRow> = read_json(&storage, "logs/latest.json").await;
    let parsed: Vec<PriceRow> = read_json(&storage, "logs/parsed_2024-06-02.json").await;
    assert_eq!(latest, parsed);

    let html = String::from_utf8(
        storage
            .read_file("summaries/summary_2024-06-02.html")
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(html.contains("Anomalies Detected"));
    assert!(html.contains("Norway"));
    assert!(html.contains("Portugal"));

    let zip_data = storage.read_file("summaries/report_2024-06-02.zip").await.unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["summary.html", "diff.json", "prices.csv"]);

    let mut csv_text = String::new();
    archive
        .by_name("prices.csv")
        .unwrap()
        .read_to_string(&mut csv_text)
        .unwrap();
    assert_eq!(csv_text.lines().count(), 5);
    assert!(csv_text.contains("Portugal"));
}

#[tokio::test]
async fn test_steps_require_previous_artefacts() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir, "2024-06-01");

    let err = pipeline.diff_and_snapshot().await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.recovery_suggestion().contains("extract"));
    assert_eq!(err.exit_code(), 0);

    let err = pipeline.generate_summary().await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.recovery_suggestion().contains("diff"));
}

#[tokio::test]
async fn test_steps_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    drop_emails(
        &storage,
        acme_email("0.045", "0.050"),
        globex_email("Spain", "Movistar", "0.0600"),
    )
    .await;

    let pipeline = pipeline(&dir, "2024-06-01");
    assert_eq!(pipeline.fetch_emails().await.unwrap(), 2);
    assert_eq!(pipeline.extract_rows().await.unwrap().len(), 4);

    let result = pipeline.diff_and_snapshot().await.unwrap();
    assert_eq!(result.diff.summary.new_count, 4);

    let report = pipeline.generate_summary().await.unwrap();
    assert!(report.storage_path.ends_with("summary_2024-06-01.html"));
    assert!(report.archive_path.unwrap().ends_with("report_2024-06-01.zip"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    drop_emails(
        &storage,
        acme_email("0.045", "0.050"),
        globex_email("Spain", "Movistar", "0.0600"),
    )
    .await;

    let mut config = TomlConfig::default();
    config.extract.max_messages = 1;
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let pipeline = PricePipeline::new(LocalStorage::new(dir.path()), config, date).unwrap();

    let keys = pipeline.dry_run().await.unwrap();
    assert_eq!(keys, vec!["emails/acme.eml".to_string()]);
    assert!(storage.list("inbox_today/", "").await.unwrap().is_empty());
    assert!(storage.list("logs/", "").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_emails_folder() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(&dir, "2024-06-01");
    assert_eq!(pipeline.fetch_emails().await.unwrap(), 0);
    assert!(pipeline.extract_rows().await.unwrap().is_empty());
}
