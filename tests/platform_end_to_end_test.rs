use std::io::Read;
use stray_safe::core::analytics::{ReportFormat, ReportKind};
use stray_safe::core::auth::Registration;
use stray_safe::core::sos::{NewSos, SosFilter};
use stray_safe::core::triage::Detection;
use stray_safe::domain::model::{
    CaseStatus, EmergencyType, GeoPoint, Role, SosSeverity, SosStatus, TaskStatus,
};
use stray_safe::utils::validation::Validate;
use stray_safe::{AppConfig, LocalStorage, Platform, PlatformError};
use tempfile::TempDir;

fn write_config(dir: &TempDir) -> AppConfig {
    let data_dir = dir.path().join("data");
    let toml = format!(
        r#"
[platform]
name = "StraySafe Test"
notify_concurrency = 3

[storage]
data_dir = "{}"

[geocoding]
enabled = false

[routing]
enabled = false

[admin]
email = "root@straysafe.org"
name = "Root"
password = "admin-pass"
"#,
        data_dir.display()
    );
    let path = dir.path().join("stray-safe.toml");
    std::fs::write(&path, toml).unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    config.validate().unwrap();
    config
}

fn platform(config: &AppConfig) -> Platform<LocalStorage> {
    Platform::from_config(LocalStorage::new(config.storage.data_dir.clone()), config).unwrap()
}

async fn register(platform: &Platform<LocalStorage>, email: &str, role: Role) {
    platform
        .register(Registration {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            password: "secret123".to_string(),
            role,
            phone: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rescue_workflow_persists_to_disk() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let platform = platform(&config);

    let admin_password = config.admin.password.clone().unwrap();
    assert!(platform
        .ensure_admin(&config.admin.email, &config.admin.name, &admin_password, None)
        .await
        .unwrap());
    assert!(!platform
        .ensure_admin(&config.admin.email, &config.admin.name, &admin_password, None)
        .await
        .unwrap());

    register(&platform, "vet@clinic.in", Role::Vet).await;
    register(&platform, "vol@straysafe.org", Role::Volunteer).await;
    register(&platform, "citizen@mail.com", Role::User).await;

    let wrong = platform.login("citizen@mail.com", "nope-nope").await.unwrap_err();
    assert!(matches!(wrong, PlatformError::AuthError { .. }));

    let admin = platform.login("ROOT@straysafe.org ", "admin-pass").await.unwrap();
    let vet = platform.login("vet@clinic.in", "secret123").await.unwrap();
    let volunteer = platform.login("vol@straysafe.org", "secret123").await.unwrap();
    let citizen = platform.login("citizen@mail.com", "secret123").await.unwrap();

    // Emergency: reported by a citizen, handled by a volunteer, closed by admin.
    let mut new = NewSos::new(SosSeverity::High, EmergencyType::InjuredDog);
    new.place = Some("T Nagar".to_string());
    new.estimated_dogs = 2;
    let receipt = platform.create_sos(&citizen, new).await.unwrap();
    assert_eq!(receipt.sos.coords, Some(GeoPoint { lat: 13.0418, lon: 80.2341 }));
    assert_eq!(receipt.alert.skipped, 3);

    // Places outside the gazetteer fall back to the configured city center.
    assert_eq!(
        platform.resolve_place("Somewhere Unmapped").await,
        config.platform.city_center
    );

    platform.accept_sos(&volunteer, &receipt.sos.id).await.unwrap();
    assert!(platform.close_sos(&admin, &receipt.sos.id).await.is_err());
    let resolved = platform.resolve_sos(&volunteer, &receipt.sos.id).await.unwrap();
    assert_eq!(resolved.status, SosStatus::Resolved);
    platform.close_sos(&admin, &receipt.sos.id).await.unwrap();

    let tasks = platform.tasks().await.unwrap();
    let task = tasks.iter().find(|t| t.id == receipt.task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.volunteer.as_deref(), Some("vol@straysafe.org"));

    // Medical case from a detection, treated by the vet.
    let outcome = platform
        .record_detection(
            &volunteer,
            "Adyar",
            GeoPoint { lat: 13.0067, lon: 80.2571 },
            vec![Detection {
                class: "mange".to_string(),
                confidence: 0.91,
                score: 72,
            }],
            "hair loss on back",
        )
        .await
        .unwrap();
    let case_id = outcome.cases[0].id.clone();
    let claimed = platform.claim_case(&vet, &case_id).await.unwrap();
    assert_eq!(claimed.status, CaseStatus::InTreatment);
    let case = platform.resolve_case(&vet, &case_id).await.unwrap();
    assert_eq!(case.status, CaseStatus::Resolved);

    let metrics = platform.impact_metrics().await.unwrap();
    assert_eq!(metrics.sos_total, 1);
    assert_eq!(metrics.sos_resolved, 1);
    assert_eq!(metrics.cases_resolved, 1);
    assert_eq!(metrics.users, 4);

    // Reports land under the data directory.
    let report = platform
        .export_report(ReportKind::Cases, ReportFormat::Zip)
        .await
        .unwrap();
    assert!(report.starts_with("reports/cases_"));
    let zip_path = std::path::Path::new(&config.storage.data_dir).join(&report);
    let mut archive = zip::ZipArchive::new(std::fs::File::open(zip_path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cases.csv", "summary.csv", "summary.json"]);

    let mut cases_csv = String::new();
    archive
        .by_name("cases.csv")
        .unwrap()
        .read_to_string(&mut cases_csv)
        .unwrap();
    assert!(cases_csv.contains(&case_id));
    assert!(cases_csv.contains("resolved"));

    // A fresh platform over the same directory sees the same records.
    let reopened = self::platform(&config);
    let alerts = reopened.list_sos(&SosFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, SosStatus::Closed);
    assert!(reopened.login("vet@clinic.in", "secret123").await.is_ok());
    assert!(dir.path().join("data").join("users.json").exists());
}

#[tokio::test]
async fn test_corrupt_collection_is_reported_not_replaced() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let data_dir = std::path::Path::new(&config.storage.data_dir);
    std::fs::create_dir_all(data_dir).unwrap();
    std::fs::write(data_dir.join("users.json"), b"{ not json").unwrap();

    let platform = platform(&config);
    let err = platform.login("vet@clinic.in", "secret123").await.unwrap_err();
    assert!(matches!(err, PlatformError::CorruptCollection { .. }));

    let untouched = std::fs::read(data_dir.join("users.json")).unwrap();
    assert_eq!(untouched, b"{ not json");
}
