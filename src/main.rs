use anyhow::Context;
use chrono::{Local, Timelike};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use stray_safe::config::cli::{
    AdoptCommand, BiteArgs, CampaignCommand, CaseCommand, Command, ContactCommand, DetectArgs,
    FeedingCommand, LearnCommand, MessageCommand, PostCommand, ProfileCommand, SosCommand,
    TaskCommand, DEFAULT_CONFIG_FILE,
};
use stray_safe::config::toml_config::LogFormat;
use stray_safe::core::adoption::{ApplicationForm, NewDog};
use stray_safe::core::auth::{can_access, Feature, Registration};
use stray_safe::core::awareness::{NewVideo, QUIZZES};
use stray_safe::core::cases::{CaseFilter, CaseUpdate, NewPrescription, Treatment};
use stray_safe::core::feeding::{export_csv, NewSlot};
use stray_safe::core::geo::eta_with_traffic;
use stray_safe::core::profile::ProfileUpdate;
use stray_safe::core::sos::{NewSos, SosFilter};
use stray_safe::core::triage::{severity_score, BiteResponses, Detection, Symptoms};
use stray_safe::core::vaccination::NewCampaign;
use stray_safe::domain::model::{Attachment, GeoPoint, NotificationPrefs, TaskReport, User, UserInfo};
use stray_safe::utils::error::ErrorSeverity;
use stray_safe::utils::{logger, validation::Validate};
use stray_safe::{AppConfig, CliConfig, LocalStorage, Platform, PlatformError};

type App = Platform<LocalStorage>;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config);

    match config.logging.format {
        LogFormat::Compact => logger::init_cli_logger(config.logging.verbose),
        LogFormat::Json => logger::init_json_logger(config.logging.verbose),
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::debug!("Data directory: {}", config.storage.data_dir);

    let storage = LocalStorage::new(config.storage.data_dir.clone());
    let platform = match Platform::from_config(storage, &config) {
        Ok(platform) => platform,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&cli, &config, &platform).await {
        let Some(e) = err.downcast_ref::<PlatformError>() else {
            tracing::error!("❌ {:#}", err);
            eprintln!("❌ {:#}", err);
            std::process::exit(1);
        };
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

/// `--config`, else `./stray-safe.toml` when present, else defaults.
fn load_config(cli: &CliConfig) -> anyhow::Result<AppConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => DEFAULT_CONFIG_FILE.to_string(),
        None => return Ok(AppConfig::default()),
    };
    AppConfig::from_file(&path).with_context(|| format!("Failed to load config file '{}'", path))
}

async fn login(cli: &CliConfig, platform: &App) -> stray_safe::Result<User> {
    let (Some(email), Some(password)) = (cli.user.as_deref(), cli.password.as_deref()) else {
        return Err(PlatformError::AuthError {
            message: "this command needs --user and --password".to_string(),
        });
    };
    platform.login(email, password).await
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A "lat,lon" pair, or a place name resolved through the geocoder.
async fn point_or_place(platform: &App, input: &str) -> GeoPoint {
    match input.parse::<GeoPoint>() {
        Ok(point) => point,
        Err(_) => platform.resolve_place(input).await,
    }
}

async fn run(cli: &CliConfig, config: &AppConfig, platform: &App) -> anyhow::Result<()> {
    match &cli.command {
        Command::Init => {
            let password = cli
                .password
                .clone()
                .or_else(|| config.admin.password.clone())
                .ok_or_else(|| PlatformError::MissingConfigError {
                    field: "admin.password".to_string(),
                })?;
            let phone = Some(config.admin.phone.clone()).filter(|p| !p.is_empty());
            let created = platform
                .ensure_admin(&config.admin.email, &config.admin.name, &password, phone)
                .await?;
            if created {
                println!("✅ Admin account {} created", config.admin.email);
            } else {
                println!("ℹ️  Admin account {} already exists", config.admin.email);
            }
        }
        Command::Register {
            email,
            name,
            role,
            phone,
        } => {
            let password = cli.password.clone().ok_or_else(|| {
                PlatformError::validation("--password is required to register")
            })?;
            let user = platform
                .register(Registration {
                    email: email.clone(),
                    name: name.clone(),
                    password,
                    role: (*role).into(),
                    phone: phone.clone(),
                })
                .await?;
            println!("✅ Registered {} as {}", user.email, user.role);
        }
        Command::Users => {
            let actor = login(cli, platform).await?;
            print_json(&platform.list_users(&actor).await?)?;
        }
        Command::SetRole { email, role } => {
            let actor = login(cli, platform).await?;
            let user = platform.set_role(&actor, email, *role).await?;
            println!("✅ {} is now {}", user.email, user.role);
        }
        Command::SetActive { email, active } => {
            let actor = login(cli, platform).await?;
            let user = platform.set_active(&actor, email, *active).await?;
            println!("✅ {} active: {}", user.email, user.active);
        }
        Command::Locate { coords } => {
            let actor = login(cli, platform).await?;
            platform.set_location(&actor, *coords).await?;
            println!("📍 Location saved: {}", coords);
        }
        Command::Sos(cmd) => run_sos(cli, platform, cmd).await?,
        Command::Case(cmd) => run_case(cli, platform, cmd).await?,
        Command::Detect(args) => run_detect(cli, platform, args).await?,
        Command::BiteAssess(args) => run_bite(cli, platform, args).await?,
        Command::Hotspots {
            near,
            radius_km,
            summary,
        } => {
            if *summary {
                print_json(&platform.hotspot_summary().await?)?;
            } else if let Some(point) = near {
                print_json(&platform.hotspots_near(*point, *radius_km).await?)?;
            } else {
                print_json(&platform.hotspots().await?)?;
            }
        }
        Command::Campaign(cmd) => run_campaign(cli, platform, cmd).await?,
        Command::Feeding(cmd) => run_feeding(cli, platform, cmd).await?,
        Command::Adopt(cmd) => run_adopt(cli, platform, cmd).await?,
        Command::Task(cmd) => run_task(cli, platform, cmd).await?,
        Command::Message(cmd) => run_message(cli, platform, cmd).await?,
        Command::Post(cmd) => run_post(cli, platform, cmd).await?,
        Command::Donate {
            amount,
            purpose,
            anonymous,
        } => {
            let actor = match cli.user {
                Some(_) => Some(login(cli, platform).await?),
                None => None,
            };
            let donation = platform
                .donate(actor.as_ref(), *amount, purpose, *anonymous)
                .await?;
            println!(
                "💚 Thank you {}! {:.2} recorded for {} ({})",
                donation.donor, donation.amount, donation.purpose, donation.id
            );
        }
        Command::Search { query } => print_json(&platform.global_search(query).await?)?,
        Command::Geocode { query, limit } => {
            print_json(&platform.search_places(query, *limit).await?)?
        }
        Command::Route { from, to, mode } => {
            let from = point_or_place(platform, from).await;
            let to = point_or_place(platform, to).await;
            let routes = platform.routes(from, to, (*mode).into()).await?;
            if routes.is_empty() {
                println!("No route found between {} and {}", from, to);
            }
            let hour = Local::now().hour();
            for route in &routes {
                let eta = eta_with_traffic(route, hour);
                println!(
                    "{} Route {}: {}, {} ({} min with {:?} traffic), {} steps",
                    if route.is_fastest { "🏁" } else { "  " },
                    route.route_id,
                    route.distance_text(),
                    route.duration_text(),
                    eta.adjusted_min,
                    eta.level,
                    route.steps.len()
                );
            }
        }
        Command::Report { kind, format } => {
            let actor = login(cli, platform).await?;
            if !can_access(actor.role, Feature::ImpactAnalytics) {
                return Err(PlatformError::denied("export reports", actor.role).into());
            }
            let path = platform.export_report(*kind, *format).await?;
            let full = Path::new(&config.storage.data_dir).join(&path);
            println!("📁 Report saved to: {}", full.display());
        }
        Command::Notifications { limit, mark_read } => {
            let actor = login(cli, platform).await?;
            let unread = platform.unread_notifications(&actor.email).await?;
            println!("🔔 {} unread", unread);
            print_json(&platform.recent_notifications(&actor.email, *limit).await?)?;
            if *mark_read {
                let marked = platform.mark_notifications_read(&actor.email).await?;
                println!("✅ Marked {} notification(s) read", marked);
            }
        }
        Command::Audit { limit } => {
            let actor = login(cli, platform).await?;
            print_json(&platform.audit_log(&actor, *limit).await?)?;
        }
        Command::Sync { drain } => {
            let store = platform.store();
            if !*drain {
                println!("🔄 {} operation(s) waiting to sync", store.pending_count().await?);
                return Ok(());
            }
            let actor = login(cli, platform).await?;
            if !can_access(actor.role, Feature::AdminPanel) {
                return Err(PlatformError::denied("drain the sync queue", actor.role).into());
            }
            print_json(&store.drain_pending().await?)?;
        }
        Command::Profile(cmd) => run_profile(cli, platform, cmd).await?,
        Command::Contact(cmd) => run_contact(cli, platform, cmd).await?,
        Command::Learn(cmd) => run_learn(cli, platform, cmd).await?,
    }
    Ok(())
}

async fn run_profile(cli: &CliConfig, platform: &App, cmd: &ProfileCommand) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    match cmd {
        ProfileCommand::Show => {
            print_json(&UserInfo::from(&actor))?;
            println!("📝 {}", actor.bio);
            println!(
                "🔔 email alerts: {}, sms alerts: {}",
                actor.preferences.email, actor.preferences.sms
            );
        }
        ProfileCommand::Update { name, phone, bio } => {
            let user = platform
                .update_profile(
                    &actor,
                    ProfileUpdate {
                        name: name.clone(),
                        phone: phone.clone(),
                        bio: bio.clone(),
                    },
                )
                .await?;
            println!("✅ Profile updated for {}", user.email);
        }
        ProfileCommand::Password { new, confirm } => {
            let current = cli.password.clone().unwrap_or_default();
            platform.change_password(&actor, &current, new, confirm).await?;
            println!("🔒 Password changed");
        }
        ProfileCommand::Alerts { email, sms } => {
            let prefs = NotificationPrefs {
                email: email.unwrap_or(actor.preferences.email),
                sms: sms.unwrap_or(actor.preferences.sms),
            };
            let saved = platform.set_notification_prefs(&actor, prefs).await?;
            println!("🔔 email alerts: {}, sms alerts: {}", saved.email, saved.sms);
        }
    }
    Ok(())
}

async fn run_contact(cli: &CliConfig, platform: &App, cmd: &ContactCommand) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    match cmd {
        ContactCommand::List => print_json(&platform.contact_book(&actor.email).await?)?,
        ContactCommand::Request { email } => {
            let link = platform.request_contact(&actor, email).await?;
            println!("📨 Request sent to {}", link.contact);
        }
        ContactCommand::Accept { email } => {
            platform.respond_contact(&actor, email, true).await?;
            println!("✅ {} added to contacts", email);
        }
        ContactCommand::Reject { email } => {
            platform.respond_contact(&actor, email, false).await?;
            println!("❌ Request from {} rejected", email);
        }
        ContactCommand::Remove { email } => {
            if platform.remove_contact(&actor, email).await? {
                println!("✅ {} removed", email);
            } else {
                println!("ℹ️  {} was not a contact", email);
            }
        }
        ContactCommand::Block { email } => {
            let entry = platform.block_user(&actor, email).await?;
            println!("🚫 {} blocked", entry.blocked);
        }
        ContactCommand::Unblock { email } => {
            if platform.unblock_user(&actor, email).await? {
                println!("🔓 {} unblocked", email);
            } else {
                println!("ℹ️  {} was not blocked", email);
            }
        }
    }
    Ok(())
}

async fn run_learn(cli: &CliConfig, platform: &App, cmd: &LearnCommand) -> anyhow::Result<()> {
    match cmd {
        LearnCommand::Videos { category, query } => {
            return print_json(&platform.search_videos(*category, query.as_deref()).await?);
        }
        LearnCommand::Quizzes => return print_json(&QUIZZES),
        LearnCommand::Like { id } => {
            println!("👍 {} like(s)", platform.like_video(id).await?);
            return Ok(());
        }
        _ => {}
    }

    let actor = login(cli, platform).await?;
    match cmd {
        LearnCommand::AddVideo {
            title,
            url,
            category,
            difficulty,
            description,
        } => {
            let video = platform
                .add_video(
                    &actor,
                    NewVideo {
                        title: title.clone(),
                        url: url.clone(),
                        category: *category,
                        difficulty: *difficulty,
                        description: description.clone(),
                    },
                )
                .await?;
            println!("📺 Added {} '{}'", video.id, video.title);
        }
        LearnCommand::Complete { id } => {
            let progress = platform.complete_video(&actor, id).await?;
            println!("🎉 {} completed, {} points total", id, progress.total_points);
        }
        LearnCommand::Bookmark { id } => {
            if platform.toggle_bookmark(&actor, id).await? {
                println!("🔖 {} bookmarked", id);
            } else {
                println!("🔖 {} removed from bookmarks", id);
            }
        }
        LearnCommand::Quiz { id, score } => {
            let outcome = platform.submit_quiz(&actor, id, *score).await?;
            if outcome.passed {
                println!("✅ Passed with {}% (+{} points)", score, outcome.points_awarded);
            } else {
                println!("❌ {}% - try again to pass", score);
            }
            if let Some(badge) = outcome.badge {
                println!("🏅 {}", badge);
            }
        }
        LearnCommand::Progress => print_json(&platform.learning_progress(&actor.email).await?)?,
        LearnCommand::Videos { .. } | LearnCommand::Quizzes | LearnCommand::Like { .. } => {
            unreachable!("handled above")
        }
    }
    Ok(())
}

async fn run_sos(cli: &CliConfig, platform: &App, cmd: &SosCommand) -> anyhow::Result<()> {
    if let SosCommand::List {
        status,
        severity,
        sort,
    } = cmd
    {
        let filter = SosFilter {
            statuses: status.clone(),
            severities: severity.clone(),
            sort: (*sort).into(),
        };
        print_json(&platform.list_sos(&filter).await?)?;
        return print_json(&platform.sos_overview().await?);
    }

    let actor = login(cli, platform).await?;
    let alert = match cmd {
        SosCommand::Create {
            severity,
            kind,
            place,
            coords,
            description,
            contact,
            dogs,
            attachment,
        } => {
            let mut new = NewSos::new(*severity, *kind);
            new.place = place.clone();
            new.coords = *coords;
            new.description = description.clone();
            new.contact = contact.clone();
            new.estimated_dogs = *dogs;
            new.attachment = attachment.as_deref().map(Attachment::from_path);

            let receipt = platform.create_sos(&actor, new).await?;
            println!("🚨 SOS {} created at {}", receipt.sos.id, receipt.sos.place);
            println!(
                "📨 Alerts: {} email(s), {} SMS, {} skipped, {} failed",
                receipt.alert.emails_sent,
                receipt.alert.sms_sent,
                receipt.alert.skipped,
                receipt.alert.failures.len()
            );
            println!("📋 Task {} opened", receipt.task_id);
            return Ok(());
        }
        SosCommand::Quick => platform.quick_sos(&actor).await?,
        SosCommand::Assign { id, assignee } => platform.assign_sos(&actor, id, assignee).await?,
        SosCommand::Accept { id } => platform.accept_sos(&actor, id).await?,
        SosCommand::Resolve { id } => platform.resolve_sos(&actor, id).await?,
        SosCommand::Close { id } => platform.close_sos(&actor, id).await?,
        SosCommand::List { .. } => unreachable!("handled above"),
    };
    println!("✅ SOS {} is {}", alert.id, alert.status);
    Ok(())
}

async fn run_case(cli: &CliConfig, platform: &App, cmd: &CaseCommand) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    let case = match cmd {
        CaseCommand::List {
            status,
            severity,
            disease,
            sort,
        } => {
            let filter = CaseFilter {
                status: *status,
                severity: *severity,
                disease: disease.clone(),
                sort: (*sort).into(),
            };
            return print_json(&platform.list_cases(&filter).await?);
        }
        CaseCommand::Search { query } => return print_json(&platform.search_cases(query).await?),
        CaseCommand::Stats => {
            return print_json(&platform.case_stats(Local::now().date_naive()).await?)
        }
        CaseCommand::Update {
            id,
            status,
            severity,
            vet,
            notes,
            plan,
            follow_up,
        } => {
            let update = CaseUpdate {
                status: *status,
                severity: *severity,
                assigned_vet: vet.clone(),
                vet_notes: notes.clone(),
                treatment_plan: plan.clone(),
                follow_up_date: *follow_up,
            };
            platform.update_case(&actor, id, update).await?
        }
        CaseCommand::Claim { id } => platform.claim_case(&actor, id).await?,
        CaseCommand::Treat {
            id,
            notes,
            medication,
            outcome,
        } => {
            let treatment = Treatment {
                notes: notes.clone(),
                medication: medication.clone(),
                outcome: outcome.clone(),
            };
            platform.record_treatment(&actor, id, treatment).await?
        }
        CaseCommand::Resolve { id } => platform.resolve_case(&actor, id).await?,
        CaseCommand::Archive { id } => platform.archive_case(&actor, id).await?,
        CaseCommand::Prescribe {
            case_id,
            medication,
            dosage,
            frequency,
            days,
            notes,
        } => {
            let rx = platform
                .prescribe(
                    &actor,
                    case_id,
                    NewPrescription {
                        medication: medication.clone(),
                        dosage: dosage.clone(),
                        frequency: frequency.clone(),
                        duration_days: *days,
                        notes: notes.clone(),
                    },
                )
                .await?;
            println!("💊 Prescription {} added to {}", rx.id, case_id);
            return Ok(());
        }
    };
    println!("✅ Case {} is {} ({})", case.id, case.status, case.severity);
    Ok(())
}

async fn run_detect(cli: &CliConfig, platform: &App, args: &DetectArgs) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    let symptoms = Symptoms {
        appetite_loss: args.appetite_loss,
        scratching: args.scratching,
        spreading: args.spreading,
        lethargy: args.lethargy,
    };

    let mut detections = Vec::with_capacity(args.results.len());
    for result in &args.results {
        let (class, confidence) = result.rsplit_once(':').ok_or_else(|| {
            PlatformError::validation(format!("expected 'class:confidence', got '{}'", result))
        })?;
        let confidence: f64 = confidence.trim().parse().map_err(|_| {
            PlatformError::validation(format!("confidence is not a number in '{}'", result))
        })?;
        let class = class.trim().to_string();
        let score = severity_score(&class, confidence, &symptoms);
        detections.push(Detection {
            class,
            confidence,
            score,
        });
    }

    let coords = match args.coords {
        Some(point) => point,
        None => platform.resolve_place(&args.place).await,
    };
    let outcome = platform
        .record_detection(&actor, &args.place, coords, detections, &args.notes)
        .await?;
    for case in &outcome.cases {
        println!("🩺 {} {} ({}) at {}", case.id, case.disease, case.severity, case.place);
    }
    println!("🗺️  {} hotspot(s) added", outcome.hotspots.len());
    Ok(())
}

async fn run_bite(cli: &CliConfig, platform: &App, args: &BiteArgs) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    let calm = BiteResponses::default();
    let responses = BiteResponses {
        aggression: args.aggression.unwrap_or(calm.aggression),
        body_language: args.body_language.unwrap_or(calm.body_language),
        eye_contact: args.eye_contact.unwrap_or(calm.eye_contact),
        territorial: args.territorial.unwrap_or(calm.territorial),
        past_behavior: args.past_behavior.unwrap_or(calm.past_behavior),
        approach: args.approach.unwrap_or(calm.approach),
        food_guarding: args.food_guarding.unwrap_or(calm.food_guarding),
        space: args.space.unwrap_or(calm.space),
        health: args.health.unwrap_or(calm.health),
        pack: args.pack.unwrap_or(calm.pack),
    };
    let coords = match args.coords {
        Some(point) => point,
        None => platform.resolve_place(&args.place).await,
    };

    let assessment = platform
        .assess_bite_risk(&actor, &args.place, coords, responses, &args.notes)
        .await?;
    println!(
        "🐕 {}: {} (score {})",
        assessment.location, assessment.risk_level, assessment.risk_score
    );
    for tip in &assessment.recommendations {
        println!("  • {}", tip);
    }
    Ok(())
}

async fn run_campaign(cli: &CliConfig, platform: &App, cmd: &CampaignCommand) -> anyhow::Result<()> {
    match cmd {
        CampaignCommand::List => return print_json(&platform.campaigns().await?),
        CampaignCommand::Coverage => return print_json(&platform.zone_coverage().await?),
        CampaignCommand::Refresh => {
            let changed = platform.refresh_statuses(Local::now().date_naive()).await?;
            println!("🔄 {} campaign(s) updated", changed);
            return Ok(());
        }
        _ => {}
    }

    let actor = login(cli, platform).await?;
    let campaign = match cmd {
        CampaignCommand::Create {
            zone,
            date,
            coords,
            target,
            time_slot,
            vaccine,
            coordinator,
            volunteers,
            location_name,
            notes,
        } => {
            let new = NewCampaign {
                zone: zone.clone(),
                date: *date,
                time_slot: time_slot.clone(),
                target: *target,
                vaccine_type: vaccine.clone(),
                coordinator: coordinator.clone(),
                volunteers_needed: *volunteers,
                notes: notes.clone(),
                location: *coords,
                location_name: location_name.clone(),
            };
            platform.create_campaign(&actor, new).await?
        }
        CampaignCommand::Join { id } => platform.join_campaign(&actor, id).await?,
        CampaignCommand::Leave { id } => platform.leave_campaign(&actor, id).await?,
        CampaignCommand::Progress {
            id,
            completed,
            status,
        } => platform.record_progress(&actor, id, *completed, *status).await?,
        CampaignCommand::List | CampaignCommand::Coverage | CampaignCommand::Refresh => {
            unreachable!("handled above")
        }
    };
    println!(
        "💉 {} {} on {}: {}/{} ({:.1}%), {} spot(s) left, {}",
        campaign.id,
        campaign.zone,
        campaign.date,
        campaign.completed,
        campaign.target,
        campaign.progress_pct(),
        campaign.spots_left(),
        campaign.status
    );
    Ok(())
}

async fn run_feeding(cli: &CliConfig, platform: &App, cmd: &FeedingCommand) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    match cmd {
        FeedingCommand::Week { date } => {
            return print_json(&platform.slots_in_week(date.unwrap_or(today)).await?)
        }
        FeedingCommand::Export { date, out } => {
            let slots = platform.slots_in_week(date.unwrap_or(today)).await?;
            let csv = export_csv(&slots)?;
            match out {
                Some(path) => {
                    tokio::fs::write(path, csv)
                        .await
                        .with_context(|| format!("Failed to write '{}'", path))?;
                    println!("📁 {} slot(s) exported to {}", slots.len(), path);
                }
                None => print!("{}", csv),
            }
            return Ok(());
        }
        _ => {}
    }

    let actor = login(cli, platform).await?;
    let slot = match cmd {
        FeedingCommand::Create {
            location,
            date,
            time_label,
            capacity,
            food,
            notes,
        } => {
            let new = NewSlot {
                location: location.clone(),
                date: *date,
                time_label: time_label.clone(),
                capacity: *capacity,
                notes: notes.clone(),
                food_qty: food.clone(),
            };
            platform.create_slot(&actor, new).await?
        }
        FeedingCommand::Book { id } => platform.book_slot(&actor, id).await?,
        FeedingCommand::Cancel { id } => platform.cancel_booking(&actor, id).await?,
        FeedingCommand::Delete { id } => {
            let slot = platform.delete_slot(&actor, id).await?;
            println!("🗑️  Slot {} deleted", slot.id);
            return Ok(());
        }
        FeedingCommand::Week { .. } | FeedingCommand::Export { .. } => unreachable!("handled above"),
    };
    println!(
        "🍲 {} {} {} ({}): {}/{} booked",
        slot.id,
        slot.date,
        slot.time_label,
        slot.location,
        slot.booked(),
        slot.capacity
    );
    Ok(())
}

async fn run_adopt(cli: &CliConfig, platform: &App, cmd: &AdoptCommand) -> anyhow::Result<()> {
    if let AdoptCommand::List { all } = cmd {
        let dogs = if *all {
            platform.adoption_dogs().await?
        } else {
            platform.available_dogs().await?
        };
        return print_json(&dogs);
    }

    let actor = login(cli, platform).await?;
    match cmd {
        AdoptCommand::Submit {
            name,
            age,
            gender,
            breed,
            description,
            vaccinated,
            sterilized,
            photo,
        } => {
            let new = NewDog {
                name: name.clone(),
                breed: breed.clone(),
                age: age.clone(),
                gender: gender.clone(),
                description: description.clone(),
                vaccinated: *vaccinated,
                sterilized: *sterilized,
                photo: photo.as_deref().map(Attachment::from_path),
            };
            let dog = platform.submit_dog(&actor, new).await?;
            println!("🐶 {} listed as {} ({})", dog.name, dog.id, dog.status);
        }
        AdoptCommand::Review { id, reject } => {
            let dog = platform.review_dog(&actor, id, !reject).await?;
            println!("✅ {} is {}", dog.name, dog.status);
        }
        AdoptCommand::Apply {
            dog_id,
            name,
            phone,
            address,
            housing,
            yard,
            other_pets,
            experience,
            reason,
            household,
        } => {
            let form = ApplicationForm {
                applicant: name.clone(),
                phone: phone.clone(),
                address: address.clone(),
                housing_type: housing.clone(),
                has_yard: *yard,
                other_pets: *other_pets,
                experience: experience.clone(),
                reason: reason.clone(),
                household_members: *household,
            };
            let app = platform.apply(&actor, dog_id, form).await?;
            println!("📝 Application {} for {} submitted", app.id, app.dog_name);
        }
        AdoptCommand::Decide { id, reject, notes } => {
            let app = platform.decide_application(&actor, id, !reject, notes).await?;
            println!("✅ Application {} is {}", app.id, app.status);
        }
        AdoptCommand::Mine => print_json(&platform.my_applications(&actor).await?)?,
        AdoptCommand::List { .. } => unreachable!("handled above"),
    }
    Ok(())
}

async fn run_task(cli: &CliConfig, platform: &App, cmd: &TaskCommand) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    let task = match cmd {
        TaskCommand::List { mine } => {
            let tasks = if *mine {
                platform.my_tasks(&actor).await?
            } else {
                platform.open_tasks().await?
            };
            return print_json(&tasks);
        }
        TaskCommand::Claim { id } => platform.claim_task(&actor, id).await?,
        TaskCommand::Status { id, status } => platform.update_task_status(&actor, id, *status).await?,
        TaskCommand::Note { id, text } => platform.add_task_note(&actor, id, text).await?,
        TaskCommand::Report {
            id,
            notes,
            fed,
            rescued,
            vaccinated,
        } => {
            let report = TaskReport {
                notes: notes.clone(),
                dogs_fed: *fed,
                dogs_rescued: *rescued,
                dogs_vaccinated: *vaccinated,
                submitted_by: String::new(),
                submitted_at: None,
            };
            platform.submit_report(&actor, id, report).await?
        }
    };
    println!("✅ Task {} is {}", task.id, task.status);
    if let Some(took) = stray_safe::core::tasks::completion_time(&task) {
        println!("⏱️  Completed in {}", took);
    }
    Ok(())
}

async fn run_message(cli: &CliConfig, platform: &App, cmd: &MessageCommand) -> anyhow::Result<()> {
    let actor = login(cli, platform).await?;
    match cmd {
        MessageCommand::Send { to, text, convo } => {
            let message = platform
                .send_message(&actor, to, text, convo.as_deref())
                .await?;
            println!("✉️  Sent {} in {}", message.id, message.convo_id);
        }
        MessageCommand::Group { name, members } => {
            let group = platform.create_group(&actor, name, members).await?;
            println!("👥 Group {} ({}) created", group.name, group.id);
        }
        MessageCommand::Read { convo } => {
            let conversation = platform.get_conversation(convo).await?;
            if !conversation
                .members
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&actor.email))
            {
                return Err(PlatformError::denied(format!("read conversation {}", convo), actor.role).into());
            }
            for message in platform.conversation(convo).await? {
                println!(
                    "[{}] {}: {}",
                    message.time.format("%Y-%m-%d %H:%M"),
                    message.sender,
                    message.text
                );
            }
            platform.mark_read(convo, &actor.email).await?;
        }
        MessageCommand::Inbox => {
            println!("📬 {} unread", platform.unread_count(&actor.email).await?);
            print_json(&platform.inbox(&actor.email).await?)?;
        }
    }
    Ok(())
}

async fn run_post(cli: &CliConfig, platform: &App, cmd: &PostCommand) -> anyhow::Result<()> {
    if let PostCommand::List { limit } = cmd {
        let mut posts = platform.posts().await?;
        posts.truncate(*limit);
        return print_json(&posts);
    }

    let actor = login(cli, platform).await?;
    let post = match cmd {
        PostCommand::Create { content, image } => {
            platform
                .create_post(&actor, content, image.as_deref().map(Attachment::from_path))
                .await?
        }
        PostCommand::Like { id } => platform.toggle_like(&actor, id).await?,
        PostCommand::Comment { id, text } => platform.comment(&actor, id, text).await?,
        PostCommand::List { .. } => unreachable!("handled above"),
    };
    println!(
        "📣 {}: {} like(s), {} comment(s)",
        post.id,
        post.likes.len(),
        post.comments.len()
    );
    Ok(())
}
