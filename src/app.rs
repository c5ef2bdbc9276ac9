use crate::avatar;
use crate::dispatch::{DispatchOutcome, Dispatcher, Status, LOADING_PHRASES};
use crate::gemini::Analyzer;
use crate::input::{self, RequestDraft};
use crate::ledger::Profile;
use crate::models::{AnalysisRequest, Plan, PRICING_PLANS};
use crate::presenter::{self, CopyTracker};
use anyhow::{anyhow, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Fields for a one-shot analysis from the command line.
#[derive(Debug, Clone)]
pub struct OneShot {
    pub name: String,
    pub email: String,
    pub draft: RequestDraft,
    pub image: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub json: bool,
}

/// Dispatches `request`, printing the loading phrases until the call
/// resolves.
pub async fn analyze_with_progress<A>(
    dispatcher: &mut Dispatcher,
    analyzer: &A,
    request: &AnalysisRequest,
) -> DispatchOutcome
where
    A: Analyzer + ?Sized,
{
    analyze_reporting(dispatcher, analyzer, request, |emoji, text| {
        println!("  {} {}...", emoji, text)
    })
    .await
}

async fn analyze_reporting<A, F>(
    dispatcher: &mut Dispatcher,
    analyzer: &A,
    request: &AnalysisRequest,
    mut report: F,
) -> DispatchOutcome
where
    A: Analyzer + ?Sized,
    F: FnMut(&str, &str),
{
    let outcome = dispatcher.begin();
    let DispatchOutcome::Started(ticket) = outcome else {
        return outcome;
    };
    let Some(mut updates) = dispatcher.loading_updates() else {
        let result = analyzer.analyze(request).await;
        dispatcher.complete(ticket, result);
        return outcome;
    };

    let (emoji, text) = LOADING_PHRASES[*updates.borrow_and_update()];
    report(emoji, text);

    let call = analyzer.analyze(request);
    tokio::pin!(call);
    let result = loop {
        tokio::select! {
            result = &mut call => break result,
            changed = updates.changed() => match changed {
                Ok(()) => {
                    let (emoji, text) = LOADING_PHRASES[*updates.borrow_and_update()];
                    report(emoji, text);
                }
                Err(_) => break (&mut call).await,
            },
        }
    };

    dispatcher.complete(ticket, result);
    outcome
}

pub fn print_plans(current: Option<Plan>) {
    println!("\n💳 Plans");
    println!("========");
    for entry in PRICING_PLANS.iter() {
        let mut marker = String::new();
        if entry.recommended {
            marker.push_str(" ⭐ recommended");
        }
        if current == Some(entry.plan) {
            marker.push_str(" (current)");
        }
        println!("\n{} - {} ({}){}", entry.label, entry.price, entry.credits, marker);
        for feature in entry.features {
            println!("  ✓ {}", feature);
        }
    }
    println!();
}

fn print_share_links() {
    match presenter::share_links() {
        Ok(links) => {
            println!("\n🔗 Share");
            for link in links {
                println!("  {}: {}", link.label, link.href);
            }
        }
        Err(e) => error!("Could not build share links: {}", e),
    }
}

pub async fn run_once<A>(analyzer: &A, args: OneShot) -> Result<()>
where
    A: Analyzer + ?Sized,
{
    let mut draft = args.draft;
    if let Some(path) = &args.image {
        draft.attach_image(path).await?;
    }
    let request = draft.submit()?;

    let mut dispatcher = Dispatcher::new();
    dispatcher.login(Profile {
        name: args.name,
        email: args.email,
        avatar: None,
    });

    if args.json {
        dispatcher.run(analyzer, &request).await;
    } else {
        println!("\n⏳ Analyzing {}", request.business_name);
        analyze_with_progress(&mut dispatcher, analyzer, &request).await;
    }

    if let Some(message) = dispatcher.error() {
        return Err(anyhow!("Analysis failed: {}", message));
    }
    match dispatcher.result() {
        Some(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                println!("{}", presenter::render_terminal(result));
            }
            if let Some(dir) = &args.export_dir {
                let path = presenter::write_export(result, dir)?;
                if !args.json {
                    println!("📄 Report saved to {}", path.display());
                }
            }
            Ok(())
        }
        None => Err(anyhow!("Analysis did not run")),
    }
}

async fn login_interactive(theme: &ColorfulTheme) -> Result<Profile> {
    println!("\n👋 Sign in to OptiFlow");
    println!("======================");
    let name: String = Input::with_theme(theme)
        .with_prompt("Name")
        .allow_empty(true)
        .interact_text()?;
    let email: String = Input::with_theme(theme)
        .with_prompt("Email")
        .interact_text()?;
    let avatar_path: String = Input::with_theme(theme)
        .with_prompt("Avatar image path (optional)")
        .allow_empty(true)
        .interact_text()?;

    let avatar = if avatar_path.trim().is_empty() {
        None
    } else {
        let loaded = input::load_image(Path::new(avatar_path.trim()))
            .await
            .and_then(|image| avatar::crop_avatar(&image, None));
        match loaded {
            Ok(image) => Some(image),
            Err(e) => {
                println!("⚠️  {}", e);
                None
            }
        }
    };
    Ok(Profile { name, email, avatar })
}

/// Shows the plans and applies the chosen one. Simulated: no payment.
fn choose_plan(dispatcher: &mut Dispatcher, theme: &ColorfulTheme) -> Result<()> {
    print_plans(dispatcher.session().map(|s| s.plan));
    let mut items: Vec<&str> = PRICING_PLANS.iter().map(|p| p.label).collect();
    items.push("Cancel");
    let choice = Select::with_theme(theme)
        .with_prompt("Choose a plan")
        .default(1)
        .items(&items)
        .interact()?;
    let Some(plan) = items.get(choice).copied().and_then(Plan::from_label) else {
        return Ok(());
    };
    if let Some(credits) = dispatcher.upgrade(plan) {
        println!("🎉 Switched to {}: {} credits available", plan, credits);
    }
    Ok(())
}

fn result_menu(dispatcher: &mut Dispatcher, theme: &ColorfulTheme, export_dir: &Path) -> Result<()> {
    let mut tracker = CopyTracker::default();
    loop {
        let Some(result) = dispatcher.result() else {
            return Ok(());
        };
        let actions = [
            "Copy a field",
            "Export report",
            "Share links",
            "Show JSON",
            "New analysis",
        ];
        let choice = Select::with_theme(theme)
            .with_prompt("What next?")
            .default(0)
            .items(&actions)
            .interact()?;
        match choice {
            0 => {
                let now = Instant::now();
                tracker.prune(now);
                let fields = presenter::copyable_fields(result);
                let labels: Vec<String> = fields
                    .iter()
                    .map(|(key, text)| {
                        let mark = if tracker.is_copied(key, now) { "✓ " } else { "" };
                        format!("{}{}: {}", mark, key, text)
                    })
                    .collect();
                let index = Select::with_theme(theme)
                    .with_prompt("Field")
                    .items(&labels)
                    .interact()?;
                let (key, text) = &fields[index];
                println!("{}", tracker.copy(key, text));
            }
            1 => match presenter::write_export(result, export_dir) {
                Ok(path) => println!("📄 Report saved to {}", path.display()),
                Err(e) => {
                    error!("Export failed: {:#}", e);
                    println!("⚠️  Could not save the report: {:#}", e);
                }
            },
            2 => print_share_links(),
            3 => println!("{}", serde_json::to_string_pretty(result)?),
            _ => {
                dispatcher.reset();
                return Ok(());
            }
        }
    }
}

/// Login, then the menu loop until the user quits.
pub async fn run_interactive<A>(analyzer: &A, export_dir: &Path) -> Result<()>
where
    A: Analyzer + ?Sized,
{
    let theme = ColorfulTheme::default();
    let mut dispatcher = Dispatcher::new();
    dispatcher.login(login_interactive(&theme).await?);

    loop {
        let Some(session) = dispatcher.session() else {
            dispatcher.login(login_interactive(&theme).await?);
            continue;
        };
        let avatar = session
            .avatar
            .as_ref()
            .map(|a| format!(" [avatar: {}]", a.mime_type))
            .unwrap_or_default();
        println!(
            "\n🤖 OptiFlow.AI | {} <{}>{} ({} plan, {} credits)",
            session.name, session.email, avatar, session.plan, session.credits
        );

        let actions = ["Analyze a website", "Upgrade credits", "Log out", "Quit"];
        let choice = Select::with_theme(&theme)
            .default(0)
            .items(&actions)
            .interact()?;
        match choice {
            0 => {
                let request = input::collect_interactive().await?;
                match analyze_with_progress(&mut dispatcher, analyzer, &request).await {
                    DispatchOutcome::CreditExhausted => {
                        println!("⚠️  You are out of credits.");
                        choose_plan(&mut dispatcher, &theme)?;
                        continue;
                    }
                    DispatchOutcome::Started(_) => {}
                    other => {
                        info!("Dispatch not started: {:?}", other);
                        continue;
                    }
                }
                match dispatcher.status().clone() {
                    Status::Success(result) => {
                        println!("{}", presenter::render_terminal(&result));
                        result_menu(&mut dispatcher, &theme, export_dir)?;
                    }
                    Status::Error(message) => {
                        println!("\n❌ Analysis Failed\n{}", message);
                        Input::<String>::with_theme(&theme)
                            .with_prompt("Press enter to try again")
                            .allow_empty(true)
                            .interact_text()?;
                        dispatcher.reset();
                    }
                    Status::Idle | Status::Loading => {}
                }
            }
            1 => choose_plan(&mut dispatcher, &theme)?,
            2 => {
                dispatcher.logout();
                println!("👋 Signed out");
            }
            _ => return Ok(()),
        }
    }
}
