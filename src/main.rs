//! # Clinic Client CLI
//!
//! Command-line front end for the clinic API client. Every command prints
//! pretty JSON on stdout; logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use clinic_client::auth::{AuthClient, FileTokenStore, LoginForm, RegistrationForm, TokenStore};
use clinic_client::config::{AppConfig, ConfigLoader};
use clinic_client::list::{AsyncListState, ListController, ListScreen, ListStatus, PageFetcher};
use clinic_client::models::{
    AppointmentScope, AppointmentStatus, AppointmentUpdate, Appointments, CalendarView,
    NewPatient, Patients,
};
use clinic_client::query::{DateRange, ListQuery, ListResource, SortDirection, SortKey, StatusFilter};
use clinic_client::search::SearchDebouncer;
use clinic_client::services::{AppointmentService, PatientService};
use clinic_client::summary::SummaryTracker;
use clinic_client::telemetry::init_tracing;
use clinic_client::{ClientError, HttpClient};

#[derive(Parser)]
#[command(name = "clinic-client", version, about = "Clinic management API client")]
struct Cli {
    /// Override the configured API base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// End the session (locally even if the server is unreachable).
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List patients.
    Patients {
        #[command(flatten)]
        list: ListArgs,
        /// Only patients with every given tag.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        last_visit_from: Option<NaiveDate>,
        #[arg(long)]
        last_visit_to: Option<NaiveDate>,
    },
    /// Register a new patient.
    AddPatient {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        mrn: String,
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List appointments.
    Appointments {
        #[command(flatten)]
        list: ListArgs,
        /// Calendar view: day, week, month or list.
        #[arg(long)]
        view: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Change an appointment's status and refresh the list and summary.
    SetStatus {
        id: String,
        /// pending, confirmed, completed or cancelled.
        status: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Appointment counts by status.
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Live patient search: each stdin line is treated as the search box
    /// contents; results print whenever a debounced search completes.
    Search {
        /// Debounce window in milliseconds.
        #[arg(long)]
        window_ms: Option<u64>,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Free-text search.
    #[arg(long = "search", short = 'q')]
    text: Option<String>,
    /// Status filter; `all` for every status.
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    sort: Option<String>,
    /// asc or desc.
    #[arg(long)]
    order: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    per_page: Option<u32>,
    /// Keep loading pages until the last one.
    #[arg(long)]
    all: bool,
}

impl ListArgs {
    fn apply<R: ListResource>(&self, config: &AppConfig) -> anyhow::Result<ListQuery<R>> {
        let mut query = ListQuery::<R>::new().with_per_page(config.page_size(self.per_page));
        if let Some(text) = &self.text {
            query.set_text(text.clone());
        }
        if let Some(status) = &self.status {
            query.set_status(R::Status::parse_filter(status).map_err(|e| anyhow!(e))?);
        }
        let field = match &self.sort {
            Some(name) => R::SortField::parse(name)
                .ok_or_else(|| anyhow!("unknown sort field '{name}'"))?,
            None => R::SortField::default(),
        };
        let direction = match &self.order {
            Some(order) => SortDirection::parse(order)
                .ok_or_else(|| anyhow!("order must be 'asc' or 'desc', got '{order}'"))?,
            None => SortDirection::default(),
        };
        query.set_sort(field, direction);
        Ok(query.with_page(self.page))
    }
}

struct Context {
    config: AppConfig,
    http: HttpClient,
    auth: AuthClient,
}

impl Context {
    fn build(config: AppConfig) -> anyhow::Result<Self> {
        let store = FileTokenStore::open(&config.token_store_path)
            .context("failed to open the session file")?;
        let tokens: Arc<dyn TokenStore> = Arc::new(store);
        let http = HttpClient::from_config(&config, tokens)?;
        let auth = AuthClient::new(http.clone(), config.lazy_load_timeout());
        Ok(Self { config, http, auth })
    }

    fn doctor_id(&self) -> Option<String> {
        self.config.doctor_id.clone()
    }

    fn patients(&self) -> PatientService {
        PatientService::new(self.http.clone(), self.doctor_id())
    }

    fn appointments(&self) -> AppointmentService {
        AppointmentService::new(self.http.clone(), self.doctor_id())
    }

    /// Refresh an about-to-expire access token before talking to the API.
    async fn keep_session_fresh(&self) {
        if !self.auth.is_authenticated() {
            return;
        }
        match self.auth.ensure_fresh(self.config.token_refresh_lead()).await {
            Ok(true) => debug!("Session refreshed before request"),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "Could not refresh the session"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new().load()?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
        config.validate()?;
    }
    init_tracing(&config)?;
    debug!(config = %config.redacted_json().unwrap_or_default(), "Loaded configuration");

    let ctx = Context::build(config)?;
    if let Err(err) = run(&ctx, cli.command).await {
        if let Some(client_err) = err.downcast_ref::<ClientError>() {
            bail!("{}", client_err.user_message());
        }
        return Err(err);
    }
    Ok(())
}

async fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = ctx.auth.login(&LoginForm::new(email, password)).await?;
            print_json(&serde_json::json!({ "logged_in": true, "user": user }))
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            let form = RegistrationForm {
                name,
                email,
                password,
                confirm_password,
            };
            let user = ctx.auth.register(&form).await?;
            print_json(&serde_json::json!({
                "registered": true,
                "logged_in": ctx.auth.is_authenticated(),
                "user": user,
            }))
        }
        Command::Logout => {
            ctx.auth.logout().await?;
            print_json(&serde_json::json!({ "logged_in": false }))
        }
        Command::Whoami => {
            ctx.keep_session_fresh().await;
            let user = ctx.auth.current_user().await?;
            print_json(user.as_ref())
        }
        Command::Patients {
            list,
            tags,
            last_visit_from,
            last_visit_to,
        } => {
            ctx.keep_session_fresh().await;
            let query = list
                .apply::<Patients>(&ctx.config)?
                .with_tags(tags)
                .with_date_range(DateRange::new(last_visit_from, last_visit_to))
                .with_page(list.page);
            let controller = ListController::with_query(ctx.patients().list(), query.clone());
            let state = load_list(&controller, query, list.all).await?;
            print_json(&state)
        }
        Command::AddPatient {
            first_name,
            last_name,
            mrn,
            date_of_birth,
            gender,
            email,
            phone,
            tags,
        } => {
            ctx.keep_session_fresh().await;
            let patient = NewPatient {
                first_name,
                last_name,
                mrn,
                date_of_birth,
                gender,
                email,
                phone,
                tags,
            };
            let created = ctx.patients().create(&patient).await?;
            print_json(&created)
        }
        Command::Appointments {
            list,
            view,
            date,
            from,
            to,
        } => {
            ctx.keep_session_fresh().await;
            let view = view
                .map(|v| CalendarView::parse(&v).ok_or_else(|| anyhow!("unknown view '{v}'")))
                .transpose()?;
            let query = list
                .apply::<Appointments>(&ctx.config)?
                .with_scope(AppointmentScope { view, date })
                .with_date_range(DateRange::new(from, to))
                .with_page(list.page);
            let controller = ListController::with_query(ctx.appointments().list(), query.clone());
            let state = load_list(&controller, query, list.all).await?;
            print_json(&state)
        }
        Command::SetStatus { id, status, date } => {
            ctx.keep_session_fresh().await;
            let status = AppointmentStatus::from_wire(&status.trim().to_ascii_lowercase())
                .ok_or_else(|| anyhow!("unknown appointment status '{status}'"))?;
            let service = ctx.appointments();
            let list = ListController::<Appointments, _>::with_query(
                service.list(),
                ListQuery::new().with_scope(AppointmentScope { view: None, date }),
            );
            let tracker = SummaryTracker::new(service.summary(), date);

            let (updated, refresh) = service
                .update_and_refresh(&id, &AppointmentUpdate::status(status), &list, &tracker)
                .await?;
            let summary = match refresh.map(|r| r.summary) {
                Some(Ok(summary)) => Some(summary),
                Some(Err(err)) => {
                    warn!(error = %err, "Summary refresh failed after status change");
                    None
                }
                None => None,
            };
            print_json(&serde_json::json!({
                "appointment": updated,
                "summary": summary,
                "list": list.snapshot(),
            }))
        }
        Command::Summary { date } => {
            ctx.keep_session_fresh().await;
            let summary = ctx.appointments().summary().fetch(date).await?;
            print_json(&serde_json::json!({
                "summary": summary,
                "consistent": summary.matches_total(),
            }))
        }
        Command::Search { window_ms } => {
            ctx.keep_session_fresh().await;
            let window = window_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| ctx.config.search_debounce());
            run_search(ctx, window).await
        }
    }
}

async fn load_list<R, F>(
    controller: &ListController<R, F>,
    query: ListQuery<R>,
    all_pages: bool,
) -> anyhow::Result<AsyncListState<R::Item>>
where
    R: ListResource,
    F: PageFetcher<R>,
{
    // `load` always starts from page 1; walk forward to the requested page.
    let target_page = query.page();
    controller.load(query).await;
    while controller.snapshot().status == ListStatus::Success
        && (all_pages || controller.query().page() < target_page)
        && controller.snapshot().has_more()
    {
        controller.load_more().await;
    }

    let state = controller.snapshot();
    if state.status == ListStatus::Error {
        bail!(state.error.unwrap_or_else(|| "request failed".to_string()));
    }
    Ok(state)
}

async fn run_search(ctx: &Context, window: Duration) -> anyhow::Result<()> {
    let initial = ListQuery::<Patients>::new().with_per_page(ctx.config.page_size(None));
    let screen = ListScreen::mount(ctx.patients().list(), initial);
    let debouncer = SearchDebouncer::spawn(window);
    let _binding = screen.bind_search(&debouncer);

    let mut states = screen.state();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            match state.status {
                ListStatus::Success => {
                    if let Err(err) = print_json(&state) {
                        warn!(error = %err, "Failed to print results");
                    }
                }
                ListStatus::Error => {
                    eprintln!("{}", state.error.unwrap_or_default());
                }
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        debouncer.input(line);
    }

    // Let the last keystroke settle and its search finish before exiting.
    while debouncer.is_pending() {
        tokio::time::sleep(window / 4).await;
    }
    tokio::time::sleep(window / 4).await;
    while screen.controller().snapshot().is_busy() {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    screen.unmount().await;
    printer.abort();
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
