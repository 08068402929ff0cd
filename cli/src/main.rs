#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use jobboard::config::ClientConfig;
use jobboard::net::http::{ApiClient, ApiError};
use jobboard::net::types::{
    ApplicationRequest, ExperienceLevel, JobType, LoginRequest, PageRequest, RegisterRequest, Role, SortDirection,
};
use jobboard::services::jobs::DEFAULT_RECENT_LIMIT;
use jobboard::state::search::{SearchComposer, SearchError, SearchFilter};
use jobboard::state::session::{AuthView, SessionError, SessionStore};
use jobboard::util::auth::{Section, has_any_role, should_redirect_to_login};
use jobboard::util::storage::FileStorage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; run `jobboard-cli login` first")]
    NotSignedIn,
    #[error("session expired; run `jobboard-cli login` again")]
    SessionExpired,
    #[error("{0:?} is not available for this account")]
    Forbidden(Section),
    #[error("cannot locate a home directory; pass --state-file")]
    NoStateFile,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "jobboard-cli", about = "Job board API CLI")]
struct Cli {
    #[arg(long, env = "JOBBOARD_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "JOBBOARD_STATE_FILE", help = "Session file (default: ~/.jobboard/session.json)")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOBBOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Register(RegisterArgs),
    Whoami {
        #[arg(long, help = "Re-fetch the profile from the backend")]
        refresh: bool,
    },
    Jobs(JobsCommand),
    Companies(CompaniesCommand),
    Applications(ApplicationsCommand),
    Saved(SavedCommand),
    Notifications(NotificationsCommand),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "JOBBOARD_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, value_parser = parse_wire::<Role>, default_value = "JOB_SEEKER")]
    role: Role,
}

#[derive(Args, Debug, Default)]
struct PageArgs {
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long)]
    size: Option<u32>,
}

impl PageArgs {
    fn to_request(&self, default_size: u32) -> PageRequest {
        PageRequest {
            page: self.page,
            size: self.size.filter(|s| *s > 0).unwrap_or(default_size),
            ..PageRequest::default()
        }
    }
}

#[derive(Args, Debug)]
struct JobsCommand {
    #[command(subcommand)]
    command: JobsSubcommand,
}

#[derive(Subcommand, Debug)]
enum JobsSubcommand {
    Search(SearchArgs),
    Show {
        job_id: i64,
    },
    Recent {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },
    Featured,
}

#[derive(Args, Debug, Default)]
struct SearchArgs {
    #[arg(long)]
    keyword: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long, value_parser = parse_wire::<JobType>)]
    job_type: Option<JobType>,
    #[arg(long, value_parser = parse_wire::<ExperienceLevel>)]
    experience_level: Option<ExperienceLevel>,
    #[arg(long, help = "Only remote positions")]
    remote: bool,
    #[arg(long)]
    min_salary: Option<u64>,
    #[arg(long)]
    max_salary: Option<u64>,
    #[arg(long)]
    company: Option<i64>,
    #[arg(long)]
    category: Option<i64>,
    #[arg(long = "skill")]
    skills: Vec<i64>,
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long)]
    size: Option<u32>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, value_parser = parse_wire::<SortDirection>)]
    sort_dir: Option<SortDirection>,
}

impl SearchArgs {
    fn filters(&self) -> Vec<SearchFilter> {
        let mut filters = vec![
            SearchFilter::Keyword(self.keyword.clone()),
            SearchFilter::Location(self.location.clone()),
            SearchFilter::JobType(self.job_type),
            SearchFilter::ExperienceLevel(self.experience_level),
            SearchFilter::Remote(self.remote.then_some(true)),
            SearchFilter::MinSalary(self.min_salary),
            SearchFilter::MaxSalary(self.max_salary),
            SearchFilter::Company(self.company),
            SearchFilter::Category(self.category),
        ];
        if !self.skills.is_empty() {
            filters.push(SearchFilter::Skills(self.skills.clone()));
        }
        filters
    }
}

#[derive(Args, Debug)]
struct CompaniesCommand {
    #[command(subcommand)]
    command: CompaniesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CompaniesSubcommand {
    List(PageArgs),
    Search { keyword: String },
    Show { company_id: i64 },
}

#[derive(Args, Debug)]
struct ApplicationsCommand {
    #[command(subcommand)]
    command: ApplicationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApplicationsSubcommand {
    List(PageArgs),
    Apply {
        job_id: i64,
        #[arg(long)]
        cover_letter: Option<String>,
        #[arg(long)]
        resume_url: Option<String>,
    },
    Withdraw {
        application_id: i64,
    },
}

#[derive(Args, Debug)]
struct SavedCommand {
    #[command(subcommand)]
    command: SavedSubcommand,
}

#[derive(Subcommand, Debug)]
enum SavedSubcommand {
    List(PageArgs),
    Add { job_id: i64 },
    Remove { job_id: i64 },
}

#[derive(Args, Debug)]
struct NotificationsCommand {
    #[command(subcommand)]
    command: NotificationsSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotificationsSubcommand {
    List(PageArgs),
    Unread,
    Read { notification_id: i64 },
    ReadAll,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url);
    }
    let state_file = cli.state_file.or_else(default_state_file).ok_or(CliError::NoStateFile)?;
    tracing::debug!(base_url = %config.base_url, state_file = %state_file.display(), "starting");

    let api = ApiClient::new(&config)?;
    let mut session = SessionStore::new(Arc::new(api.clone()), Arc::new(FileStorage::new(state_file)));
    session.initialize().await;

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&LoginRequest { email, password }).await?;
            print_json(&user)
        }
        Command::Logout => {
            session.logout().await;
            println!("signed out");
            Ok(())
        }
        Command::Register(args) => run_register(&session, args).await,
        Command::Whoami { refresh } => run_whoami(&api, &mut session, refresh).await,
        Command::Jobs(jobs) => run_jobs(&api, config.page_size, jobs).await,
        Command::Companies(companies) => run_companies(&api, config.page_size, companies).await,
        Command::Applications(applications) => run_applications(&api, &mut session, config.page_size, applications).await,
        Command::Saved(saved) => run_saved(&api, &mut session, config.page_size, saved).await,
        Command::Notifications(notifications) => {
            run_notifications(&api, &mut session, config.page_size, notifications).await
        }
    }
}

async fn run_register(session: &SessionStore, args: RegisterArgs) -> Result<(), CliError> {
    let request = RegisterRequest {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        password: args.password,
        phone: args.phone,
        role: args.role,
    };
    let user = session.register(&request).await?;
    print_json(&user)
}

async fn run_whoami(api: &ApiClient, session: &mut SessionStore, refresh: bool) -> Result<(), CliError> {
    require_signed_in(session)?;
    if refresh {
        let user = checked(session, api.current_user().await)?;
        session.update_user(user)?;
    }
    let state = session.snapshot();
    match state.view() {
        AuthView::SignedIn(user) => print_json(user),
        AuthView::Unknown | AuthView::SignedOut => Err(CliError::NotSignedIn),
    }
}

async fn run_jobs(api: &ApiClient, page_size: u32, jobs: JobsCommand) -> Result<(), CliError> {
    match jobs.command {
        JobsSubcommand::Search(args) => run_job_search(api, page_size, &args).await,
        JobsSubcommand::Show { job_id } => print_json(&api.get_job(job_id).await?),
        JobsSubcommand::Recent { limit } => print_json(&api.recent_jobs(limit).await?),
        JobsSubcommand::Featured => print_json(&api.featured_jobs().await?),
    }
}

async fn run_job_search(api: &ApiClient, page_size: u32, args: &SearchArgs) -> Result<(), CliError> {
    let search = SearchComposer::with_page_size(Arc::new(api.clone()), args.size.unwrap_or(page_size));
    for filter in args.filters() {
        search.set_filter(filter);
    }
    if args.sort_by.is_some() || args.sort_dir.is_some() {
        let cursor = search.cursor();
        search.set_sort(
            args.sort_by.as_deref().unwrap_or(&cursor.sort_by),
            args.sort_dir.unwrap_or(cursor.sort_dir),
        );
    }
    search.set_page(args.page);

    search.fetch().await?;
    print_json(&search.snapshot().visible_page())
}

async fn run_companies(api: &ApiClient, page_size: u32, companies: CompaniesCommand) -> Result<(), CliError> {
    match companies.command {
        CompaniesSubcommand::List(page) => print_json(&api.list_companies(&page.to_request(page_size)).await?),
        CompaniesSubcommand::Search { keyword } => print_json(&api.search_companies(&keyword).await?),
        CompaniesSubcommand::Show { company_id } => print_json(&api.get_company(company_id).await?),
    }
}

async fn run_applications(
    api: &ApiClient,
    session: &mut SessionStore,
    page_size: u32,
    applications: ApplicationsCommand,
) -> Result<(), CliError> {
    require_section(session, Section::Applications)?;
    match applications.command {
        ApplicationsSubcommand::List(page) => {
            let page = checked(session, api.my_applications(&page.to_request(page_size)).await)?;
            print_json(&page)
        }
        ApplicationsSubcommand::Apply { job_id, cover_letter, resume_url } => {
            let request = ApplicationRequest { job_id, cover_letter, resume_url };
            let application = checked(session, api.apply_for_job(&request).await)?;
            print_json(&application)
        }
        ApplicationsSubcommand::Withdraw { application_id } => {
            checked(session, api.withdraw_application(application_id).await)?;
            println!("withdrawn");
            Ok(())
        }
    }
}

async fn run_saved(api: &ApiClient, session: &mut SessionStore, page_size: u32, saved: SavedCommand) -> Result<(), CliError> {
    require_section(session, Section::SavedJobs)?;
    match saved.command {
        SavedSubcommand::List(page) => {
            let page = checked(session, api.saved_jobs(&page.to_request(page_size)).await)?;
            print_json(&page)
        }
        SavedSubcommand::Add { job_id } => {
            checked(session, api.save_job(job_id).await)?;
            println!("saved");
            Ok(())
        }
        SavedSubcommand::Remove { job_id } => {
            checked(session, api.unsave_job(job_id).await)?;
            println!("removed");
            Ok(())
        }
    }
}

async fn run_notifications(
    api: &ApiClient,
    session: &mut SessionStore,
    page_size: u32,
    notifications: NotificationsCommand,
) -> Result<(), CliError> {
    require_signed_in(session)?;
    match notifications.command {
        NotificationsSubcommand::List(page) => {
            let page = checked(session, api.notifications(&page.to_request(page_size)).await)?;
            print_json(&page)
        }
        NotificationsSubcommand::Unread => {
            let unread = checked(session, api.unread_notifications().await)?;
            print_json(&unread)
        }
        NotificationsSubcommand::Read { notification_id } => {
            let notification = checked(session, api.mark_notification_read(notification_id).await)?;
            print_json(&notification)
        }
        NotificationsSubcommand::ReadAll => {
            checked(session, api.mark_all_notifications_read().await)?;
            println!("all read");
            Ok(())
        }
    }
}

fn require_signed_in(session: &SessionStore) -> Result<(), CliError> {
    if should_redirect_to_login(&session.snapshot()) {
        return Err(CliError::NotSignedIn);
    }
    Ok(())
}

fn require_section(session: &SessionStore, section: Section) -> Result<(), CliError> {
    require_signed_in(session)?;
    if !has_any_role(&session.snapshot(), section.roles()) {
        return Err(CliError::Forbidden(section));
    }
    Ok(())
}

/// Downgrade the stored session when the backend rejects its token.
fn checked<T>(session: &mut SessionStore, result: Result<T, ApiError>) -> Result<T, CliError> {
    result.map_err(|e| if session.handle_api_error(&e) { CliError::SessionExpired } else { CliError::Api(e) })
}

fn default_state_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| state_file_under(&home))
}

fn state_file_under(home: &std::path::Path) -> PathBuf {
    home.join(".jobboard").join("session.json")
}

/// Accept wire names in any case, with `-` or `_` separators.
fn parse_wire<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let normalized = raw.trim().replace('-', "_");
    [normalized.to_ascii_uppercase(), normalized.to_ascii_lowercase()]
        .into_iter()
        .find_map(|candidate| serde_json::from_value(Value::String(candidate)).ok())
        .ok_or_else(|| format!("unrecognized value `{raw}`"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
