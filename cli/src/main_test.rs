use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("jobboard-cli").chain(args.iter().copied())).expect("parses")
}

#[test]
fn parse_wire_accepts_loose_enum_spellings() {
    assert_eq!(parse_wire::<JobType>("full-time"), Ok(JobType::FullTime));
    assert_eq!(parse_wire::<ExperienceLevel>("SENIOR_LEVEL"), Ok(ExperienceLevel::SeniorLevel));
    assert_eq!(parse_wire::<Role>("employer"), Ok(Role::Employer));
    assert_eq!(parse_wire::<SortDirection>("ASC"), Ok(SortDirection::Asc));
    assert!(parse_wire::<JobType>("gig").is_err());
}

#[test]
fn search_args_become_filters() {
    let cli = parse(&[
        "jobs", "search", "--keyword", "engineer", "--job-type", "contract", "--remote", "--skill", "3", "--skill", "1",
        "--page", "2",
    ]);
    let Command::Jobs(JobsCommand { command: JobsSubcommand::Search(args) }) = cli.command else {
        panic!("expected jobs search");
    };
    assert_eq!(args.page, 2);

    let filters = args.filters();
    assert!(filters.contains(&SearchFilter::Keyword(Some("engineer".to_owned()))));
    assert!(filters.contains(&SearchFilter::JobType(Some(JobType::Contract))));
    assert!(filters.contains(&SearchFilter::Remote(Some(true))));
    assert!(filters.contains(&SearchFilter::Skills(vec![3, 1])));
}

#[test]
fn search_without_remote_flag_leaves_it_unconstrained() {
    let filters = SearchArgs::default().filters();
    assert!(filters.contains(&SearchFilter::Remote(None)));
    assert!(!filters.iter().any(|f| matches!(f, SearchFilter::Skills(_))));
}

#[test]
fn page_args_fall_back_to_configured_size() {
    let request = PageArgs { page: 1, size: None }.to_request(12);
    assert_eq!((request.page, request.size), (1, 12));
    assert_eq!(PageArgs { page: 0, size: Some(0) }.to_request(12).size, 12);
    assert_eq!(PageArgs { page: 0, size: Some(5) }.to_request(12).size, 5);
}

#[test]
fn register_defaults_to_job_seeker() {
    let cli = parse(&[
        "register", "--first-name", "Ada", "--last-name", "Lovelace", "--email", "ada@example.com", "--password", "pw",
    ]);
    let Command::Register(args) = cli.command else {
        panic!("expected register");
    };
    assert_eq!(args.role, Role::JobSeeker);
}

#[test]
fn global_flags_parse() {
    let cli = parse(&["--base-url", "http://api.test/api", "--state-file", "/tmp/s.json", "logout"]);
    assert_eq!(cli.base_url.as_deref(), Some("http://api.test/api"));
    assert_eq!(cli.state_file, Some(PathBuf::from("/tmp/s.json")));
    assert!(matches!(cli.command, Command::Logout));
}

#[test]
fn state_file_lives_under_home_dot_dir() {
    let path = state_file_under(std::path::Path::new("/home/ada"));
    assert_eq!(path, PathBuf::from("/home/ada/.jobboard/session.json"));
}

#[test]
fn default_state_file_follows_platform_home() {
    assert_eq!(default_state_file(), dirs::home_dir().map(|home| state_file_under(&home)));
}
