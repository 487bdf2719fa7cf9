use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::default::Default;
use std::fmt::{Display, Formatter};

use chrono::Duration;
use clap::Parser;

mod shape;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to retrieve cwd: {0}")]
    Cwd(#[source] std::io::Error),

    #[error("failed to open config file \"{}\": {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse yaml config file \"{}\": {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse json config file \"{}\": {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown type of config file: \"{}\"", .0.display())]
    UnknownType(PathBuf),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// a config file to load. later files override earlier ones
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// password used when the root account has to be created
    #[arg(long, env = "ACCT_ROOT_PASSWORD", hide_env_values = true)]
    pub root_password: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
    pub root_password: Option<String>,
}

pub fn get_config() -> Result<Config, ConfigError> {
    Config::from_args(CliArgs::parse())
}

impl Config {
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(ConfigError::Cwd)?;
        let mut settings = Settings::default();

        for config_path in args.config {
            let full = if config_path.is_absolute() {
                config_path
            } else {
                normalize(cwd.join(config_path))
            };

            tracing::debug!("loading config file \"{}\"", full.display());

            let loaded = Self::load_file(&full)?;
            let src = SrcFile::new(&full);
            let dot = DotPath::new(&"settings");

            settings.merge(&src, dot, loaded)?;
        }

        tracing::debug!("{settings:#?}");

        Ok(Config {
            settings,
            root_password: args.root_password.filter(|v| !v.is_empty()),
        })
    }

    fn load_file(path: &Path) -> Result<shape::Settings, ConfigError> {
        let Some(ext) = path.extension() else {
            return Err(ConfigError::UnknownType(path.to_owned()));
        };

        let ext = ext.to_ascii_lowercase();

        if !(ext.eq("yaml") || ext.eq("yml") || ext.eq("json")) {
            return Err(ConfigError::UnknownType(path.to_owned()));
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| ConfigError::Open { path: path.to_owned(), source })?;
        let reader = std::io::BufReader::new(file);

        if ext.eq("json") {
            serde_json::from_reader(reader)
                .map_err(|source| ConfigError::Json { path: path.to_owned(), source })
        } else {
            serde_yaml::from_reader(reader)
                .map_err(|source| ConfigError::Yaml { path: path.to_owned(), source })
        }
    }
}

struct SrcFile<'a> {
    parent: &'a Path,
    src: &'a Path,
}

impl<'a> SrcFile<'a> {
    fn new(src: &'a Path) -> Self {
        SrcFile {
            parent: src.parent().unwrap_or(Path::new("/")),
            src,
        }
    }
}

impl<'a> Display for SrcFile<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.src.display())
    }
}

struct DotPath<'a>(Vec<&'a dyn Display>);

impl<'a> DotPath<'a> {
    fn new(name: &'a (dyn Display)) -> Self {
        DotPath(vec![name])
    }

    fn push(&self, name: &'a (dyn Display)) -> Self {
        let mut path = self.0.clone();
        path.push(name);

        DotPath(path)
    }
}

impl<'a> Display for DotPath<'a> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;

        for name in &self.0 {
            if first {
                write!(fmt, "{name}")?;
                first = false;
            } else {
                write!(fmt, ".{name}")?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Settings {
    pub sec: Sec,
    pub accounts: Accounts,
    pub templates: Templates,
    pub jobs: Jobs,
}

impl Settings {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, settings: shape::Settings) -> Result<(), ConfigError> {
        if let Some(sec) = settings.sec {
            self.sec.merge(src, dot.push(&"sec"), sec)?;
        }

        if let Some(accounts) = settings.accounts {
            self.accounts.merge(src, dot.push(&"accounts"), accounts)?;
        }

        if let Some(templates) = settings.templates {
            self.templates.merge(src, dot.push(&"templates"), templates)?;
        }

        if let Some(jobs) = settings.jobs {
            self.jobs.merge(src, dot.push(&"jobs"), jobs)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Sec {
    pub session_ttl: Duration,
    pub mfa_challenge_ttl: Duration,
    pub verification_ttl: Duration,
    pub reset_ttl: Duration,
    pub totp_issuer: String,
    pub email_verification: bool,
    pub super_admin_guard: bool,
}

impl Sec {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, sec: shape::Sec) -> Result<(), ConfigError> {
        if let Some(secs) = sec.session_ttl {
            self.session_ttl = check_secs(secs, src, dot.push(&"session_ttl"))?;
        }

        if let Some(secs) = sec.mfa_challenge_ttl {
            self.mfa_challenge_ttl = check_secs(secs, src, dot.push(&"mfa_challenge_ttl"))?;
        }

        if let Some(secs) = sec.verification_ttl {
            self.verification_ttl = check_secs(secs, src, dot.push(&"verification_ttl"))?;
        }

        if let Some(secs) = sec.reset_ttl {
            self.reset_ttl = check_secs(secs, src, dot.push(&"reset_ttl"))?;
        }

        if let Some(issuer) = sec.totp_issuer {
            let trimmed = issuer.trim();

            if trimmed.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{} is empty. file: {src}", dot.push(&"totp_issuer")
                )));
            }

            self.totp_issuer = trimmed.to_owned();
        }

        if let Some(email_verification) = sec.email_verification {
            self.email_verification = email_verification;
        }

        if let Some(guard) = sec.super_admin_guard {
            self.super_admin_guard = guard;
        }

        Ok(())
    }
}

impl Default for Sec {
    fn default() -> Self {
        Sec {
            session_ttl: Duration::hours(24),
            mfa_challenge_ttl: Duration::minutes(10),
            verification_ttl: Duration::hours(24),
            reset_ttl: Duration::minutes(30),
            totp_issuer: "XControl Account".into(),
            email_verification: true,
            super_admin_guard: false,
        }
    }
}

/// the reserved accounts the service treats specially
#[derive(Debug, Clone)]
pub struct Accounts {
    pub root_email: String,
    pub demo_email: String,
    pub sandbox_email: String,
    pub rotation_window: Duration,
}

impl Accounts {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, accounts: shape::Accounts) -> Result<(), ConfigError> {
        if let Some(email) = accounts.root_email {
            self.root_email = check_email(email, src, dot.push(&"root_email"))?;
        }

        if let Some(email) = accounts.demo_email {
            self.demo_email = check_email(email, src, dot.push(&"demo_email"))?;
        }

        if let Some(email) = accounts.sandbox_email {
            self.sandbox_email = check_email(email, src, dot.push(&"sandbox_email"))?;
        }

        if let Some(secs) = accounts.rotation_window {
            self.rotation_window = check_secs(secs, src, dot.push(&"rotation_window"))?;
        }

        Ok(())
    }

    pub fn is_root_email(&self, email: &str) -> bool {
        self.root_email.eq_ignore_ascii_case(email.trim())
    }

    pub fn is_demo_email(&self, email: &str) -> bool {
        self.demo_email.eq_ignore_ascii_case(email.trim())
    }

    pub fn is_sandbox_email(&self, email: &str) -> bool {
        self.sandbox_email.eq_ignore_ascii_case(email.trim())
    }
}

impl Default for Accounts {
    fn default() -> Self {
        Accounts {
            root_email: "admin@svc.plus".into(),
            demo_email: "demo@svc.plus".into(),
            sandbox_email: "sandbox@svc.plus".into(),
            rotation_window: Duration::hours(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct Templates {
    pub directory: Option<PathBuf>,
}

impl Templates {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, templates: shape::Templates) -> Result<(), ConfigError> {
        if let Some(directory) = templates.directory {
            self.directory = Some(check_dir(directory, src, dot.push(&"directory"))?);
        }

        Ok(())
    }
}

// sec  min   hour    day of month   month   day of week   year
// 0    30    9,12,15     1,15       May-Aug  Mon,Wed,Fri  2018/2

#[derive(Debug)]
pub struct Jobs {
    pub token_sweep: String,
    pub demo_rotation: String,
}

impl Jobs {
    fn merge(&mut self, src: &SrcFile<'_>, dot: DotPath<'_>, jobs: shape::Jobs) -> Result<(), ConfigError> {
        if let Some(crontab) = jobs.token_sweep {
            self.token_sweep = check_cron(crontab, src, dot.push(&"token_sweep"))?;
        }

        if let Some(crontab) = jobs.demo_rotation {
            self.demo_rotation = check_cron(crontab, src, dot.push(&"demo_rotation"))?;
        }

        Ok(())
    }
}

impl Default for Jobs {
    fn default() -> Self {
        Jobs {
            token_sweep: "0 */5 * * * * *".into(),
            demo_rotation: "0 0 * * * * *".into(),
        }
    }
}

fn check_secs(given: u64, src: &SrcFile<'_>, dot: DotPath<'_>) -> Result<Duration, ConfigError> {
    let Ok(secs) = i64::try_from(given) else {
        return Err(ConfigError::Invalid(format!("{dot} is too large. file: {src}")));
    };

    if secs == 0 {
        return Err(ConfigError::Invalid(format!("{dot} must be greater than 0. file: {src}")));
    }

    Duration::try_seconds(secs)
        .ok_or(ConfigError::Invalid(format!("{dot} is too large. file: {src}")))
}

fn check_email(given: String, src: &SrcFile<'_>, dot: DotPath<'_>) -> Result<String, ConfigError> {
    let email = acct_lib::user::normalize_email(&given);

    if !acct_lib::user::email_valid(&email) {
        return Err(ConfigError::Invalid(format!(
            "{dot} \"{given}\" is not a valid email. file: {src}"
        )));
    }

    Ok(email)
}

fn check_cron(given: String, src: &SrcFile<'_>, dot: DotPath<'_>) -> Result<String, ConfigError> {
    if let Err(err) = cron::Schedule::from_str(&given) {
        return Err(ConfigError::Invalid(format!(
            "{dot} \"{given}\" is not a valid schedule: {err}. file: {src}"
        )));
    }

    Ok(given)
}

fn check_dir(given: PathBuf, src: &SrcFile<'_>, dot: DotPath<'_>) -> Result<PathBuf, ConfigError> {
    let full = if given.is_absolute() {
        given
    } else {
        normalize(src.parent.join(given))
    };

    tracing::debug!("{dot} {src} checking {}", full.display());

    match full.metadata() {
        Ok(meta) => if meta.is_dir() {
            Ok(full)
        } else {
            Err(ConfigError::Invalid(format!("{dot} is not a directory in: {src}")))
        },
        Err(err) => Err(ConfigError::Invalid(format!(
            "{dot} failed to retrieve metadata: {err}. file: {src}"
        )))
    }
}

fn normalize<P>(path: P) -> PathBuf
where
    P: AsRef<Path>
{
    let mut rtn = PathBuf::new();

    for comp in path.as_ref().components() {
        match comp {
            Component::Prefix(prefix) => {
                rtn.push(prefix.as_os_str());
            }
            Component::ParentDir => {
                rtn.pop();
            }
            Component::Normal(c) => {
                rtn.push(c);
            }
            Component::RootDir => {
                rtn.push(comp.as_os_str());
            }
            Component::CurDir => {}
        }
    }

    rtn
}
