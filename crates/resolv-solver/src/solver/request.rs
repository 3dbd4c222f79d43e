use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use resolv_spec::{MatchSpec, ParseError};

/// The kind of a [`Job`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Install,
    Remove,
    Update,
    UpdateAll,
    Keep,
    Freeze,
    Pin,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Install => "install",
            JobKind::Remove => "remove",
            JobKind::Update => "update",
            JobKind::UpdateAll => "update-all",
            JobKind::Keep => "keep",
            JobKind::Freeze => "freeze",
            JobKind::Pin => "pin",
        }
    }
}

impl FromStr for JobKind {
    type Err = ParseError;

    /// Parse a kind name such as `install` or `update-all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "install" => Ok(JobKind::Install),
            "remove" | "uninstall" => Ok(JobKind::Remove),
            "update" => Ok(JobKind::Update),
            "update-all" | "update_all" => Ok(JobKind::UpdateAll),
            "keep" => Ok(JobKind::Keep),
            "freeze" => Ok(JobKind::Freeze),
            "pin" => Ok(JobKind::Pin),
            _ => Err(ParseError::new(0, format!("unknown job kind '{}'", s))),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-requested action.
///
/// Every variant except [`Job::UpdateAll`] carries the spec it applies to.
/// `clean_dependencies` only exists on [`Job::Remove`] and [`Job::UpdateAll`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Select exactly one record matching the spec.
    Install { spec: MatchSpec },
    /// Make the named package absent, optionally dropping its orphans.
    Remove {
        spec: MatchSpec,
        #[serde(default)]
        clean_dependencies: bool,
    },
    /// Select the most preferred record matching the spec.
    Update { spec: MatchSpec },
    /// Prefer the newest version of every installed package.
    UpdateAll {
        #[serde(default)]
        clean_dependencies: bool,
    },
    /// Leave the installed record in place unless a dependency forces a change.
    Keep { spec: MatchSpec },
    /// Leave the installed record in place, failing rather than changing it.
    Freeze { spec: MatchSpec },
    /// Restrict the candidates of the name to records matching the spec.
    Pin { spec: MatchSpec },
}

impl Job {
    pub fn install(spec: MatchSpec) -> Self {
        Job::Install { spec }
    }

    pub fn remove(spec: MatchSpec, clean_dependencies: bool) -> Self {
        Job::Remove {
            spec,
            clean_dependencies,
        }
    }

    pub fn update(spec: MatchSpec) -> Self {
        Job::Update { spec }
    }

    pub fn update_all(clean_dependencies: bool) -> Self {
        Job::UpdateAll { clean_dependencies }
    }

    pub fn keep(spec: MatchSpec) -> Self {
        Job::Keep { spec }
    }

    pub fn freeze(spec: MatchSpec) -> Self {
        Job::Freeze { spec }
    }

    pub fn pin(spec: MatchSpec) -> Self {
        Job::Pin { spec }
    }

    /// Build a job of `kind` from spec text. Spec errors surface here, never
    /// later during the solve.
    pub fn parse(kind: JobKind, text: &str) -> Result<Self, ParseError> {
        if kind == JobKind::UpdateAll {
            if !text.trim().is_empty() {
                return Err(ParseError::new(0, "update-all does not take a spec"));
            }
            return Ok(Job::update_all(false));
        }

        let spec = MatchSpec::parse(text)?;
        Ok(match kind {
            JobKind::Install => Job::install(spec),
            JobKind::Remove => Job::remove(spec, false),
            JobKind::Update => Job::update(spec),
            JobKind::Keep => Job::keep(spec),
            JobKind::Freeze => Job::freeze(spec),
            JobKind::Pin => Job::pin(spec),
            JobKind::UpdateAll => Job::update_all(false),
        })
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::Install { .. } => JobKind::Install,
            Job::Remove { .. } => JobKind::Remove,
            Job::Update { .. } => JobKind::Update,
            Job::UpdateAll { .. } => JobKind::UpdateAll,
            Job::Keep { .. } => JobKind::Keep,
            Job::Freeze { .. } => JobKind::Freeze,
            Job::Pin { .. } => JobKind::Pin,
        }
    }

    pub fn spec(&self) -> Option<&MatchSpec> {
        match self {
            Job::Install { spec }
            | Job::Remove { spec, .. }
            | Job::Update { spec }
            | Job::Keep { spec }
            | Job::Freeze { spec }
            | Job::Pin { spec } => Some(spec),
            Job::UpdateAll { .. } => None,
        }
    }

    /// Replace the spec. Returns false (and changes nothing) for `UpdateAll`.
    pub fn set_spec(&mut self, new_spec: MatchSpec) -> bool {
        match self {
            Job::Install { spec }
            | Job::Remove { spec, .. }
            | Job::Update { spec }
            | Job::Keep { spec }
            | Job::Freeze { spec }
            | Job::Pin { spec } => {
                *spec = new_spec;
                true
            }
            Job::UpdateAll { .. } => false,
        }
    }

    /// The package name the job targets, if any.
    pub fn name(&self) -> Option<&str> {
        self.spec().map(|spec| spec.name())
    }

    pub fn clean_dependencies(&self) -> bool {
        match self {
            Job::Remove {
                clean_dependencies, ..
            }
            | Job::UpdateAll { clean_dependencies } => *clean_dependencies,
            _ => false,
        }
    }

    /// Set the toggle. Returns false for variants that do not carry it.
    pub fn set_clean_dependencies(&mut self, value: bool) -> bool {
        match self {
            Job::Remove {
                clean_dependencies, ..
            }
            | Job::UpdateAll { clean_dependencies } => {
                *clean_dependencies = value;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spec() {
            Some(spec) => write!(f, "{} {}", self.kind(), spec)?,
            None => write!(f, "{}", self.kind())?,
        }
        if self.clean_dependencies() {
            write!(f, " (clean dependencies)")?;
        }
        Ok(())
    }
}

/// Resolver-wide switches.
///
/// Defaults: `keep_dependencies` and `allow_uninstall` are `true`, every
/// other flag is `false`. See [`Flags::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Keep purely transitive packages installed during `UpdateAll`.
    pub keep_dependencies: bool,
    /// Packages the user requested in earlier transactions keep their spec.
    pub keep_user_specs: bool,
    /// Emit `Reinstall` for targeted packages whose record does not change.
    pub force_reinstall: bool,
    /// Permit selecting a version older than the installed one.
    pub allow_downgrade: bool,
    /// Permit removing packages no `Remove` job names.
    pub allow_uninstall: bool,
    /// Drop lower priority channels for a name once a higher one offers it.
    pub strict_repo_priority: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            keep_dependencies: true,
            keep_user_specs: false,
            force_reinstall: false,
            allow_downgrade: false,
            allow_uninstall: true,
            strict_repo_priority: false,
        }
    }
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keep_dependencies(mut self, value: bool) -> Self {
        self.keep_dependencies = value;
        self
    }

    pub fn with_keep_user_specs(mut self, value: bool) -> Self {
        self.keep_user_specs = value;
        self
    }

    pub fn with_force_reinstall(mut self, value: bool) -> Self {
        self.force_reinstall = value;
        self
    }

    pub fn with_allow_downgrade(mut self, value: bool) -> Self {
        self.allow_downgrade = value;
        self
    }

    pub fn with_allow_uninstall(mut self, value: bool) -> Self {
        self.allow_uninstall = value;
        self
    }

    pub fn with_strict_repo_priority(mut self, value: bool) -> Self {
        self.strict_repo_priority = value;
        self
    }
}

/// An ordered list of jobs plus the flags they are resolved under.
///
/// Job order is significant: it breaks ties between alternatives and orders
/// the explanation of a failed solve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub flags: Flags,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(flags: Flags) -> Self {
        Self {
            jobs: Vec::new(),
            flags,
        }
    }

    pub fn push(&mut self, job: Job) -> &mut Self {
        self.jobs.push(job);
        self
    }

    /// Parse `text` as a job of `kind` and append it.
    pub fn parse_job(&mut self, kind: JobKind, text: &str) -> Result<&mut Self, ParseError> {
        let job = Job::parse(kind, text)?;
        Ok(self.push(job))
    }

    pub fn install(&mut self, spec: &str) -> Result<&mut Self, ParseError> {
        self.parse_job(JobKind::Install, spec)
    }

    pub fn remove(&mut self, spec: &str, clean_dependencies: bool) -> Result<&mut Self, ParseError> {
        let job = Job::remove(MatchSpec::parse(spec)?, clean_dependencies);
        Ok(self.push(job))
    }

    pub fn update(&mut self, spec: &str) -> Result<&mut Self, ParseError> {
        self.parse_job(JobKind::Update, spec)
    }

    pub fn update_all(&mut self, clean_dependencies: bool) -> &mut Self {
        self.push(Job::update_all(clean_dependencies))
    }

    pub fn keep(&mut self, spec: &str) -> Result<&mut Self, ParseError> {
        self.parse_job(JobKind::Keep, spec)
    }

    pub fn freeze(&mut self, spec: &str) -> Result<&mut Self, ParseError> {
        self.parse_job(JobKind::Freeze, spec)
    }

    pub fn pin(&mut self, spec: &str) -> Result<&mut Self, ParseError> {
        self.parse_job(JobKind::Pin, spec)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs of one kind, with their position in the request.
    pub fn jobs_of(&self, kind: JobKind) -> impl Iterator<Item = (usize, &Job)> {
        self.jobs
            .iter()
            .enumerate()
            .filter(move |(_, job)| job.kind() == kind)
    }

    /// Whether any job of `kind` targets `name`.
    pub fn targets(&self, kind: JobKind, name: &str) -> bool {
        self.jobs_of(kind).any(|(_, job)| job.name() == Some(name))
    }

    /// The `UpdateAll` job, if the request has one.
    pub fn update_all_job(&self) -> Option<&Job> {
        self.jobs.iter().find(|job| job.kind() == JobKind::UpdateAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str) -> MatchSpec {
        MatchSpec::parse(text).unwrap()
    }

    #[test]
    fn test_flags_defaults() {
        let flags = Flags::default();
        assert!(flags.keep_dependencies);
        assert!(flags.allow_uninstall);
        assert!(!flags.keep_user_specs);
        assert!(!flags.force_reinstall);
        assert!(!flags.allow_downgrade);
        assert!(!flags.strict_repo_priority);
    }

    #[test]
    fn test_flags_builders() {
        let flags = Flags::new()
            .with_allow_downgrade(true)
            .with_keep_dependencies(false);
        assert!(flags.allow_downgrade);
        assert!(!flags.keep_dependencies);
        assert_ne!(flags, Flags::default());
    }

    #[test]
    fn test_flags_deserialize_partial() {
        let flags: Flags = serde_json::from_str(r#"{"force_reinstall": true}"#).unwrap();
        assert!(flags.force_reinstall);
        assert!(flags.keep_dependencies);
    }

    #[test]
    fn test_job_spec_accessors() {
        let mut job = Job::install(spec("foo>=1.0"));
        assert_eq!(job.spec().unwrap().to_string(), "foo>=1.0");
        assert_eq!(job.name(), Some("foo"));

        assert!(job.set_spec(spec("bar")));
        assert_eq!(job.spec().unwrap().to_string(), "bar");

        let mut all = Job::update_all(false);
        assert!(all.spec().is_none());
        assert!(!all.set_spec(spec("bar")));
    }

    #[test]
    fn test_job_clean_dependencies() {
        let mut remove = Job::remove(spec("foo"), false);
        assert!(!remove.clean_dependencies());
        assert!(remove.set_clean_dependencies(true));
        assert!(remove.clean_dependencies());

        let mut install = Job::install(spec("foo"));
        assert!(!install.set_clean_dependencies(true));
        assert!(!install.clean_dependencies());
    }

    #[test]
    fn test_job_parse() {
        let job = Job::parse(JobKind::Pin, "foo<2.0").unwrap();
        assert_eq!(job.kind(), JobKind::Pin);
        assert_eq!(job.to_string(), "pin foo<2.0");

        let err = Job::parse(JobKind::Install, "foo>=").unwrap_err();
        assert_eq!(err.position, 5);

        assert!(Job::parse(JobKind::UpdateAll, "foo").is_err());
        assert_eq!(Job::parse(JobKind::UpdateAll, "").unwrap(), Job::update_all(false));
    }

    #[test]
    fn test_job_display() {
        assert_eq!(Job::remove(spec("foo"), true).to_string(), "remove foo (clean dependencies)");
        assert_eq!(Job::update_all(false).to_string(), "update-all");
    }

    #[test]
    fn test_job_kind_from_str() {
        assert_eq!("Install".parse::<JobKind>(), Ok(JobKind::Install));
        assert_eq!("update_all".parse::<JobKind>(), Ok(JobKind::UpdateAll));
        assert_eq!(JobKind::from_str("uninstall"), Ok(JobKind::Remove));

        let err = "upgrade".parse::<JobKind>().unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.reason.contains("upgrade"));

        for kind in [JobKind::Install, JobKind::UpdateAll, JobKind::Pin] {
            assert_eq!(kind.as_str().parse::<JobKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_request_builder() {
        let mut request = Request::new();
        request
            .pin("foo<2.0")
            .unwrap()
            .install("bar")
            .unwrap()
            .update_all(true);

        assert_eq!(request.jobs.len(), 3);
        assert!(request.targets(JobKind::Pin, "foo"));
        assert!(!request.targets(JobKind::Install, "foo"));
        assert!(request.update_all_job().unwrap().clean_dependencies());
    }

    #[test]
    fn test_request_rejects_bad_spec_immediately() {
        let mut request = Request::new();
        assert!(request.install("foo[version=").is_err());
        assert!(request.is_empty());
    }

    #[test]
    fn test_request_json() {
        let json = r#"{
            "jobs": [
                {"kind": "install", "spec": "foo>=1.0"},
                {"kind": "remove", "spec": "bar", "clean_dependencies": true},
                {"kind": "update_all"}
            ],
            "flags": {"allow_downgrade": true}
        }"#;

        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.jobs[0], Job::install(spec("foo>=1.0")));
        assert!(request.jobs[1].clean_dependencies());
        assert!(!request.jobs[2].clean_dependencies());
        assert!(request.flags.allow_downgrade);
        assert!(request.flags.allow_uninstall);
    }
}
