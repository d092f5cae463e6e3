//! Job listings served from two static JSON files.
//!
//! Both files are read on first use and kept for the life of the process.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::repo::{Page, PageRequest};

pub const JOBS_FILE: &str = "jsearch.json";
pub const COUNTRIES_FILE: &str = "countries.json";

#[derive(thiserror::Error, Debug)]
pub enum JobBoardError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Job {
    pub job_id: String,
    pub job_title: String,
    pub job_description: String,
    pub job_city: Option<String>,
    pub job_state: Option<String>,
    pub job_country: Option<String>,
    pub job_required_skills: Option<Vec<String>>,
    pub job_apply_link: Option<String>,
    pub employer_name: Option<String>,
    pub employer_logo: Option<String>,
    pub employer_website: Option<String>,
    pub job_employment_type: Option<String>,
    pub job_is_remote: bool,
    pub job_min_salary: Option<f64>,
    pub job_max_salary: Option<f64>,
    pub job_salary_currency: Option<String>,
    pub job_salary_period: Option<String>,
    pub job_posted_at_datetime_utc: Option<String>,
}

#[derive(Deserialize)]
struct JobsFile {
    #[serde(default)]
    data: Vec<Option<Job>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobFilter {
    Fulltime,
    Parttime,
    Contractor,
    Intern,
}

impl JobFilter {
    pub fn employment_type(self) -> &'static str {
        match self {
            JobFilter::Fulltime => "FULLTIME",
            JobFilter::Parttime => "PARTTIME",
            JobFilter::Contractor => "CONTRACTOR",
            JobFilter::Intern => "INTERN",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    pub filter: Option<JobFilter>,
    /// Case-insensitive substring of the country.
    pub location: Option<String>,
    pub remote: bool,
    /// Only listings with both salary bounds.
    pub wage: bool,
    /// Only listings that list required skills.
    pub skills: bool,
    pub page: PageRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobList {
    pub data: Vec<Job>,
    pub is_next: bool,
}

// Both shapes appear in country dumps.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CountryName {
    Plain(String),
    Structured { common: String },
}

#[derive(Debug, Clone, Deserialize)]
struct Country {
    name: CountryName,
    cca2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountryOption {
    pub name: String,
    pub value: String,
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(n) => haystack.is_some_and(|h| h.to_lowercase().contains(&n.to_lowercase())),
    }
}

impl JobQuery {
    fn matches(&self, job: &Job) -> bool {
        contains_ci(Some(&job.job_title), self.search.as_deref())
            && contains_ci(job.job_country.as_deref(), self.location.as_deref())
            && (!self.remote || job.job_is_remote)
            && (!self.wage || (job.job_min_salary.is_some() && job.job_max_salary.is_some()))
            && (!self.skills || job.job_required_skills.is_some())
            && self
                .filter
                .map_or(true, |f| job.job_employment_type.as_deref() == Some(f.employment_type()))
    }
}

pub struct JobBoard {
    dir: PathBuf,
    jobs: OnceCell<Vec<Job>>,
    countries: OnceCell<Vec<CountryOption>>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, JobBoardError> {
    let bytes = std::fs::read(path).map_err(|source| JobBoardError::Io { path: path.to_path_buf(), source })?;
    let parsed = serde_json::from_slice(&bytes)
        .map_err(|source| JobBoardError::Parse { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), "loaded content file");
    Ok(parsed)
}

impl JobBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), jobs: OnceCell::new(), countries: OnceCell::new() }
    }

    fn jobs(&self) -> Result<&[Job], JobBoardError> {
        self.jobs
            .get_or_try_init(|| {
                let file: JobsFile = read_json(&self.dir.join(JOBS_FILE))?;
                Ok(file.data.into_iter().flatten().collect())
            })
            .map(Vec::as_slice)
    }

    pub fn search(&self, query: &JobQuery) -> Result<JobList, JobBoardError> {
        let matching: Vec<Job> = self.jobs()?.iter().filter(|j| query.matches(j)).cloned().collect();
        let page = Page::slice(matching, &query.page);
        Ok(JobList { data: page.items, is_next: page.is_next })
    }

    pub fn countries(&self) -> Result<&[CountryOption], JobBoardError> {
        self.countries
            .get_or_try_init(|| {
                let raw: Vec<Country> = read_json(&self.dir.join(COUNTRIES_FILE))?;
                Ok(raw
                    .into_iter()
                    .map(|c| CountryOption {
                        name: match c.name {
                            CountryName::Plain(n) => n,
                            CountryName::Structured { common } => common,
                        },
                        value: c.cca2,
                    })
                    .collect())
            })
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str, country: &str, kind: &str) -> Job {
        Job {
            job_title: title.into(),
            job_country: Some(country.into()),
            job_employment_type: Some(kind.into()),
            ..Default::default()
        }
    }

    #[test]
    fn title_and_location_are_case_insensitive() {
        let q = JobQuery { search: Some("RUST".into()), location: Some("de".into()), ..Default::default() };
        assert!(q.matches(&job("Senior Rust Engineer", "DE", "FULLTIME")));
        assert!(!q.matches(&job("Go Engineer", "DE", "FULLTIME")));
        assert!(!q.matches(&job("Rust Engineer", "US", "FULLTIME")));
    }

    #[test]
    fn flags_require_fields() {
        let mut j = job("Dev", "US", "INTERN");
        let q = JobQuery { remote: true, wage: true, skills: true, ..Default::default() };
        assert!(!q.matches(&j));
        j.job_is_remote = true;
        j.job_min_salary = Some(1.0);
        j.job_max_salary = Some(2.0);
        j.job_required_skills = Some(vec!["sql".into()]);
        assert!(q.matches(&j));
        j.job_max_salary = None;
        assert!(!q.matches(&j));
    }

    #[test]
    fn employment_type_filter() {
        let q = JobQuery { filter: Some(JobFilter::Parttime), ..Default::default() };
        assert!(q.matches(&job("Dev", "US", "PARTTIME")));
        assert!(!q.matches(&job("Dev", "US", "FULLTIME")));
    }

    #[test]
    fn country_names_accept_both_shapes() {
        let raw: Vec<Country> =
            serde_json::from_str(r#"[{"name":"Chile","cca2":"CL"},{"name":{"common":"Peru"},"cca2":"PE"}]"#).unwrap();
        let names: Vec<String> = raw
            .into_iter()
            .map(|c| match c.name {
                CountryName::Plain(n) => n,
                CountryName::Structured { common } => common,
            })
            .collect();
        assert_eq!(names, vec!["Chile", "Peru"]);
    }
}
