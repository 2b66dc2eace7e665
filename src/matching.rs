use crate::db::models::{Job, User};

/// Decides whether a translator may be offered a job
pub trait EligibilityPolicy: Send + Sync {
    fn is_eligible(&self, translator: &User, job: &Job) -> bool;
}

/// Default policy: the translator must speak the job's language
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageMatch;

impl EligibilityPolicy for LanguageMatch {
    fn is_eligible(&self, translator: &User, job: &Job) -> bool {
        translator
            .languages
            .iter()
            .any(|language| language.eq_ignore_ascii_case(&job.language))
    }
}
