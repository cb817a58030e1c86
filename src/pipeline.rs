use std::collections::HashSet;

use crate::types::{Organization, Report};

/// Placeholder the site renders for fields an organization never filled in.
const NOT_PROVIDED: &str = "Not provided";

#[derive(Debug, thiserror::Error)]
#[error("Duplicate {kind} dropped: {id}")]
pub struct DuplicateItem {
    pub kind: &'static str,
    pub id: String,
}

/// Run-lifetime dedup stage. Owns the seen-id sets; one instance is threaded
/// through a crawl, so duplicate detection never races. Search rows bypass
/// this stage entirely.
#[derive(Debug, Default)]
pub struct DedupPipeline {
    org_seen: HashSet<String>,
    report_seen: HashSet<String>,
}

impl DedupPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits an organization at most once per run, scrubbing placeholder
    /// field values on the way through.
    pub fn process_organization(
        &mut self,
        mut org: Organization,
    ) -> Result<Organization, DuplicateItem> {
        if !self.org_seen.insert(org.org_id.clone()) {
            return Err(DuplicateItem {
                kind: "organization",
                id: org.org_id,
            });
        }
        scrub_not_provided(&mut org);
        Ok(org)
    }

    /// Admits a report at most once per run.
    pub fn process_report(&mut self, report: Report) -> Result<Report, DuplicateItem> {
        if !self.report_seen.insert(report.report_id.clone()) {
            return Err(DuplicateItem {
                kind: "report",
                id: report.report_id,
            });
        }
        Ok(report)
    }
}

/// Rewrites every field equal to the [`NOT_PROVIDED`] sentinel to a real
/// absent value. Idempotent.
fn scrub_not_provided(org: &mut Organization) {
    let fields = [
        &mut org.org_name,
        &mut org.size,
        &mut org.org_type,
        &mut org.listed,
        &mut org.sector,
        &mut org.country,
        &mut org.country_status,
        &mut org.employees,
        &mut org.revenue,
        &mut org.community,
        &mut org.stock,
    ];
    for field in fields {
        if field.as_deref() == Some(NOT_PROVIDED) {
            *field = None;
        }
    }
}
