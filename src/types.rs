use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// One row of a search-results page. Never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub org_name: String,
    pub org_id: String,
    pub size: String,
    pub sector: String,
    pub country: String,
    pub region: String,
    pub reports: Vec<String>,
}

impl Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} — {} / {} ({} report(s))",
            self.org_id,
            self.org_name,
            self.sector,
            self.country,
            self.reports.len()
        )
    }
}

/// An organization detail record, keyed by `org_id`. At most one is emitted
/// per id per run; fields holding the literal "Not provided" are scrubbed to
/// `None` before emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: String,
    pub org_name: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "type")]
    pub org_type: Option<String>,
    pub listed: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub country_status: Option<String>,
    pub employees: Option<String>,
    pub revenue: Option<String>,
    pub community: Option<String>,
    pub stock: Option<String>,
}

impl Display for Organization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} ({})",
            self.org_name.as_deref().unwrap_or("<unnamed>"),
            self.org_id
        )?;
        let fields = [
            ("Size", &self.size),
            ("Type", &self.org_type),
            ("Listed", &self.listed),
            ("Sector", &self.sector),
            ("Country", &self.country),
            ("Country status", &self.country_status),
            ("Employees", &self.employees),
            ("Revenue", &self.revenue),
            ("Community", &self.community),
            ("Stock", &self.stock),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                writeln!(f, "  {}: {}", label, value)?;
            }
        }
        Ok(())
    }
}

/// A label value on a report page: plain text, or an icon-coded boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Flag(bool),
    Text(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Flag(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A report detail record, keyed by `report_id`. At most one is emitted per
/// id per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub report_name: String,
    pub pub_year: Option<Value>,
    pub report_type: Option<Value>,
    pub adherence: Option<Value>,
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} ({})", self.report_name, self.report_id)?;
        if let Some(year) = &self.pub_year {
            writeln!(f, "  Publication year: {}", year)?;
        }
        if let Some(kind) = &self.report_type {
            writeln!(f, "  Report type: {}", kind)?;
        }
        if let Some(adherence) = &self.adherence {
            writeln!(f, "  Adherence level: {}", adherence)?;
        }
        Ok(())
    }
}
