/// Counts accumulated over one crawl run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: u32,
    pub search_results: usize,
    pub organizations: usize,
    pub reports: usize,
    pub duplicates: usize,
}

impl std::fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Search pages fetched: {}", self.pages)?;
        writeln!(f, "  Search rows:          {}", self.search_results)?;
        writeln!(f, "  Organizations:        {}", self.organizations)?;
        writeln!(f, "  Reports:              {}", self.reports)?;
        writeln!(f, "  Duplicates dropped:   {}", self.duplicates)
    }
}
