//! Cascading subsector and company selection.

use insight_core::{Company, InsightError, Result, Subsector, Symbol};
use tracing::debug;

use crate::dashboard::Dashboard;

/// State of the two cascading selections.
///
/// Choosing a subsector re-queries its companies and clears any company
/// already chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionFlow {
    subsectors: Vec<Subsector>,
    subsector: Option<Subsector>,
    companies: Vec<Company>,
    company: Option<Company>,
}

impl SelectionFlow {
    /// Fetches the subsector list, sorted alphabetically.
    ///
    /// # Errors
    /// Propagates the catalog fetch error.
    pub async fn load(dashboard: &Dashboard) -> Result<Self> {
        let subsectors = dashboard.subsectors().await?;
        debug!(count = subsectors.len(), "Loaded subsectors");
        Ok(Self {
            subsectors,
            ..Self::default()
        })
    }

    /// Subsector names, in display order.
    #[must_use]
    pub fn subsector_options(&self) -> Vec<&str> {
        self.subsectors.iter().map(Subsector::name).collect()
    }

    /// Selects a subsector by name and fetches its companies.
    ///
    /// # Errors
    /// Returns [`InsightError::Selection`] if `name` is not in the list, or
    /// the catalog fetch error.
    pub async fn select_subsector(&mut self, dashboard: &Dashboard, name: &str) -> Result<&[Company]> {
        let subsector = self
            .subsectors
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| InsightError::Selection(format!("unknown subsector {name:?}")))?;

        self.company = None;
        self.companies = dashboard.companies(&subsector).await?;
        debug!(subsector = %subsector, count = self.companies.len(), "Loaded companies");
        self.subsector = Some(subsector);
        Ok(&self.companies)
    }

    /// The selected subsector.
    #[must_use]
    pub const fn subsector(&self) -> Option<&Subsector> {
        self.subsector.as_ref()
    }

    /// `"symbol - company name"` labels for the selected subsector.
    #[must_use]
    pub fn company_options(&self) -> Vec<String> {
        self.companies.iter().map(Company::label).collect()
    }

    /// Selects a company by label (or bare symbol) and resolves its symbol.
    ///
    /// # Errors
    /// Returns [`InsightError::Selection`] if no subsector is selected or the
    /// company is not listed under it.
    pub fn select_company(&mut self, label: &str) -> Result<&Symbol> {
        let Some(subsector) = &self.subsector else {
            return Err(InsightError::Selection(
                "select a subsector before a company".to_string(),
            ));
        };

        let symbol = Symbol::from_label(label);
        let company = self
            .companies
            .iter()
            .find(|c| c.symbol == symbol)
            .cloned()
            .ok_or_else(|| {
                InsightError::Selection(format!("{symbol} is not listed under {subsector}"))
            })?;

        Ok(&self.company.insert(company).symbol)
    }

    /// The selected company.
    #[must_use]
    pub const fn company(&self) -> Option<&Company> {
        self.company.as_ref()
    }

    /// Symbol of the selected company.
    #[must_use]
    pub fn symbol(&self) -> Option<&Symbol> {
        self.company.as_ref().map(|c| &c.symbol)
    }
}
