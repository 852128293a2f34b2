//! The insight dashboard: cached catalog lookups, the four insight panels and
//! the driver that runs them in order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use insight_cache::NoopCache;
use insight_core::{
    CatalogProvider, ChartSpec, Company, FinancialTable, FinancialsProvider, FinancialsQuery,
    GenerationParams, InsightError, LanguageModel, Metric, PromptTemplate, ResponseCache, Result,
    Subsector, Symbol,
};
use insight_replicate::ReplicateModel;
use insight_sectors::SectorsProvider;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::{config::InsightConfig, prompts, render::Figure};

/// One of the four insight panels, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelKind {
    /// Executive summary of the quarterly figures.
    FinancialSummary,
    /// Revenue chart.
    RevenueTrend,
    /// Commentary on revenue, net income and operating cash flow.
    TrendAnalysis,
    /// Red flags.
    RiskAnalysis,
}

impl PanelKind {
    /// All panels, in the order they are produced.
    pub const ALL: [Self; 4] = [
        Self::FinancialSummary,
        Self::RevenueTrend,
        Self::TrendAnalysis,
        Self::RiskAnalysis,
    ];

    /// Section heading shown above the panel.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::FinancialSummary => "💡 Financial Summary",
            Self::RevenueTrend => "📊 Revenue Trend Visualization",
            Self::TrendAnalysis => "🔎 Financial Trend Interpretation",
            Self::RiskAnalysis => "⚠️ Potential Financial Risks",
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Content of a panel.
#[derive(Clone, Debug, PartialEq)]
pub enum InsightBody {
    /// Model-written text, shown as is.
    Text(String),
    /// A rendered chart.
    Figure(Figure),
}

/// A finished panel.
#[derive(Clone, Debug, PartialEq)]
pub struct Insight {
    /// Which panel this is.
    pub kind: PanelKind,
    /// What it shows.
    pub body: InsightBody,
}

impl Insight {
    /// Creates a text panel.
    #[must_use]
    pub fn text(kind: PanelKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            body: InsightBody::Text(text.into()),
        }
    }

    /// Section heading.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        self.kind.title()
    }
}

/// The result of one "view insights" action.
#[derive(Clone, Debug, PartialEq)]
pub struct InsightReport {
    table: FinancialTable,
    panels: Vec<Insight>,
}

impl InsightReport {
    /// The symbol the report is about.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        self.table.symbol()
    }

    /// The quarterly data every panel was built from.
    #[must_use]
    pub const fn table(&self) -> &FinancialTable {
        &self.table
    }

    /// The panels, in [`PanelKind::ALL`] order.
    #[must_use]
    pub fn panels(&self) -> &[Insight] {
        &self.panels
    }

    /// The revenue chart.
    #[must_use]
    pub fn figure(&self) -> Option<&Figure> {
        self.panels.iter().find_map(|p| match &p.body {
            InsightBody::Figure(figure) => Some(figure),
            InsightBody::Text(_) => None,
        })
    }
}

/// Financial insight dashboard.
///
/// Wires a catalog provider, a financials provider and a language model
/// together. Catalog and financials lookups go through the configured
/// [`ResponseCache`]; the default [`NoopCache`] re-queries on every call.
///
/// # Example
///
/// ```rust,ignore
/// use insight::{Dashboard, InsightConfig, Symbol};
///
/// let dashboard = Dashboard::from_config(&InsightConfig::from_env()?)?;
/// let report = dashboard.view_insights(&Symbol::new("BBCA")).await?;
/// assert_eq!(report.panels().len(), 4);
/// ```
pub struct Dashboard {
    catalog: Arc<dyn CatalogProvider>,
    financials: Arc<dyn FinancialsProvider>,
    model: Arc<dyn LanguageModel>,
    cache: Arc<dyn ResponseCache>,
    cache_ttl: Option<Duration>,
    query: FinancialsQuery,
    params: GenerationParams,
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("catalog", &self.catalog.name())
            .field("financials", &self.financials.name())
            .field("model", &self.model.model_name())
            .field("cache_ttl", &self.cache_ttl)
            .field("query", &self.query)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Creates a dashboard with no cache and default query and generation
    /// parameters.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        financials: Arc<dyn FinancialsProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            catalog,
            financials,
            model,
            cache: Arc::new(NoopCache::new()),
            cache_ttl: None,
            query: FinancialsQuery::default(),
            params: GenerationParams::default(),
        }
    }

    /// Builds the Sectors and Replicate clients and the cache from a config.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, a client cannot be built or
    /// the cache cannot be opened.
    pub fn from_config(config: &InsightConfig) -> Result<Self> {
        config.validate()?;
        let sectors = Arc::new(SectorsProvider::new(config.sectors.clone())?);
        let model = Arc::new(ReplicateModel::new(config.model.clone())?);

        debug!(?config, "Building dashboard");
        Ok(Self::new(sectors.clone(), sectors, model)
            .with_cache(config.cache.build()?)
            .with_cache_ttl(config.cache_ttl)
            .with_query(config.financials)
            .with_params(config.generation))
    }

    /// Sets the response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the age after which [`Dashboard::expire_stale`] drops cached
    /// responses. `None` keeps them.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Drops cached responses older than the configured TTL.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    /// Returns the cache's error.
    pub async fn expire_stale(&self) -> Result<usize> {
        let Some(ttl) = self.cache_ttl else {
            return Ok(0);
        };
        let removed = self.cache.invalidate_stale(ttl).await?;
        debug!(removed, ttl_secs = ttl.as_secs(), "Expired stale cache entries");
        Ok(removed)
    }

    /// Sets the financials window.
    #[must_use]
    pub const fn with_query(mut self, query: FinancialsQuery) -> Self {
        self.query = query;
        self
    }

    /// Sets the generation parameters.
    #[must_use]
    pub const fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// The financials window used by [`Dashboard::financials`].
    #[must_use]
    pub const fn query(&self) -> &FinancialsQuery {
        &self.query
    }

    /// The generation parameters sent with every prompt.
    #[must_use]
    pub const fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// The language model.
    #[must_use]
    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    /// Looks up `key` in the cache, falling back to `fetch` and caching its
    /// result. Cache failures are logged and otherwise ignored.
    async fn cached<T, F, Fut>(&self, provider: &str, key: &str, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.get(provider, key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!(provider, key, "Cache hit");
                    return Ok(hit);
                }
                Err(e) => warn!(provider, key, error = %e, "Discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(provider, key, error = %e, "Cache lookup failed"),
        }

        let fresh = fetch().await?;

        match serde_json::to_value(&fresh) {
            Ok(value) => {
                if let Err(e) = self.cache.put(provider, key, &value).await {
                    warn!(provider, key, error = %e, "Failed to cache response");
                }
            }
            Err(e) => warn!(provider, key, error = %e, "Failed to serialize response for cache"),
        }

        Ok(fresh)
    }

    /// Every subsector, sorted alphabetically.
    ///
    /// # Errors
    /// Propagates the catalog provider's error.
    pub async fn subsectors(&self) -> Result<Vec<Subsector>> {
        let mut subsectors = self
            .cached(self.catalog.name(), "subsectors", || self.catalog.subsectors())
            .await?;
        subsectors.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(subsectors)
    }

    /// The companies listed under `subsector`, in provider order.
    ///
    /// # Errors
    /// Propagates the catalog provider's error.
    pub async fn companies(&self, subsector: &Subsector) -> Result<Vec<Company>> {
        let key = format!("companies:{}", subsector.name());
        self.cached(self.catalog.name(), &key, || self.catalog.companies(subsector))
            .await
    }

    /// Quarterly financials of `symbol` for the configured window.
    ///
    /// # Errors
    /// Propagates the financials provider's error.
    pub async fn financials(&self, symbol: &Symbol) -> Result<FinancialTable> {
        let key = format!(
            "financials:{symbol}:{}:{}",
            self.query.n_quarters, self.query.report_date
        );
        self.cached(self.financials.name(), &key, || {
            self.financials.quarterly_financials(symbol, &self.query)
        })
        .await
    }

    /// Sends a prompt to the model unchanged.
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model = self.model.model_name(),
            prompt_len = prompt.len(),
            "Invoking model"
        );
        self.model.generate(prompt, &self.params).await
    }

    /// Renders `table` as flat text, substitutes it into `template` and
    /// returns the model's raw completion.
    ///
    /// # Errors
    /// Returns an error if the table cannot be rendered or the model call
    /// fails.
    pub async fn run_prompt(&self, template: &PromptTemplate, table: &FinancialTable) -> Result<String> {
        let data = table.render_text()?;
        self.generate(&template.render(&data)).await
    }

    /// Fetches the financials and asks for a three-point executive summary.
    ///
    /// Returns the summary and the table, which the remaining panels reuse.
    ///
    /// # Errors
    /// Returns an error if the fetch or the model call fails.
    pub async fn financial_summary(&self, symbol: &Symbol) -> Result<(String, FinancialTable)> {
        let table = self.financials(symbol).await?;
        let template = PromptTemplate::new(prompts::FINANCIAL_SUMMARY)?;
        let summary = self.run_prompt(&template, &table).await?;
        Ok((summary, table))
    }

    /// Asks the model to pick a chart for the revenue series and draws it.
    ///
    /// The reply must name a chart from the closed [`ChartSpec`] enumeration.
    /// Anything else falls back to a revenue line chart. The model chooses the
    /// kind and title only; the plotted metric is always revenue.
    ///
    /// # Errors
    /// Returns [`InsightError::Chart`] if no quarter has a revenue figure, or
    /// the model call error.
    pub async fn revenue_trend(&self, table: &FinancialTable) -> Result<Figure> {
        let series = table.series(Metric::Revenue)?;
        if series.is_empty() {
            return Err(InsightError::Chart(format!(
                "no revenue figures for {}",
                table.symbol()
            )));
        }

        let template = PromptTemplate::new(prompts::REVENUE_CHART)?;
        let data = table.render_series_text(Metric::Revenue)?;
        let reply = self.generate(&template.render(&data)).await?;

        let mut spec = match ChartSpec::parse(&reply) {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "Model reply is not a chart specification, using a revenue line");
                ChartSpec::revenue_line()
            }
        };
        if spec.y != Metric::Revenue {
            warn!(requested = %spec.y, "Model picked another metric, plotting revenue");
            spec.y = Metric::Revenue;
        }

        Figure::new(spec, series)
    }

    /// Three bullet points on revenue, net income and operating cash flow.
    ///
    /// # Errors
    /// Returns an error if the model call fails.
    pub async fn trend_analysis(&self, table: &FinancialTable) -> Result<String> {
        let template = PromptTemplate::new(prompts::TREND_ANALYSIS)?;
        self.run_prompt(&template, table).await
    }

    /// Two or three one-sentence red flags.
    ///
    /// # Errors
    /// Returns an error if the model call fails.
    pub async fn risk_analysis(&self, table: &FinancialTable) -> Result<String> {
        let template = PromptTemplate::new(prompts::RISK_ANALYSIS)?;
        self.run_prompt(&template, table).await
    }

    /// Produces all four panels for `symbol`.
    ///
    /// # Errors
    /// Returns the first failure; no later panel is attempted.
    pub async fn view_insights(&self, symbol: &Symbol) -> Result<InsightReport> {
        self.view_insights_with(symbol, |_| {}).await
    }

    /// Like [`Dashboard::view_insights`], handing each panel to `on_panel` as
    /// soon as it is ready.
    ///
    /// # Errors
    /// Returns the first failure; no later panel is attempted.
    pub async fn view_insights_with<F>(&self, symbol: &Symbol, mut on_panel: F) -> Result<InsightReport>
    where
        F: FnMut(&Insight),
    {
        info!(symbol = %symbol, "Building insights");
        let mut panels = Vec::with_capacity(PanelKind::ALL.len());
        let mut push = |panel: Insight| {
            on_panel(&panel);
            panels.push(panel);
        };

        let (summary, table) = self.financial_summary(symbol).await?;
        push(Insight::text(PanelKind::FinancialSummary, summary));

        let figure = self.revenue_trend(&table).await?;
        push(Insight {
            kind: PanelKind::RevenueTrend,
            body: InsightBody::Figure(figure),
        });

        let trends = self.trend_analysis(&table).await?;
        push(Insight::text(PanelKind::TrendAnalysis, trends));

        let risks = self.risk_analysis(&table).await?;
        push(Insight::text(PanelKind::RiskAnalysis, risks));

        info!(symbol = %symbol, "Insights ready");
        Ok(InsightReport { table, panels })
    }
}
