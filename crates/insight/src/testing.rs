//! Deterministic providers and model for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use insight_core::{
    CatalogProvider, Company, DataProvider, FinancialTable, FinancialsProvider, FinancialsQuery,
    GenerationParams, InsightError, LanguageModel, QuarterlyFinancial, Result, Subsector, Symbol,
};

pub(crate) fn sample_table() -> FinancialTable {
    let quarter = |m, d, revenue, net_income, operating| {
        QuarterlyFinancial::new(
            NaiveDate::from_ymd_opt(2023, m, d).unwrap(),
            Some(revenue),
            Some(net_income),
            Some(operating),
        )
        .with_extra("total_assets", 1_400_000.0)
    };
    FinancialTable::new(
        Symbol::new("BBCA"),
        vec![
            quarter(9, 30, 25_500.0, 12_300.0, 14_100.0),
            quarter(12, 31, 23_100.0, 11_000.0, 9_800.0),
            quarter(3, 31, 24_200.0, 11_500.0, -3_200.0),
            quarter(6, 30, 24_900.0, 12_100.0, 8_700.0),
        ],
    )
}

#[derive(Debug)]
pub(crate) struct StubCatalog {
    subsectors: Vec<Subsector>,
    companies: HashMap<String, Vec<Company>>,
    subsector_calls: AtomicUsize,
    company_calls: AtomicUsize,
}

impl StubCatalog {
    pub(crate) fn new(subsectors: &[&str], companies: Vec<(&str, Vec<Company>)>) -> Self {
        Self {
            subsectors: subsectors.iter().map(|s| Subsector::new(*s)).collect(),
            companies: companies
                .into_iter()
                .map(|(s, c)| (s.to_string(), c))
                .collect(),
            subsector_calls: AtomicUsize::new(0),
            company_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn sample() -> Self {
        Self::new(
            &["retail", "banks", "telecommunication"],
            vec![
                (
                    "banks",
                    vec![
                        Company::new("BBCA.JK", "PT Bank Central Asia Tbk."),
                        Company::new("BBRI.JK", "PT Bank Rakyat Indonesia (Persero) Tbk."),
                    ],
                ),
                ("retail", vec![Company::new("ACES.JK", "PT Aspirasi Hidup Indonesia Tbk.")]),
            ],
        )
    }

    pub(crate) fn subsector_calls(&self) -> usize {
        self.subsector_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn company_calls(&self) -> usize {
        self.company_calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for StubCatalog {
    fn name(&self) -> &str {
        "StubCatalog"
    }

    fn description(&self) -> &str {
        "Fixed subsectors and companies"
    }
}

#[async_trait]
impl CatalogProvider for StubCatalog {
    async fn subsectors(&self) -> Result<Vec<Subsector>> {
        self.subsector_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.subsectors.clone())
    }

    async fn companies(&self, subsector: &Subsector) -> Result<Vec<Company>> {
        self.company_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .companies
            .get(subsector.name())
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug)]
pub(crate) struct StubFinancials {
    table: Option<FinancialTable>,
    calls: AtomicUsize,
}

impl StubFinancials {
    pub(crate) fn new(table: FinancialTable) -> Self {
        Self {
            table: Some(table),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            table: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for StubFinancials {
    fn name(&self) -> &str {
        "StubFinancials"
    }

    fn description(&self) -> &str {
        "Fixed quarterly financials"
    }
}

#[async_trait]
impl FinancialsProvider for StubFinancials {
    async fn quarterly_financials(
        &self,
        symbol: &Symbol,
        _query: &FinancialsQuery,
    ) -> Result<FinancialTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .clone()
            .ok_or_else(|| InsightError::NotFound(format!("no quarterly financials for {symbol}")))
    }
}

#[derive(Debug)]
enum Reply {
    Echo,
    Fixed(String),
}

/// Records every prompt; replies with the prompt itself or a fixed text.
#[derive(Debug)]
pub(crate) struct StubModel {
    reply: Reply,
    fail_at: Option<usize>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    last_params: Mutex<Option<GenerationParams>>,
}

impl StubModel {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            fail_at: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            last_params: Mutex::new(None),
        }
    }

    pub(crate) fn echo() -> Self {
        Self::with_reply(Reply::Echo)
    }

    pub(crate) fn fixed(reply: &str) -> Self {
        Self::with_reply(Reply::Fixed(reply.to_string()))
    }

    /// Fails the call with this zero-based index.
    pub(crate) fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn last_params(&self) -> Option<GenerationParams> {
        *self.last_params.lock().unwrap()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    fn model_name(&self) -> &str {
        "stub/echo"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        *self.last_params.lock().unwrap() = Some(*params);

        if self.fail_at == Some(call) {
            return Err(InsightError::Model("prediction failed".to_string()));
        }
        Ok(match &self.reply {
            Reply::Echo => prompt.to_string(),
            Reply::Fixed(text) => text.clone(),
        })
    }
}
