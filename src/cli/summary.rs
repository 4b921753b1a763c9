use super::{AppContext, ReportSource, ui};
use crate::core::{ActivityReport, ActivityType, CurrencyRateProvider, PriceProvider};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use tracing::{info, warn};

/// Category totals and performance figures of one report, in CAD.
pub struct ReportSummary {
    pub id: String,
    pub totals: Vec<(ActivityType, f64)>,
    pub initial_investment: f64,
    pub fx_rate: Result<f64, String>,
    pub current_value: Result<f64, String>,
    pub roi: Result<f64, String>,
    pub annualized_return: Result<f64, String>,
}

/// Values the report at today's USD/CAD rate. Failures of the market-data
/// figures are kept per figure so the totals still print.
pub async fn summarize(
    report: &ActivityReport,
    rate_provider: &(dyn CurrencyRateProvider + Send + Sync),
    price_provider: &(dyn PriceProvider + Send + Sync),
    today: NaiveDate,
) -> ReportSummary {
    let totals = ActivityType::ALL
        .iter()
        .map(|activity| (activity.clone(), report.sum(activity)))
        .collect();

    let fx_rate = rate_provider.get_rate(today).await.map_err(|e| e.to_string());
    let (current_value, roi) = match &fx_rate {
        Ok(rate) => (
            report.current_value(*rate, price_provider).await.map_err(|e| e.to_string()),
            report.roi(*rate, price_provider).await.map_err(|e| e.to_string()),
        ),
        Err(e) => (Err(e.clone()), Err(e.clone())),
    };
    let annualized_return = match &current_value {
        Ok(value) => report.annualized_return(*value, today).map_err(|e| e.to_string()),
        Err(e) => Err(e.clone()),
    };
    if let Err(e) = &current_value {
        warn!(error = %e, "Could not value open positions");
    }

    ReportSummary {
        id: report.id().to_string(),
        totals,
        initial_investment: report.initial_investment(),
        fx_rate,
        current_value,
        roi,
        annualized_return,
    }
}

impl ReportSummary {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Category"), ui::header_cell("Net Amount (CAD)")]);
        for (activity, total) in &self.totals {
            table.add_row(vec![Cell::new(activity.label()), ui::amount_cell(*total)]);
        }

        let mut figures = ui::new_styled_table();
        figures.set_header(vec![ui::header_cell("Measure"), ui::header_cell("Value")]);
        figures.add_row(vec![
            Cell::new("Initial Investment (CAD)"),
            ui::amount_cell(self.initial_investment),
        ]);
        figures.add_row(vec![
            Cell::new("USD/CAD Today"),
            ui::format_result_cell(&self.fx_rate, |r| format!("{r:.4}")),
        ]);
        figures.add_row(vec![
            Cell::new("Current Value (CAD)"),
            ui::format_result_cell(&self.current_value, |v| format!("{v:.2}")),
        ]);
        figures.add_row(vec![
            Cell::new("ROI"),
            match &self.roi {
                Ok(roi) => ui::change_cell(*roi),
                Err(_) => ui::format_result_cell(&self.roi, |_| String::new()),
            },
        ]);
        figures.add_row(vec![
            Cell::new("Annualized Return"),
            match &self.annualized_return {
                Ok(rate) => ui::change_cell(*rate),
                Err(_) => ui::format_result_cell(&self.annualized_return, |_| String::new()),
            },
        ]);

        format!(
            "Report: {}\n\n{table}\n\n{figures}",
            ui::style_text(&self.id, ui::StyleType::Title)
        )
    }
}

pub async fn run(ctx: &AppContext, source: &ReportSource, account: Option<i64>) -> Result<()> {
    info!("Summarizing activity report...");
    let report = ctx.open_report(source, account).await?;

    let spinner = ui::new_spinner("Fetching quotes...");
    let summary = summarize(&report, &ctx.rates, &ctx.prices, ctx.today).await;
    spinner.finish_and_clear();

    println!("{}", summary.display_as_table());
    Ok(())
}
