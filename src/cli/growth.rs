use super::{AppContext, ReportSource, ui};
use crate::core::ChartPoint;
use crate::core::growth::{self, GrowthWindow, SymbolSeries};
use anyhow::Result;
use comfy_table::Cell;
use tracing::info;

/// What the growth command prints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowthOptions {
    pub accounts: Vec<i64>,
    pub window: GrowthWindow,
    pub by_symbol: bool,
    pub json: bool,
}

pub fn display_totals(points: &[ChartPoint]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Market Value (CAD)")]);
    for point in points {
        table.add_row(vec![Cell::new(point.x), ui::amount_cell(point.y)]);
    }
    table.to_string()
}

/// One column per symbol. Days a symbol has no bar show as blank.
pub fn display_by_symbol(series: &[SymbolSeries]) -> String {
    let mut dates: Vec<_> = series.iter().flat_map(|s| s.data.iter().map(|p| p.x)).collect();
    dates.sort();
    dates.dedup();

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Date")];
    header.extend(series.iter().map(|s| ui::header_cell(&s.label)));
    table.set_header(header);

    for day in dates {
        let mut row = vec![Cell::new(day)];
        row.extend(series.iter().map(|s| {
            s.data
                .iter()
                .find(|p| p.x == day)
                .map_or_else(|| Cell::new(""), |p| ui::amount_cell(p.y))
        }));
        table.add_row(row);
    }
    table.to_string()
}

pub async fn run(ctx: &AppContext, source: &ReportSource, options: &GrowthOptions) -> Result<()> {
    let report = ctx.open_report(source, None).await?;

    let spinner = ui::new_spinner("Fetching price history...");
    let points =
        growth::reconstruct(&report, &options.accounts, &ctx.prices, &ctx.rates, ctx.today).await;
    spinner.finish_and_clear();
    let points = points?;
    info!(points = points.len(), "Growth series ready");

    if options.by_symbol {
        let series = growth::symbols_growth(&points, options.window);
        if options.json {
            println!("{}", serde_json::to_string_pretty(&series)?);
        } else {
            println!("{}", display_by_symbol(&series));
        }
    } else {
        let totals = growth::portfolio_growth_totals(&points, options.window);
        if options.json {
            println!("{}", serde_json::to_string_pretty(&totals)?);
        } else {
            println!("{}", display_totals(&totals));
        }
    }
    Ok(())
}
